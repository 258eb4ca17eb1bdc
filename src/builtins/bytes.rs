//! The `bytes` module: byte arrays and their string views.

use crate::builtins::support::{as_bytes, as_index, as_str, bytes_to_value, expect_args, try_arg};
use crate::value::Value;
use ez_macros::builtin;

#[builtin(name = "bytes.from_string")]
/// UTF-8 bytes of a string, as a byte array.
pub fn bytes_from_string(args: &[Value]) -> Value {
    expect_args!("bytes.from_string", args, 1);
    let s = try_arg!(as_str("bytes.from_string", args, 0));
    bytes_to_value(s.as_bytes().to_vec())
}

#[builtin(name = "bytes.to_string")]
/// Decode a byte array as UTF-8.
pub fn bytes_to_string(args: &[Value]) -> Value {
    expect_args!("bytes.to_string", args, 1);
    let raw = try_arg!(as_bytes("bytes.to_string", args, 0));
    match String::from_utf8(raw) {
        Ok(s) => Value::Str(s),
        Err(_) => Value::error("E16002", "bytes are not valid UTF-8"),
    }
}

#[builtin(name = "bytes.len")]
/// The number of bytes.
pub fn bytes_len(args: &[Value]) -> Value {
    expect_args!("bytes.len", args, 1);
    let raw = try_arg!(as_bytes("bytes.len", args, 0));
    Value::int(raw.len() as i64)
}

#[builtin(name = "bytes.at")]
/// The byte at an index.
pub fn bytes_at(args: &[Value]) -> Value {
    expect_args!("bytes.at", args, 2);
    let raw = try_arg!(as_bytes("bytes.at", args, 0));
    let index = try_arg!(as_index("bytes.at", args, 1));
    match raw.get(index) {
        Some(b) => Value::Byte(*b),
        None => Value::error(
            "E5003",
            format!("index {} is out of range for length {}", index, raw.len()),
        ),
    }
}

#[builtin(name = "bytes.slice")]
/// A new byte array holding `[start, end)`.
pub fn bytes_slice(args: &[Value]) -> Value {
    expect_args!("bytes.slice", args, 3);
    let raw = try_arg!(as_bytes("bytes.slice", args, 0));
    let start = try_arg!(as_index("bytes.slice", args, 1));
    let end = try_arg!(as_index("bytes.slice", args, 2));
    if start > end || end > raw.len() {
        return Value::error(
            "E9003",
            format!(
                "slice bounds {}..{} are invalid for length {}",
                start,
                end,
                raw.len()
            ),
        );
    }
    bytes_to_value(raw[start..end].to_vec())
}
