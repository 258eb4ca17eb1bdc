//! The `binary` module: whole-file byte access.

use crate::builtins::support::{as_bytes, as_str, bytes_to_value, expect_args, try_arg};
use crate::value::Value;
use ez_macros::builtin;

#[builtin(name = "binary.read_file")]
/// The whole file as a byte array.
pub fn binary_read_file(args: &[Value]) -> Value {
    expect_args!("binary.read_file", args, 1);
    let path = try_arg!(as_str("binary.read_file", args, 0));
    match std::fs::read(path) {
        Ok(raw) => bytes_to_value(raw),
        Err(e) => Value::error("E7003", format!("binary.read_file: `{}`: {}", path, e)),
    }
}

#[builtin(name = "binary.write_file")]
/// Write a byte array, replacing any existing content.
pub fn binary_write_file(args: &[Value]) -> Value {
    expect_args!("binary.write_file", args, 2);
    let path = try_arg!(as_str("binary.write_file", args, 0));
    let raw = try_arg!(as_bytes("binary.write_file", args, 1));
    match std::fs::write(path, raw) {
        Ok(()) => Value::Nil,
        Err(e) => Value::error("E7003", format!("binary.write_file: `{}`: {}", path, e)),
    }
}
