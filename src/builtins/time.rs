//! The `time` module. Instants are integer milliseconds since the Unix
//! epoch; formatting goes through `chrono`. Failures are `E11xxx`.

use crate::builtins::support::{as_int, as_str, expect_args, try_arg};
use crate::value::Value;
use chrono::{DateTime, Utc};
use ez_macros::builtin;
use num_traits::ToPrimitive;

#[builtin(name = "time.now")]
/// Milliseconds since the Unix epoch.
pub fn time_now(args: &[Value]) -> Value {
    expect_args!("time.now", args, 0);
    Value::int(Utc::now().timestamp_millis())
}

#[builtin(name = "time.now_iso")]
/// The current instant as an RFC 3339 string.
pub fn time_now_iso(args: &[Value]) -> Value {
    expect_args!("time.now_iso", args, 0);
    Value::Str(Utc::now().to_rfc3339())
}

#[builtin(name = "time.sleep")]
/// Block the calling thread for the given number of milliseconds.
pub fn time_sleep(args: &[Value]) -> Value {
    expect_args!("time.sleep", args, 1);
    let ms = try_arg!(as_int("time.sleep", args, 0));
    let Some(ms) = ms.value.to_u64() else {
        return Value::error("E11001", "sleep duration must be non-negative");
    };
    std::thread::sleep(std::time::Duration::from_millis(ms));
    Value::Nil
}

#[builtin(name = "time.format")]
/// Format an epoch-millisecond instant with a strftime pattern.
pub fn time_format(args: &[Value]) -> Value {
    expect_args!("time.format", args, 2);
    let ms = try_arg!(as_int("time.format", args, 0));
    let pattern = try_arg!(as_str("time.format", args, 1));
    let Some(ms) = ms.value.to_i64() else {
        return Value::error("E11002", "instant is outside the representable range");
    };
    let Some(instant) = DateTime::<Utc>::from_timestamp_millis(ms) else {
        return Value::error("E11002", "instant is outside the representable range");
    };
    let mut out = String::new();
    // format_with_items would panic on a bad pattern; write_fmt reports it
    use std::fmt::Write;
    match write!(out, "{}", instant.format(pattern)) {
        Ok(()) => Value::Str(out),
        Err(_) => Value::error("E11002", format!("invalid time format `{}`", pattern)),
    }
}
