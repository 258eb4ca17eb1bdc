//! The `os` module.

use crate::builtins::support::{as_int, as_str, expect_args, try_arg};
use crate::value::Value;
use ez_macros::builtin;
use num_traits::ToPrimitive;

#[builtin(name = "os.getenv")]
/// The value of an environment variable, or nil.
pub fn os_getenv(args: &[Value]) -> Value {
    expect_args!("os.getenv", args, 1);
    let name = try_arg!(as_str("os.getenv", args, 0));
    match std::env::var(name) {
        Ok(v) => Value::Str(v),
        Err(_) => Value::Nil,
    }
}

#[builtin(name = "os.setenv")]
/// Set an environment variable for this process.
pub fn os_setenv(args: &[Value]) -> Value {
    expect_args!("os.setenv", args, 2);
    let name = try_arg!(as_str("os.setenv", args, 0));
    let value = try_arg!(as_str("os.setenv", args, 1));
    std::env::set_var(name, value);
    Value::Nil
}

#[builtin(name = "os.args")]
/// The process arguments.
pub fn os_args(args: &[Value]) -> Value {
    expect_args!("os.args", args, 0);
    Value::array(std::env::args().map(Value::Str).collect())
}

#[builtin(name = "os.platform")]
/// The operating system name (`linux`, `macos`, `windows`, ...).
pub fn os_platform(args: &[Value]) -> Value {
    expect_args!("os.platform", args, 0);
    Value::Str(std::env::consts::OS.to_string())
}

#[builtin(name = "os.exit")]
/// Terminate the process with the given status.
pub fn os_exit(args: &[Value]) -> Value {
    expect_args!("os.exit", args, 0, 1);
    let code = if args.len() == 1 {
        let iv = try_arg!(as_int("os.exit", args, 0));
        iv.value.to_i32().unwrap_or(1)
    } else {
        0
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_round_trip() {
        os_setenv(&[Value::Str("EZ_TEST_VAR".into()), Value::Str("42".into())]);
        let v = os_getenv(&[Value::Str("EZ_TEST_VAR".into())]);
        assert_eq!(v.try_eq(&Value::Str("42".into())), Some(true));
        std::env::remove_var("EZ_TEST_VAR");
        let v = os_getenv(&[Value::Str("EZ_TEST_VAR".into())]);
        assert!(matches!(v, Value::Nil));
    }

    #[test]
    fn test_platform_is_known() {
        let Value::Str(os) = os_platform(&[]) else {
            panic!()
        };
        assert!(!os.is_empty());
    }
}
