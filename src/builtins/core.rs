//! The `std` module. Its members also resolve unqualified as the final
//! lookup step, so `len(s)` and `std.len(s)` are the same entry.

use crate::builtins::support::{as_str, expect_args};
use crate::value::Value;
use ez_macros::builtin;

#[builtin(name = "std.len")]
/// Length of a string (in code points), array, or map.
pub fn std_len(args: &[Value]) -> Value {
    expect_args!("len", args, 1);
    match &args[0] {
        Value::Str(s) => Value::int(s.chars().count() as i64),
        Value::Array { elements, .. } => Value::int(elements.borrow().len() as i64),
        Value::Map { entries, .. } => Value::int(entries.borrow().len() as i64),
        other => Value::error(
            "E7001",
            format!("len: argument 1 must be a string, array, or map, got {}", other.type_name()),
        ),
    }
}

#[builtin(name = "std.print")]
/// Write the display form of each argument, space separated, without a
/// trailing newline.
pub fn std_print(args: &[Value]) -> Value {
    if let Some(err) = crate::builtins::support::first_error(args) {
        return err;
    }
    let text: Vec<String> = args.iter().map(Value::display_plain).collect();
    print!("{}", text.join(" "));
    Value::Nil
}

#[builtin(name = "std.println")]
/// Write the display form of each argument, space separated, newline
/// terminated.
pub fn std_println(args: &[Value]) -> Value {
    if let Some(err) = crate::builtins::support::first_error(args) {
        return err;
    }
    let text: Vec<String> = args.iter().map(Value::display_plain).collect();
    println!("{}", text.join(" "));
    Value::Nil
}

#[builtin(name = "std.typeof")]
/// The type name of a value (`int`, `i8`, `string`, a struct name, ...).
pub fn std_typeof(args: &[Value]) -> Value {
    expect_args!("typeof", args, 1);
    Value::Str(args[0].type_name())
}

#[builtin(name = "std.to_string")]
/// The display form of any value.
pub fn std_to_string(args: &[Value]) -> Value {
    expect_args!("to_string", args, 1);
    Value::Str(args[0].display_plain())
}

#[builtin(name = "std.assert")]
/// Fail with an error unless the first argument is truthy. An optional
/// second argument becomes the failure message.
pub fn std_assert(args: &[Value]) -> Value {
    expect_args!("assert", args, 1, 2);
    if args[0].is_truthy() {
        return Value::Nil;
    }
    let message = if args.len() == 2 {
        match as_str("assert", args, 1) {
            Ok(s) => s.to_string(),
            Err(e) => return e,
        }
    } else {
        "assertion failed".to_string()
    };
    Value::error("E7004", message)
}

#[builtin(name = "std.is_error")]
/// True if the argument is an error value.
pub fn std_is_error(args: &[Value]) -> Value {
    if args.len() != 1 {
        return Value::error(
            "E7002",
            format!("is_error expects 1 argument, got {}", args.len()),
        );
    }
    Value::Bool(args[0].is_error())
}

#[builtin(name = "std.error_code")]
/// The diagnostic code of an error value, or the empty string.
pub fn std_error_code(args: &[Value]) -> Value {
    if args.len() != 1 {
        return Value::error(
            "E7002",
            format!("error_code expects 1 argument, got {}", args.len()),
        );
    }
    match &args[0] {
        Value::Error(e) => Value::Str(e.code.clone()),
        _ => Value::Str(String::new()),
    }
}

#[builtin(name = "std.error_message")]
/// The message of an error value, or the empty string.
pub fn std_error_message(args: &[Value]) -> Value {
    if args.len() != 1 {
        return Value::error(
            "E7002",
            format!("error_message expects 1 argument, got {}", args.len()),
        );
    }
    match &args[0] {
        Value::Error(e) => Value::Str(e.message.clone()),
        _ => Value::Str(String::new()),
    }
}
