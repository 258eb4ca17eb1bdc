//! The `io` module. Text-oriented file access; failures are `E7003`.

use crate::builtins::support::{as_str, expect_args, try_arg};
use crate::value::Value;
use ez_macros::builtin;
use std::io::BufRead;

fn io_error(name: &str, path: &str, err: std::io::Error) -> Value {
    Value::error("E7003", format!("{}: `{}`: {}", name, path, err))
}

#[builtin(name = "io.read_file")]
/// The whole file as a string.
pub fn io_read_file(args: &[Value]) -> Value {
    expect_args!("io.read_file", args, 1);
    let path = try_arg!(as_str("io.read_file", args, 0));
    match std::fs::read_to_string(path) {
        Ok(text) => Value::Str(text),
        Err(e) => io_error("io.read_file", path, e),
    }
}

#[builtin(name = "io.write_file")]
/// Write a string, replacing any existing content.
pub fn io_write_file(args: &[Value]) -> Value {
    expect_args!("io.write_file", args, 2);
    let path = try_arg!(as_str("io.write_file", args, 0));
    let text = try_arg!(as_str("io.write_file", args, 1));
    match std::fs::write(path, text) {
        Ok(()) => Value::Nil,
        Err(e) => io_error("io.write_file", path, e),
    }
}

#[builtin(name = "io.append_file")]
/// Append a string, creating the file if needed.
pub fn io_append_file(args: &[Value]) -> Value {
    expect_args!("io.append_file", args, 2);
    let path = try_arg!(as_str("io.append_file", args, 0));
    let text = try_arg!(as_str("io.append_file", args, 1));
    use std::io::Write;
    let result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut f| f.write_all(text.as_bytes()));
    match result {
        Ok(()) => Value::Nil,
        Err(e) => io_error("io.append_file", path, e),
    }
}

#[builtin(name = "io.exists")]
/// True if the path exists.
pub fn io_exists(args: &[Value]) -> Value {
    expect_args!("io.exists", args, 1);
    let path = try_arg!(as_str("io.exists", args, 0));
    Value::Bool(std::path::Path::new(path).exists())
}

#[builtin(name = "io.delete_file")]
/// Remove a file.
pub fn io_delete_file(args: &[Value]) -> Value {
    expect_args!("io.delete_file", args, 1);
    let path = try_arg!(as_str("io.delete_file", args, 0));
    match std::fs::remove_file(path) {
        Ok(()) => Value::Nil,
        Err(e) => io_error("io.delete_file", path, e),
    }
}

#[builtin(name = "io.read_lines")]
/// The file as an array of lines, without terminators.
pub fn io_read_lines(args: &[Value]) -> Value {
    expect_args!("io.read_lines", args, 1);
    let path = try_arg!(as_str("io.read_lines", args, 0));
    match std::fs::read_to_string(path) {
        Ok(text) => Value::array(text.lines().map(|l| Value::Str(l.to_string())).collect()),
        Err(e) => io_error("io.read_lines", path, e),
    }
}

#[builtin(name = "io.input")]
/// One line from standard input, prompt optional.
pub fn io_input(args: &[Value]) -> Value {
    expect_args!("io.input", args, 0, 1);
    if args.len() == 1 {
        let prompt = try_arg!(as_str("io.input", args, 0));
        print!("{}", prompt);
        use std::io::Write;
        let _ = std::io::stdout().flush();
    }
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => Value::Str(line.trim_end_matches(['\n', '\r']).to_string()),
        Err(e) => Value::error("E7003", format!("io.input: {}", e)),
    }
}
