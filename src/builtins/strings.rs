//! The `strings` module. Index-based operations count Unicode code points,
//! never bytes. Domain failures are `E10xxx`.

use crate::builtins::support::{as_index, as_str, expect_args, try_arg};
use crate::value::Value;
use ez_macros::builtin;

#[builtin(name = "strings.upper")]
/// Return an uppercased copy of the string.
pub fn strings_upper(args: &[Value]) -> Value {
    expect_args!("strings.upper", args, 1);
    let s = try_arg!(as_str("strings.upper", args, 0));
    Value::Str(s.to_uppercase())
}

#[builtin(name = "strings.lower")]
/// Return a lowercased copy of the string.
pub fn strings_lower(args: &[Value]) -> Value {
    expect_args!("strings.lower", args, 1);
    let s = try_arg!(as_str("strings.lower", args, 0));
    Value::Str(s.to_lowercase())
}

#[builtin(name = "strings.trim")]
/// Strip leading and trailing whitespace.
pub fn strings_trim(args: &[Value]) -> Value {
    expect_args!("strings.trim", args, 1);
    let s = try_arg!(as_str("strings.trim", args, 0));
    Value::Str(s.trim().to_string())
}

#[builtin(name = "strings.split")]
/// Split by a delimiter into an array of strings.
pub fn strings_split(args: &[Value]) -> Value {
    expect_args!("strings.split", args, 2);
    let s = try_arg!(as_str("strings.split", args, 0));
    let sep = try_arg!(as_str("strings.split", args, 1));
    if sep.is_empty() {
        return Value::array(s.chars().map(|c| Value::Str(c.to_string())).collect());
    }
    Value::array(
        s.split(sep)
            .map(|part| Value::Str(part.to_string()))
            .collect(),
    )
}

#[builtin(name = "strings.join")]
/// Join an array of strings with a delimiter.
pub fn strings_join(args: &[Value]) -> Value {
    expect_args!("strings.join", args, 2);
    let Value::Array { elements, .. } = &args[0] else {
        return Value::error(
            "E7001",
            format!(
                "strings.join: argument 1 must be an array, got {}",
                args[0].type_name()
            ),
        );
    };
    let sep = try_arg!(as_str("strings.join", args, 1));
    let mut parts = Vec::with_capacity(elements.borrow().len());
    for el in elements.borrow().iter() {
        match el {
            Value::Str(s) => parts.push(s.clone()),
            other => {
                return Value::error(
                    "E7001",
                    format!(
                        "strings.join: array holds {}, not strings",
                        other.type_name()
                    ),
                );
            }
        }
    }
    Value::Str(parts.join(sep))
}

#[builtin(name = "strings.contains")]
/// True if the string contains the substring.
pub fn strings_contains(args: &[Value]) -> Value {
    expect_args!("strings.contains", args, 2);
    let s = try_arg!(as_str("strings.contains", args, 0));
    let sub = try_arg!(as_str("strings.contains", args, 1));
    Value::Bool(s.contains(sub))
}

#[builtin(name = "strings.replace")]
/// Replace every occurrence of a pattern.
pub fn strings_replace(args: &[Value]) -> Value {
    expect_args!("strings.replace", args, 3);
    let s = try_arg!(as_str("strings.replace", args, 0));
    let from = try_arg!(as_str("strings.replace", args, 1));
    let to = try_arg!(as_str("strings.replace", args, 2));
    Value::Str(s.replace(from, to))
}

#[builtin(name = "strings.starts_with")]
/// True if the string starts with the prefix.
pub fn strings_starts_with(args: &[Value]) -> Value {
    expect_args!("strings.starts_with", args, 2);
    let s = try_arg!(as_str("strings.starts_with", args, 0));
    let prefix = try_arg!(as_str("strings.starts_with", args, 1));
    Value::Bool(s.starts_with(prefix))
}

#[builtin(name = "strings.ends_with")]
/// True if the string ends with the suffix.
pub fn strings_ends_with(args: &[Value]) -> Value {
    expect_args!("strings.ends_with", args, 2);
    let s = try_arg!(as_str("strings.ends_with", args, 0));
    let suffix = try_arg!(as_str("strings.ends_with", args, 1));
    Value::Bool(s.ends_with(suffix))
}

#[builtin(name = "strings.index_of")]
/// Code-point index of the first occurrence of a substring, or -1.
pub fn strings_index_of(args: &[Value]) -> Value {
    expect_args!("strings.index_of", args, 2);
    let s = try_arg!(as_str("strings.index_of", args, 0));
    let sub = try_arg!(as_str("strings.index_of", args, 1));
    match s.find(sub) {
        Some(byte_idx) => Value::int(s[..byte_idx].chars().count() as i64),
        None => Value::int(-1),
    }
}

#[builtin(name = "strings.substring")]
/// Code-point slice `[start, end)`.
pub fn strings_substring(args: &[Value]) -> Value {
    expect_args!("strings.substring", args, 3);
    let s = try_arg!(as_str("strings.substring", args, 0));
    let start = try_arg!(as_index("strings.substring", args, 1));
    let end = try_arg!(as_index("strings.substring", args, 2));
    let chars: Vec<char> = s.chars().collect();
    if start > end || end > chars.len() {
        return Value::error(
            "E10001",
            format!(
                "substring bounds {}..{} are invalid for length {}",
                start,
                end,
                chars.len()
            ),
        );
    }
    Value::Str(chars[start..end].iter().collect())
}

#[builtin(name = "strings.repeat")]
/// Concatenate `n` copies of the string.
pub fn strings_repeat(args: &[Value]) -> Value {
    expect_args!("strings.repeat", args, 2);
    let s = try_arg!(as_str("strings.repeat", args, 0));
    let n = try_arg!(as_index("strings.repeat", args, 1));
    Value::Str(s.repeat(n))
}

#[builtin(name = "strings.reverse")]
/// Reverse by code points.
pub fn strings_reverse(args: &[Value]) -> Value {
    expect_args!("strings.reverse", args, 1);
    let s = try_arg!(as_str("strings.reverse", args, 0));
    Value::Str(s.chars().rev().collect())
}

#[builtin(name = "strings.chars")]
/// The string as an array of chars.
pub fn strings_chars(args: &[Value]) -> Value {
    expect_args!("strings.chars", args, 1);
    let s = try_arg!(as_str("strings.chars", args, 0));
    Value::array(s.chars().map(Value::Char).collect())
}

#[builtin(name = "strings.to_int")]
/// Parse a decimal integer.
pub fn strings_to_int(args: &[Value]) -> Value {
    expect_args!("strings.to_int", args, 1);
    let s = try_arg!(as_str("strings.to_int", args, 0));
    match s.trim().parse::<num_bigint::BigInt>() {
        Ok(n) => Value::int(n),
        Err(_) => Value::error("E10002", format!("cannot parse `{}` as an integer", s)),
    }
}

#[builtin(name = "strings.to_float")]
/// Parse a float.
pub fn strings_to_float(args: &[Value]) -> Value {
    expect_args!("strings.to_float", args, 1);
    let s = try_arg!(as_str("strings.to_float", args, 0));
    match s.trim().parse::<f64>() {
        Ok(f) => Value::Float(f),
        Err(_) => Value::error("E10003", format!("cannot parse `{}` as a float", s)),
    }
}

#[builtin(name = "strings.pad_left")]
/// Pad on the left with a char to a code-point width.
pub fn strings_pad_left(args: &[Value]) -> Value {
    expect_args!("strings.pad_left", args, 3);
    let s = try_arg!(as_str("strings.pad_left", args, 0));
    let width = try_arg!(as_index("strings.pad_left", args, 1));
    let pad = try_arg!(crate::builtins::support::as_char(
        "strings.pad_left",
        args,
        2
    ));
    let len = s.chars().count();
    if len >= width {
        return Value::Str(s.to_string());
    }
    let mut out = pad.to_string().repeat(width - len);
    out.push_str(s);
    Value::Str(out)
}

#[builtin(name = "strings.pad_right")]
/// Pad on the right with a char to a code-point width.
pub fn strings_pad_right(args: &[Value]) -> Value {
    expect_args!("strings.pad_right", args, 3);
    let s = try_arg!(as_str("strings.pad_right", args, 0));
    let width = try_arg!(as_index("strings.pad_right", args, 1));
    let pad = try_arg!(crate::builtins::support::as_char(
        "strings.pad_right",
        args,
        2
    ));
    let len = s.chars().count();
    let mut out = s.to_string();
    if len < width {
        out.push_str(&pad.to_string().repeat(width - len));
    }
    Value::Str(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::Str(text.into())
    }

    #[test]
    fn test_case_and_trim() {
        assert_eq!(strings_upper(&[s("abc")]).try_eq(&s("ABC")), Some(true));
        assert_eq!(strings_lower(&[s("ABC")]).try_eq(&s("abc")), Some(true));
        assert_eq!(strings_trim(&[s("  x  ")]).try_eq(&s("x")), Some(true));
    }

    #[test]
    fn test_split_and_join() {
        let parts = strings_split(&[s("a,b,c"), s(",")]);
        let joined = strings_join(&[parts, s("-")]);
        assert_eq!(joined.try_eq(&s("a-b-c")), Some(true));
    }

    #[test]
    fn test_substring_counts_code_points() {
        let v = strings_substring(&[s("Hello 世界"), Value::int(6), Value::int(8)]);
        assert_eq!(v.try_eq(&s("世界")), Some(true));

        let Value::Error(e) = strings_substring(&[s("ab"), Value::int(1), Value::int(5)]) else {
            panic!()
        };
        assert_eq!(e.code, "E10001");
    }

    #[test]
    fn test_index_of_code_points() {
        let v = strings_index_of(&[s("Hello 世界"), s("界")]);
        assert_eq!(v.try_eq(&Value::int(7)), Some(true));
        let v = strings_index_of(&[s("abc"), s("z")]);
        assert_eq!(v.try_eq(&Value::int(-1)), Some(true));
    }

    #[test]
    fn test_parse_errors() {
        let Value::Error(e) = strings_to_int(&[s("12x")]) else {
            panic!()
        };
        assert_eq!(e.code, "E10002");
        let Value::Error(e) = strings_to_float(&[s("..")]) else {
            panic!()
        };
        assert_eq!(e.code, "E10003");
    }

    #[test]
    fn test_pad() {
        let v = strings_pad_left(&[s("7"), Value::int(3), Value::Char('0')]);
        assert_eq!(v.try_eq(&s("007")), Some(true));
        let v = strings_pad_right(&[s("ab"), Value::int(4), Value::Char('.')]);
        assert_eq!(v.try_eq(&s("ab..")), Some(true));
    }
}
