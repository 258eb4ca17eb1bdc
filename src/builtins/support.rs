//! Shared argument plumbing for builtin functions.
//!
//! Every builtin follows the same contract: an error argument is returned
//! unchanged, a wrong argument count is `E7002`, a wrong argument type is
//! `E7001`. The extractors here keep the per-function bodies down to their
//! actual behavior.

use crate::value::{IntValue, Value};
use num_traits::ToPrimitive;
use std::cell::RefCell;
use std::rc::Rc;

/// An error argument short-circuits the builtin.
pub fn first_error(args: &[Value]) -> Option<Value> {
    args.iter().find(|a| a.is_error()).cloned()
}

/// Arity guard. Exact count or inclusive range form.
macro_rules! expect_args {
    ($name:expr, $args:expr, $count:expr) => {
        if let Some(err) = $crate::builtins::support::first_error($args) {
            return err;
        }
        if $args.len() != $count {
            return $crate::value::Value::error(
                "E7002",
                format!(
                    "{} expects {} argument{}, got {}",
                    $name,
                    $count,
                    if $count == 1 { "" } else { "s" },
                    $args.len()
                ),
            );
        }
    };
    ($name:expr, $args:expr, $lo:expr, $hi:expr) => {
        if let Some(err) = $crate::builtins::support::first_error($args) {
            return err;
        }
        if $args.len() < $lo || $args.len() > $hi {
            return $crate::value::Value::error(
                "E7002",
                format!(
                    "{} expects {}-{} arguments, got {}",
                    $name,
                    $lo,
                    $hi,
                    $args.len()
                ),
            );
        }
    };
}
pub(crate) use expect_args;

/// Unwrap a `Result<_, Value>` extractor inside a builtin body.
macro_rules! try_arg {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return e,
        }
    };
}
pub(crate) use try_arg;

fn wrong_type(name: &str, index: usize, expected: &str, got: &Value) -> Value {
    Value::error(
        "E7001",
        format!(
            "{}: argument {} must be {}, got {}",
            name,
            index + 1,
            expected,
            got.type_name()
        ),
    )
}

/// Generate a typed extractor `as_<kind>` from one match arm.
macro_rules! extractor {
    ($kind:ident, $ty:ty, $expected:literal, $pattern:pat => $out:expr) => {
        paste::paste! {
            pub fn [<as_ $kind>]<'a>(
                name: &str,
                args: &'a [Value],
                index: usize,
            ) -> Result<$ty, Value> {
                match &args[index] {
                    $pattern => Ok($out),
                    other => Err(wrong_type(name, index, $expected, other)),
                }
            }
        }
    };
}

extractor!(str, &'a str, "a string", Value::Str(s) => s.as_str());
extractor!(int, &'a IntValue, "an integer", Value::Integer(i) => i);
extractor!(bool, bool, "a bool", Value::Bool(b) => *b);
extractor!(char, char, "a char", Value::Char(c) => *c);
extractor!(
    array,
    (Rc<RefCell<Vec<Value>>>, bool),
    "an array",
    Value::Array { elements, mutable } => (elements.clone(), *mutable)
);
extractor!(
    map,
    (Rc<RefCell<indexmap::IndexMap<crate::value::MapKey, Value>>>, bool),
    "a map",
    Value::Map { entries, mutable } => (entries.clone(), *mutable)
);

/// A non-negative integer index.
pub fn as_index(name: &str, args: &[Value], index: usize) -> Result<usize, Value> {
    match &args[index] {
        Value::Integer(i) => i
            .to_usize()
            .ok_or_else(|| wrong_type(name, index, "a non-negative integer", &args[index])),
        Value::Byte(b) => Ok(*b as usize),
        other => Err(wrong_type(name, index, "a non-negative integer", other)),
    }
}

/// Any numeric argument as `f64`.
pub fn as_float(name: &str, args: &[Value], index: usize) -> Result<f64, Value> {
    match &args[index] {
        Value::Float(f) => Ok(*f),
        Value::Integer(i) => i
            .value
            .to_f64()
            .ok_or_else(|| Value::error("E7001", format!("{}: integer too large", name))),
        Value::Byte(b) => Ok(f64::from(*b)),
        other => Err(wrong_type(name, index, "a number", other)),
    }
}

/// A string or byte-array argument as raw bytes.
pub fn as_bytes(name: &str, args: &[Value], index: usize) -> Result<Vec<u8>, Value> {
    match &args[index] {
        Value::Str(s) => Ok(s.as_bytes().to_vec()),
        Value::Array { elements, .. } => {
            let mut out = Vec::with_capacity(elements.borrow().len());
            for el in elements.borrow().iter() {
                match el {
                    Value::Byte(b) => out.push(*b),
                    Value::Integer(i) => match i.value.to_u8() {
                        Some(b) => out.push(b),
                        None => {
                            return Err(Value::error(
                                "E3026",
                                format!("{} is outside the byte range 0..=255", i.value),
                            ));
                        }
                    },
                    other => {
                        return Err(wrong_type(name, index, "a byte array", other));
                    }
                }
            }
            Ok(out)
        }
        other => Err(wrong_type(name, index, "a string or byte array", other)),
    }
}

/// Mutation guard for container-mutating builtins.
pub fn require_mutable(name: &str, mutable: bool) -> Result<(), Value> {
    if mutable {
        Ok(())
    } else {
        Err(Value::error(
            "E5011",
            format!("{}: cannot mutate a `const` collection", name),
        ))
    }
}

/// Wrap raw bytes back into an EZ byte array.
pub fn bytes_to_value(bytes: Vec<u8>) -> Value {
    Value::array(bytes.into_iter().map(Value::Byte).collect())
}
