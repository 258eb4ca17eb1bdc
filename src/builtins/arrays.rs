//! The `arrays` module. Mutating members write through the shared interior
//! and respect the handle's mutability flag (`E5011` on a `const` array).
//! Domain failures are `E9xxx`.

use crate::builtins::support::{as_array, as_index, as_str, expect_args, require_mutable, try_arg};
use crate::value::Value;
use ez_macros::builtin;

#[builtin(name = "arrays.push")]
/// Append a value in place.
pub fn arrays_push(args: &[Value]) -> Value {
    expect_args!("arrays.push", args, 2);
    let (elements, mutable) = try_arg!(as_array("arrays.push", args, 0));
    try_arg!(require_mutable("arrays.push", mutable));
    elements.borrow_mut().push(args[1].clone());
    Value::Nil
}

#[builtin(name = "arrays.pop")]
/// Remove and return the last element.
pub fn arrays_pop(args: &[Value]) -> Value {
    expect_args!("arrays.pop", args, 1);
    let (elements, mutable) = try_arg!(as_array("arrays.pop", args, 0));
    try_arg!(require_mutable("arrays.pop", mutable));
    let result = match elements.borrow_mut().pop() {
        Some(v) => v,
        None => Value::error("E9002", "arrays.pop: array is empty"),
    };
    result
}

#[builtin(name = "arrays.first")]
/// The first element, or nil when empty.
pub fn arrays_first(args: &[Value]) -> Value {
    expect_args!("arrays.first", args, 1);
    let (elements, _) = try_arg!(as_array("arrays.first", args, 0));
    let els = elements.borrow();
    els.first().cloned().unwrap_or(Value::Nil)
}

#[builtin(name = "arrays.last")]
/// The last element, or nil when empty.
pub fn arrays_last(args: &[Value]) -> Value {
    expect_args!("arrays.last", args, 1);
    let (elements, _) = try_arg!(as_array("arrays.last", args, 0));
    let els = elements.borrow();
    els.last().cloned().unwrap_or(Value::Nil)
}

#[builtin(name = "arrays.slice")]
/// A new array holding `[start, end)`.
pub fn arrays_slice(args: &[Value]) -> Value {
    expect_args!("arrays.slice", args, 3);
    let (elements, _) = try_arg!(as_array("arrays.slice", args, 0));
    let start = try_arg!(as_index("arrays.slice", args, 1));
    let end = try_arg!(as_index("arrays.slice", args, 2));
    let els = elements.borrow();
    if start > end || end > els.len() {
        return Value::error(
            "E9003",
            format!(
                "slice bounds {}..{} are invalid for length {}",
                start,
                end,
                els.len()
            ),
        );
    }
    Value::array(els[start..end].to_vec())
}

#[builtin(name = "arrays.concat")]
/// A new array holding the elements of both arguments.
pub fn arrays_concat(args: &[Value]) -> Value {
    expect_args!("arrays.concat", args, 2);
    let (a, _) = try_arg!(as_array("arrays.concat", args, 0));
    let (b, _) = try_arg!(as_array("arrays.concat", args, 1));
    let mut out = a.borrow().clone();
    out.extend(b.borrow().iter().cloned());
    Value::array(out)
}

#[builtin(name = "arrays.index_of")]
/// Index of the first element equal to the value, or -1.
pub fn arrays_index_of(args: &[Value]) -> Value {
    expect_args!("arrays.index_of", args, 2);
    let (elements, _) = try_arg!(as_array("arrays.index_of", args, 0));
    for (i, el) in elements.borrow().iter().enumerate() {
        if args[1].try_eq(el) == Some(true) {
            return Value::int(i as i64);
        }
    }
    Value::int(-1)
}

#[builtin(name = "arrays.contains")]
/// True if any element equals the value.
pub fn arrays_contains(args: &[Value]) -> Value {
    expect_args!("arrays.contains", args, 2);
    let (elements, _) = try_arg!(as_array("arrays.contains", args, 0));
    let found = elements
        .borrow()
        .iter()
        .any(|el| args[1].try_eq(el) == Some(true));
    Value::Bool(found)
}

#[builtin(name = "arrays.reverse")]
/// Reverse in place.
pub fn arrays_reverse(args: &[Value]) -> Value {
    expect_args!("arrays.reverse", args, 1);
    let (elements, mutable) = try_arg!(as_array("arrays.reverse", args, 0));
    try_arg!(require_mutable("arrays.reverse", mutable));
    elements.borrow_mut().reverse();
    Value::Nil
}

#[builtin(name = "arrays.sort")]
/// Sort in place. Elements must be mutually orderable.
pub fn arrays_sort(args: &[Value]) -> Value {
    expect_args!("arrays.sort", args, 1);
    let (elements, mutable) = try_arg!(as_array("arrays.sort", args, 0));
    try_arg!(require_mutable("arrays.sort", mutable));

    let mut els = elements.borrow_mut();
    for pair in els.windows(2) {
        if order_of(&pair[0], &pair[1]).is_none() {
            return Value::error(
                "E9004",
                format!(
                    "arrays.sort: {} and {} cannot be ordered",
                    pair[0].type_name(),
                    pair[1].type_name()
                ),
            );
        }
    }
    els.sort_by(|a, b| order_of(a, b).unwrap_or(std::cmp::Ordering::Equal));
    Value::Nil
}

#[builtin(name = "arrays.fill")]
/// Overwrite every element with a value, in place.
pub fn arrays_fill(args: &[Value]) -> Value {
    expect_args!("arrays.fill", args, 2);
    let (elements, mutable) = try_arg!(as_array("arrays.fill", args, 0));
    try_arg!(require_mutable("arrays.fill", mutable));
    for slot in elements.borrow_mut().iter_mut() {
        *slot = args[1].clone();
    }
    Value::Nil
}

#[builtin(name = "arrays.insert_at")]
/// Insert a value before the given index, in place.
pub fn arrays_insert_at(args: &[Value]) -> Value {
    expect_args!("arrays.insert_at", args, 3);
    let (elements, mutable) = try_arg!(as_array("arrays.insert_at", args, 0));
    try_arg!(require_mutable("arrays.insert_at", mutable));
    let index = try_arg!(as_index("arrays.insert_at", args, 1));
    let mut els = elements.borrow_mut();
    if index > els.len() {
        return Value::error(
            "E9005",
            format!("index {} is out of range for length {}", index, els.len()),
        );
    }
    els.insert(index, args[2].clone());
    Value::Nil
}

#[builtin(name = "arrays.remove_at")]
/// Remove and return the element at the given index.
pub fn arrays_remove_at(args: &[Value]) -> Value {
    expect_args!("arrays.remove_at", args, 2);
    let (elements, mutable) = try_arg!(as_array("arrays.remove_at", args, 0));
    try_arg!(require_mutable("arrays.remove_at", mutable));
    let index = try_arg!(as_index("arrays.remove_at", args, 1));
    let mut els = elements.borrow_mut();
    if index >= els.len() {
        return Value::error(
            "E9005",
            format!("index {} is out of range for length {}", index, els.len()),
        );
    }
    els.remove(index)
}

#[builtin(name = "arrays.clear")]
/// Remove every element, in place.
pub fn arrays_clear(args: &[Value]) -> Value {
    expect_args!("arrays.clear", args, 1);
    let (elements, mutable) = try_arg!(as_array("arrays.clear", args, 0));
    try_arg!(require_mutable("arrays.clear", mutable));
    elements.borrow_mut().clear();
    Value::Nil
}

#[builtin(name = "arrays.clone")]
/// A mutable copy that no longer shares storage with the original.
pub fn arrays_clone(args: &[Value]) -> Value {
    expect_args!("arrays.clone", args, 1);
    let (elements, _) = try_arg!(as_array("arrays.clone", args, 0));
    let copy = elements.borrow().clone();
    Value::array(copy)
}

#[builtin(name = "arrays.join")]
/// Display forms of the elements joined with a delimiter.
pub fn arrays_join(args: &[Value]) -> Value {
    expect_args!("arrays.join", args, 2);
    let (elements, _) = try_arg!(as_array("arrays.join", args, 0));
    let sep = try_arg!(as_str("arrays.join", args, 1));
    let parts: Vec<String> = elements.borrow().iter().map(Value::display_plain).collect();
    Value::Str(parts.join(sep))
}

fn order_of(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    use num_traits::ToPrimitive;
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Some(x.value.cmp(&y.value)),
        (Value::Byte(x), Value::Byte(y)) => Some(x.cmp(y)),
        (Value::Integer(x), Value::Byte(y)) => Some(x.value.cmp(&(*y).into())),
        (Value::Byte(x), Value::Integer(y)) => {
            Some(num_bigint::BigInt::from(*x).cmp(&y.value))
        }
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Integer(x), Value::Float(y)) => x.value.to_f64()?.partial_cmp(y),
        (Value::Float(x), Value::Integer(y)) => x.partial_cmp(&y.value.to_f64()?),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::Char(x), Value::Char(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Value {
        Value::array(values.iter().map(|v| Value::int(*v)).collect())
    }

    #[test]
    fn test_push_mutates_shared_interior() {
        let arr = ints(&[1, 2]);
        let alias = arr.clone();
        arrays_push(&[arr, Value::int(3)]);
        let Value::Array { elements, .. } = alias else {
            panic!()
        };
        assert_eq!(elements.borrow().len(), 3);
    }

    #[test]
    fn test_pop_empty_is_e9002() {
        let Value::Error(e) = arrays_pop(&[ints(&[])]) else {
            panic!()
        };
        assert_eq!(e.code, "E9002");
    }

    #[test]
    fn test_const_array_rejects_mutation() {
        let Value::Array { elements, .. } = ints(&[1]) else {
            panic!()
        };
        let frozen = Value::Array {
            elements,
            mutable: false,
        };
        for result in [
            arrays_push(&[frozen.clone(), Value::int(2)]),
            arrays_pop(&[frozen.clone()]),
            arrays_fill(&[frozen.clone(), Value::int(0)]),
            arrays_sort(&[frozen.clone()]),
            arrays_reverse(&[frozen.clone()]),
            arrays_clear(&[frozen.clone()]),
        ] {
            let Value::Error(e) = result else {
                panic!("expected E5011");
            };
            assert_eq!(e.code, "E5011");
        }
    }

    #[test]
    fn test_sort_and_unorderable() {
        let arr = ints(&[3, 1, 2]);
        arrays_sort(&[arr.clone()]);
        assert_eq!(arr.try_eq(&ints(&[1, 2, 3])), Some(true));

        let mixed = Value::array(vec![Value::int(1), Value::Str("x".into())]);
        let Value::Error(e) = arrays_sort(&[mixed]) else {
            panic!()
        };
        assert_eq!(e.code, "E9004");
    }

    #[test]
    fn test_slice_bounds() {
        let v = arrays_slice(&[ints(&[1, 2, 3, 4]), Value::int(1), Value::int(3)]);
        assert_eq!(v.try_eq(&ints(&[2, 3])), Some(true));
        let Value::Error(e) = arrays_slice(&[ints(&[1]), Value::int(0), Value::int(5)]) else {
            panic!()
        };
        assert_eq!(e.code, "E9003");
    }

    #[test]
    fn test_clone_detaches_storage() {
        let arr = ints(&[1]);
        let copy = arrays_clone(&[arr.clone()]);
        arrays_push(&[copy, Value::int(2)]);
        let Value::Array { elements, .. } = arr else {
            panic!()
        };
        assert_eq!(elements.borrow().len(), 1);
    }
}
