//! The `maps` module. Entries keep insertion order; mutating members
//! respect the handle's mutability flag. Domain failures are `E12xxx`.

use crate::builtins::support::{as_map, expect_args, require_mutable, try_arg};
use crate::value::{MapKey, Value};
use ez_macros::builtin;

fn key_arg(name: &str, args: &[Value], index: usize) -> Result<MapKey, Value> {
    MapKey::from_value(&args[index]).ok_or_else(|| {
        Value::error(
            "E5013",
            format!(
                "{}: {} cannot be used as a map key",
                name,
                args[index].type_name()
            ),
        )
    })
}

#[builtin(name = "maps.keys")]
/// The keys in insertion order.
pub fn maps_keys(args: &[Value]) -> Value {
    expect_args!("maps.keys", args, 1);
    let (entries, _) = try_arg!(as_map("maps.keys", args, 0));
    let keys = entries.borrow().keys().map(MapKey::to_value).collect();
    Value::array(keys)
}

#[builtin(name = "maps.values")]
/// The values in insertion order.
pub fn maps_values(args: &[Value]) -> Value {
    expect_args!("maps.values", args, 1);
    let (entries, _) = try_arg!(as_map("maps.values", args, 0));
    let values = entries.borrow().values().cloned().collect();
    Value::array(values)
}

#[builtin(name = "maps.entries")]
/// `{key, value}` pairs in insertion order.
pub fn maps_entries(args: &[Value]) -> Value {
    expect_args!("maps.entries", args, 1);
    let (entries, _) = try_arg!(as_map("maps.entries", args, 0));
    let pairs = entries
        .borrow()
        .iter()
        .map(|(k, v)| Value::array(vec![k.to_value(), v.clone()]))
        .collect();
    Value::array(pairs)
}

#[builtin(name = "maps.has_key")]
/// True if the map has an entry for the key.
pub fn maps_has_key(args: &[Value]) -> Value {
    expect_args!("maps.has_key", args, 2);
    let (entries, _) = try_arg!(as_map("maps.has_key", args, 0));
    let key = try_arg!(key_arg("maps.has_key", args, 1));
    let result = Value::Bool(entries.borrow().contains_key(&key));
    result
}

#[builtin(name = "maps.get_or")]
/// The value for the key, or the default when absent.
pub fn maps_get_or(args: &[Value]) -> Value {
    expect_args!("maps.get_or", args, 3);
    let (entries, _) = try_arg!(as_map("maps.get_or", args, 0));
    let key = try_arg!(key_arg("maps.get_or", args, 1));
    let result = entries
        .borrow()
        .get(&key)
        .cloned()
        .unwrap_or_else(|| args[2].clone());
    result
}

#[builtin(name = "maps.remove")]
/// Remove and return the entry for the key.
pub fn maps_remove(args: &[Value]) -> Value {
    expect_args!("maps.remove", args, 2);
    let (entries, mutable) = try_arg!(as_map("maps.remove", args, 0));
    try_arg!(require_mutable("maps.remove", mutable));
    let key = try_arg!(key_arg("maps.remove", args, 1));
    let result = match entries.borrow_mut().shift_remove(&key) {
        Some(v) => v,
        None => Value::error("E12001", format!("map has no key {}", key)),
    };
    result
}

#[builtin(name = "maps.merge")]
/// A new map holding the first map's entries overlaid with the second's.
pub fn maps_merge(args: &[Value]) -> Value {
    expect_args!("maps.merge", args, 2);
    let (a, _) = try_arg!(as_map("maps.merge", args, 0));
    let (b, _) = try_arg!(as_map("maps.merge", args, 1));
    let mut out = a.borrow().clone();
    for (k, v) in b.borrow().iter() {
        out.insert(k.clone(), v.clone());
    }
    Value::map(out)
}

#[builtin(name = "maps.clear")]
/// Remove every entry, in place.
pub fn maps_clear(args: &[Value]) -> Value {
    expect_args!("maps.clear", args, 1);
    let (entries, mutable) = try_arg!(as_map("maps.clear", args, 0));
    try_arg!(require_mutable("maps.clear", mutable));
    entries.borrow_mut().clear();
    Value::Nil
}

#[builtin(name = "maps.size")]
/// The number of entries.
pub fn maps_size(args: &[Value]) -> Value {
    expect_args!("maps.size", args, 1);
    let (entries, _) = try_arg!(as_map("maps.size", args, 0));
    let n = entries.borrow().len();
    Value::int(n as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn sample() -> Value {
        let mut entries = IndexMap::new();
        entries.insert(MapKey::Str("b".into()), Value::int(1));
        entries.insert(MapKey::Str("a".into()), Value::int(2));
        Value::map(entries)
    }

    #[test]
    fn test_keys_keep_insertion_order() {
        let Value::Array { elements, .. } = maps_keys(&[sample()]) else {
            panic!()
        };
        let keys = elements.borrow();
        assert_eq!(keys[0].try_eq(&Value::Str("b".into())), Some(true));
        assert_eq!(keys[1].try_eq(&Value::Str("a".into())), Some(true));
    }

    #[test]
    fn test_remove_missing_key() {
        let Value::Error(e) = maps_remove(&[sample(), Value::Str("zz".into())]) else {
            panic!()
        };
        assert_eq!(e.code, "E12001");
    }

    #[test]
    fn test_const_map_rejects_mutation() {
        let Value::Map { entries, .. } = sample() else {
            panic!()
        };
        let frozen = Value::Map {
            entries,
            mutable: false,
        };
        let Value::Error(e) = maps_remove(&[frozen.clone(), Value::Str("a".into())]) else {
            panic!()
        };
        assert_eq!(e.code, "E5011");
        let Value::Error(e) = maps_clear(&[frozen]) else {
            panic!()
        };
        assert_eq!(e.code, "E5011");
    }

    #[test]
    fn test_get_or_and_merge() {
        let v = maps_get_or(&[sample(), Value::Str("zz".into()), Value::int(9)]);
        assert_eq!(v.try_eq(&Value::int(9)), Some(true));

        let mut extra = IndexMap::new();
        extra.insert(MapKey::Str("a".into()), Value::int(99));
        let merged = maps_merge(&[sample(), Value::map(extra)]);
        let size = maps_size(&[merged.clone()]);
        assert_eq!(size.try_eq(&Value::int(2)), Some(true));
        let Value::Map { entries, .. } = merged else {
            panic!()
        };
        assert_eq!(
            entries.borrow()[&MapKey::Str("a".into())].try_eq(&Value::int(99)),
            Some(true)
        );
    }
}
