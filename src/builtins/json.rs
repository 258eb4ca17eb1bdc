//! The `json` module, bridging EZ values and `serde_json`. Failures are
//! `E13xxx`.

use crate::builtins::support::{as_str, expect_args, try_arg};
use crate::value::{MapKey, Value};
use ez_macros::builtin;
use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

#[builtin(name = "json.parse")]
/// Parse JSON text into EZ values: objects become maps, arrays become
/// arrays, integral numbers become integers.
pub fn json_parse(args: &[Value]) -> Value {
    expect_args!("json.parse", args, 1);
    let text = try_arg!(as_str("json.parse", args, 0));
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json) => from_json(&json),
        Err(e) => Value::error("E13001", format!("invalid JSON: {}", e)),
    }
}

#[builtin(name = "json.stringify")]
/// Serialize an EZ value as JSON text.
pub fn json_stringify(args: &[Value]) -> Value {
    expect_args!("json.stringify", args, 1);
    match to_json(&args[0]) {
        Ok(json) => Value::Str(json.to_string()),
        Err(e) => e,
    }
}

fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::int(i)
            } else if let Some(u) = n.as_u64() {
                Value::int(BigInt::from(u))
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => Value::array(items.iter().map(from_json).collect()),
        serde_json::Value::Object(obj) => {
            let mut entries = IndexMap::new();
            for (k, v) in obj {
                entries.insert(MapKey::Str(k.clone()), from_json(v));
            }
            Value::map(entries)
        }
    }
}

fn to_json(value: &Value) -> Result<serde_json::Value, Value> {
    match value {
        Value::Nil => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Integer(iv) => match iv.value.to_i64() {
            Some(i) => Ok(serde_json::Value::from(i)),
            None => match iv.value.to_u64() {
                Some(u) => Ok(serde_json::Value::from(u)),
                None => Err(Value::error(
                    "E13002",
                    format!("{} does not fit a JSON number", iv.value),
                )),
            },
        },
        Value::Byte(b) => Ok(serde_json::Value::from(*b)),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| Value::error("E13002", "non-finite float has no JSON form")),
        Value::Char(c) => Ok(serde_json::Value::from(c.to_string())),
        Value::Str(s) => Ok(serde_json::Value::from(s.clone())),
        Value::Array { elements, .. } => {
            let mut out = Vec::with_capacity(elements.borrow().len());
            for el in elements.borrow().iter() {
                out.push(to_json(el)?);
            }
            Ok(serde_json::Value::Array(out))
        }
        Value::Map { entries, .. } => {
            let mut obj = serde_json::Map::new();
            for (k, v) in entries.borrow().iter() {
                let key = match k {
                    MapKey::Str(s) => s.clone(),
                    other => other.to_string(),
                };
                obj.insert(key, to_json(v)?);
            }
            Ok(serde_json::Value::Object(obj))
        }
        Value::Struct { fields, .. } => {
            let mut obj = serde_json::Map::new();
            for (k, v) in fields {
                obj.insert(k.clone(), to_json(v)?);
            }
            Ok(serde_json::Value::Object(obj))
        }
        Value::EnumValue { value, .. } => to_json(value),
        other => Err(Value::error(
            "E13002",
            format!("{} has no JSON representation", other.type_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shapes() {
        let v = json_parse(&[Value::Str(r#"{"n": 3, "xs": [1.5, null, true]}"#.into())]);
        let Value::Map { entries, .. } = &v else {
            panic!()
        };
        let map = entries.borrow();
        assert_eq!(map[&MapKey::Str("n".into())].try_eq(&Value::int(3)), Some(true));
        let Value::Array { elements, .. } = &map[&MapKey::Str("xs".into())] else {
            panic!()
        };
        assert!(matches!(elements.borrow()[1], Value::Nil));
    }

    #[test]
    fn test_invalid_json() {
        let Value::Error(e) = json_parse(&[Value::Str("{nope".into())]) else {
            panic!()
        };
        assert_eq!(e.code, "E13001");
    }

    #[test]
    fn test_stringify_round_trip() {
        let v = json_parse(&[Value::Str(r#"{"a":1,"b":[true,"x"]}"#.into())]);
        let s = json_stringify(&[v]);
        let Value::Str(text) = s else { panic!() };
        assert_eq!(text, r#"{"a":1,"b":[true,"x"]}"#);
    }

    #[test]
    fn test_unrepresentable() {
        let huge = Value::int(num_bigint::BigInt::from(2u8).pow(80));
        let Value::Error(e) = json_stringify(&[huge]) else {
            panic!()
        };
        assert_eq!(e.code, "E13002");
    }
}
