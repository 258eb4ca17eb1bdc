//! The `encoding` module: base64 and hex. Failures are `E16xxx`.

use crate::builtins::support::{as_bytes, as_str, bytes_to_value, expect_args, try_arg};
use crate::value::Value;
use base64::Engine;
use ez_macros::builtin;

#[builtin(name = "encoding.base64_encode")]
/// Base64 of a string or byte array.
pub fn encoding_base64_encode(args: &[Value]) -> Value {
    expect_args!("encoding.base64_encode", args, 1);
    let raw = try_arg!(as_bytes("encoding.base64_encode", args, 0));
    Value::Str(base64::engine::general_purpose::STANDARD.encode(raw))
}

#[builtin(name = "encoding.base64_decode")]
/// Decode base64 text into a byte array.
pub fn encoding_base64_decode(args: &[Value]) -> Value {
    expect_args!("encoding.base64_decode", args, 1);
    let text = try_arg!(as_str("encoding.base64_decode", args, 0));
    match base64::engine::general_purpose::STANDARD.decode(text) {
        Ok(raw) => bytes_to_value(raw),
        Err(e) => Value::error("E16001", format!("invalid base64: {}", e)),
    }
}

#[builtin(name = "encoding.hex_encode")]
/// Lowercase hex of a string or byte array.
pub fn encoding_hex_encode(args: &[Value]) -> Value {
    expect_args!("encoding.hex_encode", args, 1);
    let raw = try_arg!(as_bytes("encoding.hex_encode", args, 0));
    Value::Str(hex::encode(raw))
}

#[builtin(name = "encoding.hex_decode")]
/// Decode hex text into a byte array.
pub fn encoding_hex_decode(args: &[Value]) -> Value {
    expect_args!("encoding.hex_decode", args, 1);
    let text = try_arg!(as_str("encoding.hex_decode", args, 0));
    match hex::decode(text) {
        Ok(raw) => bytes_to_value(raw),
        Err(e) => Value::error("E16001", format!("invalid hex: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_round_trip() {
        let encoded = encoding_base64_encode(&[Value::Str("hello".into())]);
        assert_eq!(encoded.try_eq(&Value::Str("aGVsbG8=".into())), Some(true));
        let decoded = encoding_base64_decode(&[encoded]);
        let text = crate::builtins::bytes::bytes_to_string(&[decoded]);
        assert_eq!(text.try_eq(&Value::Str("hello".into())), Some(true));
    }

    #[test]
    fn test_bad_inputs() {
        let Value::Error(e) = encoding_base64_decode(&[Value::Str("!!".into())]) else {
            panic!()
        };
        assert_eq!(e.code, "E16001");
        let Value::Error(e) = encoding_hex_decode(&[Value::Str("xyz".into())]) else {
            panic!()
        };
        assert_eq!(e.code, "E16001");
    }

    #[test]
    fn test_hex_encode() {
        let v = encoding_hex_encode(&[Value::Str("AB".into())]);
        assert_eq!(v.try_eq(&Value::Str("4142".into())), Some(true));
    }
}
