//! The `crypto` module: message digests as lowercase hex strings.

use crate::builtins::support::{as_bytes, expect_args, try_arg};
use crate::value::Value;
use ez_macros::builtin;
use md5::Md5;
use sha2::{Digest, Sha256, Sha512};

#[builtin(name = "crypto.sha256")]
/// SHA-256 digest of a string or byte array, hex encoded.
pub fn crypto_sha256(args: &[Value]) -> Value {
    expect_args!("crypto.sha256", args, 1);
    let raw = try_arg!(as_bytes("crypto.sha256", args, 0));
    Value::Str(hex::encode(Sha256::digest(raw)))
}

#[builtin(name = "crypto.sha512")]
/// SHA-512 digest of a string or byte array, hex encoded.
pub fn crypto_sha512(args: &[Value]) -> Value {
    expect_args!("crypto.sha512", args, 1);
    let raw = try_arg!(as_bytes("crypto.sha512", args, 0));
    Value::Str(hex::encode(Sha512::digest(raw)))
}

#[builtin(name = "crypto.md5")]
/// MD5 digest of a string or byte array, hex encoded.
pub fn crypto_md5(args: &[Value]) -> Value {
    expect_args!("crypto.md5", args, 1);
    let raw = try_arg!(as_bytes("crypto.md5", args, 0));
    Value::Str(hex::encode(Md5::digest(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digests() {
        let v = crypto_sha256(&[Value::Str("abc".into())]);
        assert_eq!(
            v.try_eq(&Value::Str(
                "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad".into()
            )),
            Some(true)
        );

        let v = crypto_md5(&[Value::Str("abc".into())]);
        assert_eq!(
            v.try_eq(&Value::Str("900150983cd24fb0d6963f7d28e17f72".into())),
            Some(true)
        );
    }

    #[test]
    fn test_byte_array_input() {
        let direct = crypto_sha256(&[Value::Str("hi".into())]);
        let via_bytes = crypto_sha256(&[Value::array(vec![
            Value::Byte(b'h'),
            Value::Byte(b'i'),
        ])]);
        assert_eq!(direct.try_eq(&via_bytes), Some(true));
    }
}
