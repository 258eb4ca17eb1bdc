//! The `uuid` module.

use crate::builtins::support::expect_args;
use crate::value::Value;
use ez_macros::builtin;

#[builtin(name = "uuid.v4")]
/// A random version-4 UUID in canonical hyphenated form.
pub fn uuid_v4(args: &[Value]) -> Value {
    expect_args!("uuid.v4", args, 0);
    Value::Str(uuid::Uuid::new_v4().to_string())
}
