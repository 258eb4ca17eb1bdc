//! The `math` module. Integer-preserving where the operation allows it;
//! anything transcendental goes through `f64`. Domain failures are `E8xxx`.

use crate::builtins::support::{as_float, as_int, expect_args, try_arg};
use crate::registry::ConstDef;
use crate::value::Value;
use ez_macros::builtin;
use num_traits::Signed;

inventory::submit! {
    ConstDef {
        name: "math.pi",
        summary: "The circle constant.",
        build: || Value::Float(std::f64::consts::PI),
    }
}

inventory::submit! {
    ConstDef {
        name: "math.e",
        summary: "Euler's number.",
        build: || Value::Float(std::f64::consts::E),
    }
}

#[builtin(name = "math.abs")]
/// Absolute value. Integers stay integers.
pub fn math_abs(args: &[Value]) -> Value {
    expect_args!("math.abs", args, 1);
    match &args[0] {
        Value::Integer(iv) => Value::typed_int(iv.value.abs(), iv.ty),
        Value::Byte(b) => Value::Byte(*b),
        Value::Float(f) => Value::Float(f.abs()),
        other => Value::error(
            "E7001",
            format!("math.abs: argument 1 must be a number, got {}", other.type_name()),
        ),
    }
}

#[builtin(name = "math.sqrt")]
/// Square root. Negative input is a domain error.
pub fn math_sqrt(args: &[Value]) -> Value {
    expect_args!("math.sqrt", args, 1);
    let x = try_arg!(as_float("math.sqrt", args, 0));
    if x < 0.0 {
        return Value::error("E8001", format!("square root of negative number {}", x));
    }
    Value::Float(x.sqrt())
}

#[builtin(name = "math.pow")]
/// `base` raised to `exponent`.
pub fn math_pow(args: &[Value]) -> Value {
    expect_args!("math.pow", args, 2);
    if let (Value::Integer(base), Value::Integer(exp)) = (&args[0], &args[1]) {
        if let Some(e) = num_traits::ToPrimitive::to_u32(&exp.value) {
            let result = num_traits::Pow::pow(&base.value, e);
            use crate::value::{IntType, RangeFault};
            return match IntType::check_range(base.ty, base.ty, &result) {
                Ok(ty) => Value::typed_int(result, ty),
                Err(RangeFault::Overflow(ty)) => Value::error(
                    "E5005",
                    format!("{} exceeds the maximum of `{}`", result, ty.name()),
                ),
                Err(RangeFault::Underflow(ty)) => Value::error(
                    "E5007",
                    format!("{} is below the minimum of `{}`", result, ty.name()),
                ),
            };
        }
    }
    let base = try_arg!(as_float("math.pow", args, 0));
    let exp = try_arg!(as_float("math.pow", args, 1));
    Value::Float(base.powf(exp))
}

#[builtin(name = "math.floor")]
/// Largest integer value not greater than the argument.
pub fn math_floor(args: &[Value]) -> Value {
    expect_args!("math.floor", args, 1);
    let x = try_arg!(as_float("math.floor", args, 0));
    Value::int(x.floor() as i64)
}

#[builtin(name = "math.ceil")]
/// Smallest integer value not less than the argument.
pub fn math_ceil(args: &[Value]) -> Value {
    expect_args!("math.ceil", args, 1);
    let x = try_arg!(as_float("math.ceil", args, 0));
    Value::int(x.ceil() as i64)
}

#[builtin(name = "math.round")]
/// Nearest integer, ties away from zero.
pub fn math_round(args: &[Value]) -> Value {
    expect_args!("math.round", args, 1);
    let x = try_arg!(as_float("math.round", args, 0));
    Value::int(x.round() as i64)
}

#[builtin(name = "math.min")]
/// Smaller of two numbers.
pub fn math_min(args: &[Value]) -> Value {
    expect_args!("math.min", args, 2);
    if let (Value::Integer(a), Value::Integer(b)) = (&args[0], &args[1]) {
        let ty = crate::value::IntType::combine(a.ty, b.ty);
        return Value::typed_int(a.value.clone().min(b.value.clone()), ty);
    }
    let a = try_arg!(as_float("math.min", args, 0));
    let b = try_arg!(as_float("math.min", args, 1));
    Value::Float(a.min(b))
}

#[builtin(name = "math.max")]
/// Larger of two numbers.
pub fn math_max(args: &[Value]) -> Value {
    expect_args!("math.max", args, 2);
    if let (Value::Integer(a), Value::Integer(b)) = (&args[0], &args[1]) {
        let ty = crate::value::IntType::combine(a.ty, b.ty);
        return Value::typed_int(a.value.clone().max(b.value.clone()), ty);
    }
    let a = try_arg!(as_float("math.max", args, 0));
    let b = try_arg!(as_float("math.max", args, 1));
    Value::Float(a.max(b))
}

#[builtin(name = "math.clamp")]
/// Restrict a value to `[low, high]`.
pub fn math_clamp(args: &[Value]) -> Value {
    expect_args!("math.clamp", args, 3);
    let x = try_arg!(as_float("math.clamp", args, 0));
    let low = try_arg!(as_float("math.clamp", args, 1));
    let high = try_arg!(as_float("math.clamp", args, 2));
    if low > high {
        return Value::error("E7004", "math.clamp: low bound exceeds high bound");
    }
    Value::Float(x.clamp(low, high))
}

#[builtin(name = "math.log")]
/// Natural logarithm. Non-positive input is a domain error.
pub fn math_log(args: &[Value]) -> Value {
    expect_args!("math.log", args, 1);
    let x = try_arg!(as_float("math.log", args, 0));
    if x <= 0.0 {
        return Value::error("E8002", format!("logarithm of non-positive number {}", x));
    }
    Value::Float(x.ln())
}

#[builtin(name = "math.sin")]
/// Sine of an angle in radians.
pub fn math_sin(args: &[Value]) -> Value {
    expect_args!("math.sin", args, 1);
    let x = try_arg!(as_float("math.sin", args, 0));
    Value::Float(x.sin())
}

#[builtin(name = "math.cos")]
/// Cosine of an angle in radians.
pub fn math_cos(args: &[Value]) -> Value {
    expect_args!("math.cos", args, 1);
    let x = try_arg!(as_float("math.cos", args, 0));
    Value::Float(x.cos())
}

#[builtin(name = "math.tan")]
/// Tangent of an angle in radians.
pub fn math_tan(args: &[Value]) -> Value {
    expect_args!("math.tan", args, 1);
    let x = try_arg!(as_float("math.tan", args, 0));
    Value::Float(x.tan())
}

#[builtin(name = "math.sign")]
/// -1, 0, or 1 by the sign of an integer.
pub fn math_sign(args: &[Value]) -> Value {
    expect_args!("math.sign", args, 1);
    let iv = try_arg!(as_int("math.sign", args, 0));
    Value::int(match iv.value.sign() {
        num_bigint::Sign::Minus => -1,
        num_bigint::Sign::NoSign => 0,
        num_bigint::Sign::Plus => 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqrt_domain() {
        let v = math_sqrt(&[Value::int(9)]);
        assert!(matches!(v, Value::Float(f) if (f - 3.0).abs() < 1e-12));
        let Value::Error(e) = math_sqrt(&[Value::int(-1)]) else {
            panic!()
        };
        assert_eq!(e.code, "E8001");
    }

    #[test]
    fn test_log_domain() {
        let Value::Error(e) = math_log(&[Value::int(0)]) else {
            panic!()
        };
        assert_eq!(e.code, "E8002");
    }

    #[test]
    fn test_abs_preserves_declared_type() {
        use crate::value::IntType;
        let ty = IntType::from_name("i16").unwrap();
        let Value::Integer(iv) = math_abs(&[Value::typed_int(-5, ty)]) else {
            panic!()
        };
        assert_eq!(iv.ty, ty);
        assert_eq!(iv.value, 5.into());
    }

    #[test]
    fn test_int_pow_range_checked() {
        let Value::Error(e) = math_pow(&[Value::int(2), Value::int(64)]) else {
            panic!()
        };
        assert_eq!(e.code, "E5005");
        let v = math_pow(&[Value::int(2), Value::int(10)]);
        assert_eq!(v.try_eq(&Value::int(1024)), Some(true));
    }
}
