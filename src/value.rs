// ABOUTME: Runtime values for the EZ interpreter
// Value is a closed sum covering every runtime shape, including the
// propagation sentinels (Break, Continue, ReturnValue) and the error value
// the evaluator threads upward instead of unwinding. Integers are
// arbitrary-precision with a declared type that drives range checks.

use crate::ast::{Block, Param, Position, TypeAnnot};
use crate::env::Environment;
use crate::registry::BuiltinFn;
use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::{One, ToPrimitive, Zero};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Declared integer types. `int` carries the `i64` range, `uint` the `u64`
/// range; the sized forms carry the range their name says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntType {
    Int,
    Uint,
    Sized { bits: u16, signed: bool },
}

impl IntType {
    pub fn from_name(name: &str) -> Option<IntType> {
        match name {
            "int" => return Some(IntType::Int),
            "uint" => return Some(IntType::Uint),
            _ => {}
        }
        if !name.is_ascii() || name.len() < 2 {
            return None;
        }
        let (signed, rest) = match name.split_at(1) {
            ("i", rest) => (true, rest),
            ("u", rest) => (false, rest),
            _ => return None,
        };
        let bits: u16 = rest.parse().ok()?;
        if matches!(bits, 8 | 16 | 32 | 64 | 128 | 256) {
            Some(IntType::Sized { bits, signed })
        } else {
            None
        }
    }

    pub fn name(&self) -> String {
        match self {
            IntType::Int => "int".to_string(),
            IntType::Uint => "uint".to_string(),
            IntType::Sized { bits, signed } => {
                format!("{}{}", if *signed { "i" } else { "u" }, bits)
            }
        }
    }

    pub fn bits(&self) -> u16 {
        match self {
            IntType::Int | IntType::Uint => 64,
            IntType::Sized { bits, .. } => *bits,
        }
    }

    pub fn signed(&self) -> bool {
        match self {
            IntType::Int => true,
            IntType::Uint => false,
            IntType::Sized { signed, .. } => *signed,
        }
    }

    pub fn min(&self) -> BigInt {
        if self.signed() {
            -(BigInt::one() << (self.bits() - 1) as u32)
        } else {
            BigInt::zero()
        }
    }

    pub fn max(&self) -> BigInt {
        if self.signed() {
            (BigInt::one() << (self.bits() - 1) as u32) - 1
        } else {
            (BigInt::one() << self.bits() as u32) - 1
        }
    }

    pub fn contains(&self, value: &BigInt) -> bool {
        *value >= self.min() && *value <= self.max()
    }

    /// The type an arithmetic result carries when the operands differ.
    /// `int` is the default literal type and adapts to the other operand;
    /// between two explicitly sized types the narrower width wins, and at
    /// equal width the signed type wins.
    pub fn combine(a: IntType, b: IntType) -> IntType {
        if a == b {
            return a;
        }
        if a == IntType::Int {
            return b;
        }
        if b == IntType::Int {
            return a;
        }
        match a.bits().cmp(&b.bits()) {
            std::cmp::Ordering::Less => a,
            std::cmp::Ordering::Greater => b,
            std::cmp::Ordering::Equal => {
                if a.signed() {
                    a
                } else {
                    b
                }
            }
        }
    }

    /// Range an arithmetic result must fit. Same-width signed/unsigned
    /// pairs (both explicit) are held to the intersection of the two ranges.
    pub fn check_range(a: IntType, b: IntType, value: &BigInt) -> Result<IntType, RangeFault> {
        let target = IntType::combine(a, b);
        let explicit_mix = a != IntType::Int
            && b != IntType::Int
            && a.bits() == b.bits()
            && a.signed() != b.signed();
        let (min, max) = if explicit_mix {
            (a.min().max(b.min()), a.max().min(b.max()))
        } else {
            (target.min(), target.max())
        };
        if *value > max {
            Err(RangeFault::Overflow(target))
        } else if *value < min {
            Err(RangeFault::Underflow(target))
        } else {
            Ok(target)
        }
    }
}

/// Why a value failed its declared-type range check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeFault {
    Overflow(IntType),
    Underflow(IntType),
}

/// An arbitrary-precision integer with its declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct IntValue {
    pub value: BigInt,
    pub ty: IntType,
}

impl IntValue {
    pub fn new(value: impl Into<BigInt>) -> Self {
        IntValue {
            value: value.into(),
            ty: IntType::Int,
        }
    }

    pub fn typed(value: impl Into<BigInt>, ty: IntType) -> Self {
        IntValue {
            value: value.into(),
            ty,
        }
    }

    pub fn to_usize(&self) -> Option<usize> {
        self.value.to_usize()
    }

    pub fn to_i64(&self) -> Option<i64> {
        self.value.to_i64()
    }
}

/// Keys a map may hold. Only hashable scalar values qualify.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Int(BigInt),
    Str(String),
    Bool(bool),
    Char(char),
}

impl MapKey {
    pub fn from_value(value: &Value) -> Option<MapKey> {
        match value {
            Value::Integer(i) => Some(MapKey::Int(i.value.clone())),
            Value::Byte(b) => Some(MapKey::Int(BigInt::from(*b))),
            Value::Str(s) => Some(MapKey::Str(s.clone())),
            Value::Bool(b) => Some(MapKey::Bool(*b)),
            Value::Char(c) => Some(MapKey::Char(*c)),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Int(i) => Value::Integer(IntValue::new(i.clone())),
            MapKey::Str(s) => Value::Str(s.clone()),
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Char(c) => Value::Char(*c),
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Int(i) => write!(f, "{}", i),
            MapKey::Str(s) => write!(f, "\"{}\"", s),
            MapKey::Bool(b) => write!(f, "{}", b),
            MapKey::Char(c) => write!(f, "'{}'", c),
        }
    }
}

/// A user-declared function with its captured environment. The environment
/// may transitively reach back to the function, so the handle is `Rc`.
#[derive(Debug)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub return_types: Vec<TypeAnnot>,
    pub body: Block,
    pub env: Rc<Environment>,
}

/// A runtime error. Errors are values: the evaluator returns them and every
/// enclosing construct propagates them like a return.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub code: String,
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub help: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Value {
    Integer(IntValue),
    Float(f64),
    Byte(u8),
    Char(char),
    Str(String),
    Bool(bool),
    Nil,
    /// Arrays share their interior: every handle to the same array observes
    /// mutation, and the flag on each handle records whether that handle may
    /// mutate.
    Array {
        elements: Rc<RefCell<Vec<Value>>>,
        mutable: bool,
    },
    Map {
        entries: Rc<RefCell<IndexMap<MapKey, Value>>>,
        mutable: bool,
    },
    Struct {
        name: String,
        fields: IndexMap<String, Value>,
    },
    EnumValue {
        enum_name: String,
        variant: String,
        value: Box<Value>,
    },
    Function(Rc<FunctionDef>),
    Builtin {
        name: &'static str,
        func: BuiltinFn,
    },
    Error(Box<RuntimeError>),
    ReturnValue(Vec<Value>),
    Break,
    Continue,
}

impl Value {
    pub fn int(value: impl Into<BigInt>) -> Value {
        Value::Integer(IntValue::new(value))
    }

    pub fn typed_int(value: impl Into<BigInt>, ty: IntType) -> Value {
        Value::Integer(IntValue::typed(value, ty))
    }

    pub fn array(elements: Vec<Value>) -> Value {
        Value::Array {
            elements: Rc::new(RefCell::new(elements)),
            mutable: true,
        }
    }

    pub fn map(entries: IndexMap<MapKey, Value>) -> Value {
        Value::Map {
            entries: Rc::new(RefCell::new(entries)),
            mutable: true,
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Value {
        Value::Error(Box::new(RuntimeError {
            code: code.to_string(),
            message: message.into(),
            line: None,
            column: None,
            help: None,
        }))
    }

    pub fn error_at(code: &str, message: impl Into<String>, pos: Position) -> Value {
        Value::Error(Box::new(RuntimeError {
            code: code.to_string(),
            message: message.into(),
            line: Some(pos.line),
            column: Some(pos.column),
            help: None,
        }))
    }

    pub fn error_with_help(
        code: &str,
        message: impl Into<String>,
        help: impl Into<String>,
    ) -> Value {
        Value::Error(Box::new(RuntimeError {
            code: code.to_string(),
            message: message.into(),
            line: None,
            column: None,
            help: Some(help.into()),
        }))
    }

    /// Attach a position to an error that does not already carry one.
    pub fn or_position(self, pos: Position) -> Value {
        match self {
            Value::Error(mut e) if e.line.is_none() => {
                e.line = Some(pos.line);
                e.column = Some(pos.column);
                Value::Error(e)
            }
            other => other,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// True for any of the three control-flow sentinels or an error.
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self,
            Value::Error(_) | Value::ReturnValue(_) | Value::Break | Value::Continue
        )
    }

    /// `false` and `nil` are falsy; every other value is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Nil)
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Integer(i) => i.ty.name(),
            Value::Float(_) => "float".to_string(),
            Value::Byte(_) => "byte".to_string(),
            Value::Char(_) => "char".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Nil => "nil".to_string(),
            Value::Array { .. } => "array".to_string(),
            Value::Map { .. } => "map".to_string(),
            Value::Struct { name, .. } => name.clone(),
            Value::EnumValue { enum_name, .. } => enum_name.clone(),
            Value::Function(_) => "function".to_string(),
            Value::Builtin { .. } => "builtin".to_string(),
            Value::Error(_) => "error".to_string(),
            Value::ReturnValue(_) => "return".to_string(),
            Value::Break => "break".to_string(),
            Value::Continue => "continue".to_string(),
        }
    }

    /// Structural equality for `==`/`!=`. Returns `None` when the two kinds
    /// cannot be compared; the evaluator turns enum mismatches into their own
    /// error code before consulting this.
    pub fn try_eq(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.value == b.value),
            (Value::Integer(a), Value::Byte(b)) => Some(a.value == BigInt::from(*b)),
            (Value::Byte(a), Value::Integer(b)) => Some(BigInt::from(*a) == b.value),
            (Value::Byte(a), Value::Byte(b)) => Some(a == b),
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                a.value.to_f64().map(|a| a == *b)
            }
            (Value::Float(a), Value::Float(b)) => Some(a == b),
            (Value::Char(a), Value::Char(b)) => Some(a == b),
            (Value::Str(a), Value::Str(b)) => Some(a == b),
            (Value::Bool(a), Value::Bool(b)) => Some(a == b),
            (Value::Nil, Value::Nil) => Some(true),
            (Value::Nil, _) | (_, Value::Nil) => Some(false),
            (Value::Array { elements: a, .. }, Value::Array { elements: b, .. }) => {
                if Rc::ptr_eq(a, b) {
                    return Some(true);
                }
                let a = a.borrow();
                let b = b.borrow();
                if a.len() != b.len() {
                    return Some(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.try_eq(y) {
                        Some(true) => {}
                        Some(false) => return Some(false),
                        None => return None,
                    }
                }
                Some(true)
            }
            (Value::Map { entries: a, .. }, Value::Map { entries: b, .. }) => {
                if Rc::ptr_eq(a, b) {
                    return Some(true);
                }
                let a = a.borrow();
                let b = b.borrow();
                if a.len() != b.len() {
                    return Some(false);
                }
                for (k, x) in a.iter() {
                    match b.get(k) {
                        Some(y) => match x.try_eq(y) {
                            Some(true) => {}
                            Some(false) => return Some(false),
                            None => return None,
                        },
                        None => return Some(false),
                    }
                }
                Some(true)
            }
            (
                Value::Struct {
                    name: an,
                    fields: af,
                },
                Value::Struct {
                    name: bn,
                    fields: bf,
                },
            ) => {
                if an != bn || af.len() != bf.len() {
                    return Some(false);
                }
                for (k, x) in af {
                    match bf.get(k) {
                        Some(y) => match x.try_eq(y) {
                            Some(true) => {}
                            other => return other,
                        },
                        None => return Some(false),
                    }
                }
                Some(true)
            }
            (
                Value::EnumValue {
                    enum_name: an,
                    variant: av,
                    ..
                },
                Value::EnumValue {
                    enum_name: bn,
                    variant: bv,
                    ..
                },
            ) if an == bn => Some(av == bv),
            _ => None,
        }
    }

    /// Display form used by string interpolation and `print`: strings and
    /// chars render verbatim, everything else as its literal form.
    pub fn display_plain(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Char(c) => c.to_string(),
            other => other.to_string(),
        }
    }
}

/// Nested rendering quotes strings and chars so collections read like
/// literals.
fn fmt_nested(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::Str(s) => write!(f, "\"{}\"", s),
        Value::Char(c) => write!(f, "'{}'", c),
        other => write!(f, "{}", other),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i.value),
            Value::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::Byte(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "{}", c),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
            Value::Array { elements, .. } => {
                write!(f, "{{")?;
                for (i, el) in elements.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    fmt_nested(el, f)?;
                }
                write!(f, "}}")
            }
            Value::Map { entries, .. } => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", k)?;
                    fmt_nested(v, f)?;
                }
                write!(f, "}}")
            }
            Value::Struct { name, fields } => {
                write!(f, "{}{{", name)?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", k)?;
                    fmt_nested(v, f)?;
                }
                write!(f, "}}")
            }
            Value::EnumValue {
                enum_name, variant, ..
            } => write!(f, "{}.{}", enum_name, variant),
            Value::Function(def) => write!(f, "<fn {}>", def.name),
            Value::Builtin { name, .. } => write!(f, "<builtin {}>", name),
            Value::Error(e) => write!(f, "error[{}]: {}", e.code, e.message),
            Value::ReturnValue(values) => {
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                Ok(())
            }
            Value::Break => write!(f, "<break>"),
            Value::Continue => write!(f, "<continue>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_type_ranges() {
        let i8t = IntType::from_name("i8").unwrap();
        assert_eq!(i8t.min(), BigInt::from(-128));
        assert_eq!(i8t.max(), BigInt::from(127));

        let u256 = IntType::from_name("u256").unwrap();
        assert_eq!(u256.min(), BigInt::zero());
        assert_eq!(u256.max(), (BigInt::one() << 256u32) - 1);

        assert_eq!(IntType::Int.max(), BigInt::from(i64::MAX));
        assert_eq!(IntType::Uint.max(), BigInt::from(u64::MAX));
        assert!(IntType::from_name("i7").is_none());
        assert!(IntType::from_name("x8").is_none());
    }

    #[test]
    fn test_combine_rules() {
        let i8t = IntType::from_name("i8").unwrap();
        let i16t = IntType::from_name("i16").unwrap();
        let i128t = IntType::from_name("i128").unwrap();
        // `int` adapts to the explicitly typed operand
        assert_eq!(IntType::combine(i8t, IntType::Int), i8t);
        assert_eq!(IntType::combine(IntType::Int, i128t), i128t);
        assert_eq!(IntType::combine(IntType::Int, IntType::Int), IntType::Int);
        // Two explicit widths: the narrower one governs
        assert_eq!(IntType::combine(i16t, i128t), i16t);
    }

    #[test]
    fn test_check_range_same_width_mixed_sign() {
        let i8t = IntType::from_name("i8").unwrap();
        let u8t = IntType::from_name("u8").unwrap();
        // intersection is 0..=127
        assert!(IntType::check_range(i8t, u8t, &BigInt::from(100)).is_ok());
        assert!(matches!(
            IntType::check_range(i8t, u8t, &BigInt::from(-1)),
            Err(RangeFault::Underflow(_))
        ));
        assert!(matches!(
            IntType::check_range(i8t, u8t, &BigInt::from(200)),
            Err(RangeFault::Overflow(_))
        ));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Nil.is_truthy());
        assert!(Value::int(0).is_truthy());
        assert!(Value::Str(String::new()).is_truthy());
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(Value::int(42).to_string(), "42");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(
            Value::array(vec![Value::int(1), Value::Str("a".into())]).to_string(),
            "{1, \"a\"}"
        );
    }

    #[test]
    fn test_enum_equality_same_type_only() {
        let red = Value::EnumValue {
            enum_name: "Color".into(),
            variant: "Red".into(),
            value: Box::new(Value::int(0)),
        };
        let blue = Value::EnumValue {
            enum_name: "Color".into(),
            variant: "Blue".into(),
            value: Box::new(Value::int(2)),
        };
        assert_eq!(red.try_eq(&blue), Some(false));
        assert_eq!(red.try_eq(&red.clone()), Some(true));
        assert_eq!(red.try_eq(&Value::int(0)), None);
    }

    #[test]
    fn test_map_key_round_trip() {
        let key = MapKey::from_value(&Value::Str("k".into())).unwrap();
        assert_eq!(key.to_value().try_eq(&Value::Str("k".into())), Some(true));
        assert!(MapKey::from_value(&Value::array(vec![])).is_none());
    }
}
