//! Scalar values
//!
//! A [`Value`] is the only data the compiler embeds into bytecode: an
//! integer, a float, a piece of text, or the absent marker used for
//! unfilled array slots. Arithmetic and bitwise operators are defined only
//! between numeric variants; text never converts to or from a number.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One-byte type tag written before every embedded immediate
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// 64-bit signed integer
    Int = 0,
    /// 64-bit float
    Float = 1,
    /// Length-prefixed UTF-8 text
    Text = 2,
    /// No value
    Absent = 3,
}

impl TypeTag {
    /// Decode a tag byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Int),
            1 => Some(Self::Float),
            2 => Some(Self::Text),
            3 => Some(Self::Absent),
            _ => None,
        }
    }

    /// Human-readable type name
    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::Absent => "absent",
        }
    }
}

/// Errors raised by value conversions and operators
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    /// The conversion or operator has no defined result for these types
    #[error("unsupported operation `{op}` on {lhs}{}", .rhs.map(|r| format!(" and {r}")).unwrap_or_default())]
    Unsupported {
        /// Operator or conversion name
        op: &'static str,
        /// Type of the left (or only) operand
        lhs: &'static str,
        /// Type of the right operand, if any
        rhs: Option<&'static str>,
    },

    /// Integer division or remainder by zero
    #[error("integer division by zero")]
    DivisionByZero,

    /// Integer result does not fit in 64 bits
    #[error("integer overflow in `{0}`")]
    Overflow(&'static str),

    /// A float cannot be narrowed to an integer without loss of range
    #[error("float {0} cannot be narrowed to an integer")]
    NotRepresentable(f64),
}

/// A scalar value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// No value
    #[default]
    Absent,
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// UTF-8 text
    Text(String),
}

/// Numeric view of a value after promotion
enum Numeric {
    Int(i64, i64),
    Float(f64, f64),
}

impl Value {
    /// Type tag of this value
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Absent => TypeTag::Absent,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Text(_) => TypeTag::Text,
        }
    }

    /// Type name of this value
    pub fn type_name(&self) -> &'static str {
        self.tag().name()
    }

    /// Whether this value is an integer or a float
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Narrow to an integer. Floats truncate toward zero; non-finite or
    /// out-of-range floats are rejected.
    pub fn to_int(&self) -> Result<i64, ValueError> {
        match self {
            Value::Int(v) => Ok(*v),
            Value::Float(v) => {
                if v.is_finite() && *v >= i64::MIN as f64 && *v < i64::MAX as f64 {
                    Ok(v.trunc() as i64)
                } else {
                    Err(ValueError::NotRepresentable(*v))
                }
            }
            other => Err(ValueError::Unsupported {
                op: "to_int",
                lhs: other.type_name(),
                rhs: None,
            }),
        }
    }

    /// Widen to a float
    pub fn to_float(&self) -> Result<f64, ValueError> {
        match self {
            Value::Int(v) => Ok(*v as f64),
            Value::Float(v) => Ok(*v),
            other => Err(ValueError::Unsupported {
                op: "to_float",
                lhs: other.type_name(),
                rhs: None,
            }),
        }
    }

    /// Truthiness of a numeric value (non-zero)
    pub fn is_truthy(&self) -> Result<bool, ValueError> {
        match self {
            Value::Int(v) => Ok(*v != 0),
            Value::Float(v) => Ok(*v != 0.0),
            other => Err(ValueError::Unsupported {
                op: "truthiness",
                lhs: other.type_name(),
                rhs: None,
            }),
        }
    }

    fn promote(&self, rhs: &Value, op: &'static str) -> Result<Numeric, ValueError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Numeric::Int(*a, *b)),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                Ok(Numeric::Float(self.to_float()?, rhs.to_float()?))
            }
            _ => Err(ValueError::Unsupported {
                op,
                lhs: self.type_name(),
                rhs: Some(rhs.type_name()),
            }),
        }
    }

    /// Bitwise and shift operands must both be integers; floats are never
    /// truncated implicitly
    fn int_pair(&self, rhs: &Value, op: &'static str) -> Result<(i64, i64), ValueError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok((*a, *b)),
            _ => Err(ValueError::Unsupported {
                op,
                lhs: self.type_name(),
                rhs: Some(rhs.type_name()),
            }),
        }
    }

    /// `self + rhs`
    pub fn try_add(&self, rhs: &Value) -> Result<Value, ValueError> {
        match self.promote(rhs, "+")? {
            Numeric::Int(a, b) => a.checked_add(b).map(Value::Int).ok_or(ValueError::Overflow("+")),
            Numeric::Float(a, b) => Ok(Value::Float(a + b)),
        }
    }

    /// `self - rhs`
    pub fn try_sub(&self, rhs: &Value) -> Result<Value, ValueError> {
        match self.promote(rhs, "-")? {
            Numeric::Int(a, b) => a.checked_sub(b).map(Value::Int).ok_or(ValueError::Overflow("-")),
            Numeric::Float(a, b) => Ok(Value::Float(a - b)),
        }
    }

    /// `self * rhs`
    pub fn try_mul(&self, rhs: &Value) -> Result<Value, ValueError> {
        match self.promote(rhs, "*")? {
            Numeric::Int(a, b) => a.checked_mul(b).map(Value::Int).ok_or(ValueError::Overflow("*")),
            Numeric::Float(a, b) => Ok(Value::Float(a * b)),
        }
    }

    /// `self / rhs`
    pub fn try_div(&self, rhs: &Value) -> Result<Value, ValueError> {
        match self.promote(rhs, "/")? {
            Numeric::Int(_, 0) => Err(ValueError::DivisionByZero),
            Numeric::Int(a, b) => a.checked_div(b).map(Value::Int).ok_or(ValueError::Overflow("/")),
            Numeric::Float(a, b) => Ok(Value::Float(a / b)),
        }
    }

    /// `self % rhs`
    pub fn try_rem(&self, rhs: &Value) -> Result<Value, ValueError> {
        match self.promote(rhs, "%")? {
            Numeric::Int(_, 0) => Err(ValueError::DivisionByZero),
            Numeric::Int(a, b) => a.checked_rem(b).map(Value::Int).ok_or(ValueError::Overflow("%")),
            Numeric::Float(a, b) => Ok(Value::Float(a % b)),
        }
    }

    /// `self ** rhs`
    pub fn try_pow(&self, rhs: &Value) -> Result<Value, ValueError> {
        match self.promote(rhs, "**")? {
            Numeric::Int(a, b) if b >= 0 => u32::try_from(b)
                .ok()
                .and_then(|exp| a.checked_pow(exp))
                .map(Value::Int)
                .ok_or(ValueError::Overflow("**")),
            Numeric::Int(a, b) => Ok(Value::Float((a as f64).powf(b as f64))),
            Numeric::Float(a, b) => Ok(Value::Float(a.powf(b))),
        }
    }

    /// `self & rhs`
    pub fn bit_and(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.int_pair(rhs, "&")?;
        Ok(Value::Int(a & b))
    }

    /// `self | rhs`
    pub fn bit_or(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.int_pair(rhs, "|")?;
        Ok(Value::Int(a | b))
    }

    /// `self ^ rhs`
    pub fn bit_xor(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.int_pair(rhs, "^")?;
        Ok(Value::Int(a ^ b))
    }

    /// `self << rhs`
    pub fn try_shl(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.int_pair(rhs, "<<")?;
        u32::try_from(b)
            .ok()
            .and_then(|s| a.checked_shl(s))
            .map(Value::Int)
            .ok_or(ValueError::Overflow("<<"))
    }

    /// `self >> rhs`
    pub fn try_shr(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.int_pair(rhs, ">>")?;
        u32::try_from(b)
            .ok()
            .and_then(|s| a.checked_shr(s))
            .map(Value::Int)
            .ok_or(ValueError::Overflow(">>"))
    }

    fn compare(&self, rhs: &Value, op: &'static str) -> Result<std::cmp::Ordering, ValueError> {
        let ordering = match self.promote(rhs, op)? {
            Numeric::Int(a, b) => Some(a.cmp(&b)),
            Numeric::Float(a, b) => a.partial_cmp(&b),
        };
        ordering.ok_or(ValueError::Unsupported {
            op,
            lhs: "NaN",
            rhs: None,
        })
    }

    /// `self == rhs`, as 1 or 0
    pub fn equal(&self, rhs: &Value) -> Result<Value, ValueError> {
        Ok(Value::from(self.compare(rhs, "==")?.is_eq()))
    }

    /// `self != rhs`, as 1 or 0
    pub fn not_equal(&self, rhs: &Value) -> Result<Value, ValueError> {
        Ok(Value::from(self.compare(rhs, "!=")?.is_ne()))
    }

    /// `self < rhs`, as 1 or 0
    pub fn less(&self, rhs: &Value) -> Result<Value, ValueError> {
        Ok(Value::from(self.compare(rhs, "<")?.is_lt()))
    }

    /// `self <= rhs`, as 1 or 0
    pub fn less_equal(&self, rhs: &Value) -> Result<Value, ValueError> {
        Ok(Value::from(self.compare(rhs, "<=")?.is_le()))
    }

    /// `self > rhs`, as 1 or 0
    pub fn greater(&self, rhs: &Value) -> Result<Value, ValueError> {
        Ok(Value::from(self.compare(rhs, ">")?.is_gt()))
    }

    /// `self >= rhs`, as 1 or 0
    pub fn greater_equal(&self, rhs: &Value) -> Result<Value, ValueError> {
        Ok(Value::from(self.compare(rhs, ">=")?.is_ge()))
    }

    /// `self && rhs`, as 1 or 0
    pub fn logical_and(&self, rhs: &Value) -> Result<Value, ValueError> {
        Ok(Value::from(self.is_truthy()? && rhs.is_truthy()?))
    }

    /// `self || rhs`, as 1 or 0
    pub fn logical_or(&self, rhs: &Value) -> Result<Value, ValueError> {
        Ok(Value::from(self.is_truthy()? || rhs.is_truthy()?))
    }

    /// `-self`
    pub fn try_neg(&self) -> Result<Value, ValueError> {
        match self {
            Value::Int(v) => v.checked_neg().map(Value::Int).ok_or(ValueError::Overflow("-")),
            Value::Float(v) => Ok(Value::Float(-v)),
            other => Err(ValueError::Unsupported {
                op: "-",
                lhs: other.type_name(),
                rhs: None,
            }),
        }
    }

    /// `!self`, as 1 or 0
    pub fn try_not(&self) -> Result<Value, ValueError> {
        Ok(Value::from(!self.is_truthy()?))
    }

    /// `~self`
    pub fn bit_not(&self) -> Result<Value, ValueError> {
        match self {
            Value::Int(value) => Ok(Value::Int(!value)),
            other => Err(ValueError::Unsupported {
                op: "~",
                lhs: other.type_name(),
                rhs: None,
            }),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Int(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => write!(f, "absent"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Text(s) => write!(f, "{:?}", s),
        }
    }
}
