use std::cmp::Ordering;
use std::fmt;

use super::error::EvaluationError;
use super::expr::CompareOp;

/// Values a condition can read from a transaction or compare against.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Amounts and numeric literals. Integer literals are widened.
    Number(f64),
    /// A UTF-8 string.
    String(String),
    /// A boolean literal.
    Bool(bool),
    /// An unset field or the `null` literal.
    Null,
}

impl Value {
    /// Compare this value to another using the given operator.
    ///
    /// Equality is defined across all types (`Null == Null`, mismatched types
    /// are unequal). Ordering operators need two numbers or two strings.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::TypeMismatch`] when an ordering operator is
    /// applied to incompatible operands (including `Null`).
    pub fn compare(&self, op: CompareOp, other: &Value) -> Result<bool, EvaluationError> {
        match op {
            CompareOp::Eq => return Ok(self.loose_eq(other)),
            CompareOp::Neq => return Ok(!self.loose_eq(other)),
            _ => {}
        }
        let ord = self
            .partial_cmp_value(other)
            .ok_or_else(|| EvaluationError::TypeMismatch {
                op,
                left: self.type_name(),
                right: other.type_name(),
            })?;
        Ok(match op {
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Gte => ord != Ordering::Less,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Lte => ord != Ordering::Greater,
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Neq => ord != Ordering::Equal,
        })
    }

    /// Short type name used in evaluation error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::Null => "null",
        }
    }

    fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }

    fn partial_cmp_value(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

#[allow(clippy::cast_precision_loss)]
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v as f64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Option<&str>> for Value {
    fn from(v: Option<&str>) -> Self {
        v.map_or(Value::Null, Value::from)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "\"{}\"", v.escape_default()),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Null => write!(f, "null"),
        }
    }
}
