use std::fmt;
use std::ops::Not;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::EvaluationError;
use super::record::Transaction;
use super::value::Value;

/// Comparison operators supported in rule conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Transaction fields a condition may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Amount,
    Merchant,
    MerchantType,
    Location,
    /// The category assigned so far. Lets forward-chaining rules react to an
    /// earlier rule's decision.
    Category,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Amount,
        Field::Merchant,
        Field::MerchantType,
        Field::Location,
        Field::Category,
    ];

    /// Name of the field as written in conditions.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Amount => "amount",
            Field::Merchant => "merchant",
            Field::MerchantType => "merchantType",
            Field::Location => "location",
            Field::Category => "category",
        }
    }
}

impl FromStr for Field {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL.into_iter().find(|f| f.as_str() == s).ok_or(())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition AST as produced by the parser. Field names are still strings.
/// Resolved into [`CompiledExpr`] during compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    Contains {
        field: String,
        needle: String,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

/// Condition with every field name resolved to a [`Field`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CompiledExpr {
    Compare {
        field: Field,
        op: CompareOp,
        value: Value,
    },
    Contains {
        field: Field,
        needle: String,
    },
    And(Box<CompiledExpr>, Box<CompiledExpr>),
    Or(Box<CompiledExpr>, Box<CompiledExpr>),
    Not(Box<CompiledExpr>),
}

impl CompiledExpr {
    /// Evaluate against one transaction. `&&` and `||` short-circuit, so an
    /// error in a skipped branch is never raised.
    pub(crate) fn eval(&self, tx: &Transaction) -> Result<bool, EvaluationError> {
        match self {
            CompiledExpr::Compare { field, op, value } => tx.get(*field).compare(*op, value),
            CompiledExpr::Contains { field, needle } => match tx.get(*field) {
                Value::String(s) => Ok(s.contains(needle.as_str())),
                Value::Null => Err(EvaluationError::UnsetField { field: *field }),
                other => Err(EvaluationError::NotAString {
                    field: *field,
                    found: other.type_name(),
                }),
            },
            CompiledExpr::And(a, b) => Ok(a.eval(tx)? && b.eval(tx)?),
            CompiledExpr::Or(a, b) => Ok(a.eval(tx)? || b.eval(tx)?),
            CompiledExpr::Not(inner) => Ok(!inner.eval(tx)?),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::Neq => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Compare { field, op, value } => write!(f, "({field} {op} {value})"),
            Expr::Contains { field, needle } => {
                write!(f, "{field}.contains(\"{}\")", needle.escape_default())
            }
            Expr::And(a, b) => write!(f, "({a} && {b})"),
            Expr::Or(a, b) => write!(f, "({a} || {b})"),
            Expr::Not(inner) => write!(f, "!{inner}"),
        }
    }
}

impl fmt::Display for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompiledExpr::Compare { field, op, value } => write!(f, "({field} {op} {value})"),
            CompiledExpr::Contains { field, needle } => {
                write!(f, "{field}.contains(\"{}\")", needle.escape_default())
            }
            CompiledExpr::And(a, b) => write!(f, "({a} && {b})"),
            CompiledExpr::Or(a, b) => write!(f, "({a} || {b})"),
            CompiledExpr::Not(inner) => write!(f, "!{inner}"),
        }
    }
}

impl Expr {
    #[must_use]
    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

/// Intermediate builder for field expressions.
/// Created by [`field()`]; requires a comparison method to produce an [`Expr`].
#[derive(Debug, Clone)]
pub struct FieldExpr {
    name: String,
}

impl FieldExpr {
    fn compare(self, op: CompareOp, value: impl Into<Value>) -> Expr {
        Expr::Compare {
            field: self.name,
            op,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn eq(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Eq, value)
    }

    #[must_use]
    pub fn neq(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Neq, value)
    }

    #[must_use]
    pub fn gt(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Gt, value)
    }

    #[must_use]
    pub fn gte(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Gte, value)
    }

    #[must_use]
    pub fn lt(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Lt, value)
    }

    #[must_use]
    pub fn lte(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Lte, value)
    }

    #[must_use]
    pub fn contains(self, needle: &str) -> Expr {
        Expr::Contains {
            field: self.name,
            needle: needle.to_owned(),
        }
    }
}

#[must_use]
pub fn field(name: &str) -> FieldExpr {
    FieldExpr {
        name: name.to_owned(),
    }
}
