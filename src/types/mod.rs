mod error;
mod evaluation_report;
mod expr;
mod record;
mod rule;
mod ruleset;
mod value;

pub use error::{EvaluationError, RuleCompilationError, RuleEvaluationError};
pub use evaluation_report::{EvaluationReport, Firing};
pub(crate) use expr::CompiledExpr;
pub use expr::{CompareOp, Expr, Field, FieldExpr, field};
pub use record::{Category, RuleRecord, Transaction};
pub use rule::{CompiledRule, Predicate};
pub use ruleset::{CompiledRuleSet, Fingerprint};
pub use value::Value;
