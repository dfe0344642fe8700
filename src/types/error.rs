use thiserror::Error;

use super::expr::{CompareOp, Field};

/// A rule could not be turned into executable form. Fatal to the request that
/// triggered the build; a previously cached rule set stays in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleCompilationError {
    #[error("rule {rule_id}: malformed condition `{expression}`: {message}")]
    MalformedCondition {
        rule_id: i64,
        expression: String,
        message: String,
    },

    #[error("rule {rule_id}: undefined field '{field}' in condition `{expression}`")]
    UndefinedField {
        rule_id: i64,
        field: String,
        expression: String,
    },

    #[error("rule {rule_id} is inactive and cannot be compiled")]
    InactiveRule { rule_id: i64 },

    #[error("duplicate rule id {rule_id}")]
    DuplicateRule { rule_id: i64 },

    #[error("rule {rule_id} is active but has no category")]
    UnresolvedCategory { rule_id: i64 },
}

impl RuleCompilationError {
    /// Id of the rule that failed to compile.
    #[must_use]
    pub fn rule_id(&self) -> i64 {
        match self {
            RuleCompilationError::MalformedCondition { rule_id, .. }
            | RuleCompilationError::UndefinedField { rule_id, .. }
            | RuleCompilationError::InactiveRule { rule_id }
            | RuleCompilationError::DuplicateRule { rule_id }
            | RuleCompilationError::UnresolvedCategory { rule_id } => *rule_id,
        }
    }
}

/// A predicate could not be decided for a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: CompareOp,
        left: &'static str,
        right: &'static str,
    },

    #[error("field '{field}' is unset")]
    UnsetField { field: Field },

    #[error("field '{field}' is a {found}, not a string")]
    NotAString { field: Field, found: &'static str },
}

/// An [`EvaluationError`] attributed to a rule and a transaction. Engines log
/// and record these, then treat the rule as not matching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rule {rule_id} failed on transaction {}: {source}", display_tx(.transaction_id))]
pub struct RuleEvaluationError {
    pub rule_id: i64,
    pub transaction_id: Option<i64>,
    #[source]
    pub source: EvaluationError,
}

fn display_tx(id: &Option<i64>) -> String {
    id.map_or_else(|| "<unsaved>".to_owned(), |id| id.to_string())
}
