//! Evaluation engines.
//!
//! Both engines run the same compiled predicates but resolve conflicts
//! differently, so they are not interchangeable:
//!
//! - [`ForwardChainingEngine`]: every applicable rule fires in salience order
//!   and a later firing overwrites an earlier one. The **last** rule to fire
//!   decides the category.
//! - [`PriorityExpressionEngine`]: rules are tried in salience order and the
//!   **first** matching rule decides the category.
//!
//! The two agree only when a customer's rules are mutually exclusive.

mod forward;
mod priority;

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::warn;

use crate::{CompiledRule, CompiledRuleSet, EvaluationReport, RuleEvaluationError, Transaction};

pub use forward::{ForwardChainingEngine, WorkingSession};
pub use priority::PriorityExpressionEngine;

/// Applies a compiled rule set to transactions.
///
/// Implementations only write `Transaction::category`. A transaction no rule
/// matches keeps its category. Per-rule evaluation errors are logged,
/// recorded in the report and treated as "does not match".
pub trait EvaluationEngine: Send + Sync + fmt::Debug {
    fn kind(&self) -> EngineKind;

    fn apply(&self, transactions: &mut [Transaction], rules: &CompiledRuleSet) -> EvaluationReport;

    /// Access to engine-specific session handling, if this is the
    /// forward-chaining engine.
    fn as_forward_chaining(&self) -> Option<&ForwardChainingEngine> {
        None
    }
}

/// Which [`EvaluationEngine`] to run.
///
/// Deserialized through [`FromStr`], so names are matched ignoring case and
/// surrounding whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum EngineKind {
    /// Last firing wins. Also accepted as `drools`.
    #[default]
    ForwardChaining,
    /// First match wins. Also accepted as `simple`.
    PriorityExpression,
}

impl EngineKind {
    #[must_use]
    pub fn build(self) -> Box<dyn EvaluationEngine> {
        match self {
            EngineKind::ForwardChaining => Box::new(ForwardChainingEngine::new()),
            EngineKind::PriorityExpression => Box::new(PriorityExpressionEngine::new()),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::ForwardChaining => "forward-chaining",
            EngineKind::PriorityExpression => "priority-expression",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward-chaining" | "drools" => Ok(EngineKind::ForwardChaining),
            "priority-expression" | "simple" => Ok(EngineKind::PriorityExpression),
            other => Err(format!("unknown engine type '{other}'")),
        }
    }
}

impl TryFrom<String> for EngineKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Test one rule against one transaction, recovering evaluation errors as a
/// non-match.
pub(crate) fn matches(
    rule: &CompiledRule,
    tx: &Transaction,
    transaction_index: usize,
    report: &mut EvaluationReport,
) -> bool {
    match rule.predicate.test(tx) {
        Ok(hit) => hit,
        Err(source) => {
            warn!(
                rule_id = rule.rule_id,
                transaction_id = ?tx.id,
                transaction_index,
                error = %source,
                "rule evaluation failed; treating as no match"
            );
            report.record_error(RuleEvaluationError {
                rule_id: rule.rule_id,
                transaction_id: tx.id,
                source,
            });
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_kind_parses_aliases() {
        assert_eq!("drools".parse(), Ok(EngineKind::ForwardChaining));
        assert_eq!("Forward-Chaining".parse(), Ok(EngineKind::ForwardChaining));
        assert_eq!("simple".parse(), Ok(EngineKind::PriorityExpression));
        assert_eq!(" priority-expression ".parse(), Ok(EngineKind::PriorityExpression));
        assert!("rete".parse::<EngineKind>().is_err());
    }

    #[test]
    fn engine_kind_builds_matching_engine() {
        for kind in [EngineKind::ForwardChaining, EngineKind::PriorityExpression] {
            let engine = kind.build();
            assert_eq!(engine.kind(), kind);
            assert_eq!(
                engine.as_forward_chaining().is_some(),
                kind == EngineKind::ForwardChaining
            );
        }
    }

    #[test]
    fn default_engine_is_forward_chaining() {
        assert_eq!(EngineKind::default(), EngineKind::ForwardChaining);
        assert_eq!(EngineKind::default().to_string(), "forward-chaining");
    }
}
