use std::fmt;
use std::sync::Arc;

use super::error::EvaluationError;
use super::expr::CompiledExpr;
use super::record::{Category, Transaction};

/// An executable boolean condition over a [`Transaction`].
///
/// Produced by the [`ConditionCompiler`](crate::ConditionCompiler) and shared
/// through its expression cache, so one `Predicate` may back rules of many
/// customers.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    source: String,
    expr: CompiledExpr,
}

impl Predicate {
    pub(crate) fn new(source: String, expr: CompiledExpr) -> Self {
        Self { source, expr }
    }

    /// Decide the condition for one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError`] when an operand has the wrong type or a
    /// required field is unset.
    pub fn test(&self, tx: &Transaction) -> Result<bool, EvaluationError> {
        self.expr.eval(tx)
    }

    /// The normalized condition text this predicate was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

/// One active rule in executable form.
///
/// Lives inside a [`CompiledRuleSet`](super::CompiledRuleSet); its position
/// there is its firing order.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub(crate) rule_id: i64,
    pub(crate) name: String,
    pub(crate) salience: i32,
    pub(crate) category: Category,
    pub(crate) predicate: Arc<Predicate>,
}

impl CompiledRule {
    #[must_use]
    pub fn rule_id(&self) -> i64 {
        self.rule_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The rule's priority. Higher fires earlier.
    #[must_use]
    pub fn salience(&self) -> i32 {
        self.salience
    }

    #[must_use]
    pub fn category(&self) -> &Category {
        &self.category
    }

    #[must_use]
    pub fn predicate(&self) -> &Arc<Predicate> {
        &self.predicate
    }
}
