use std::fmt;
use std::time::Duration;

use super::error::RuleEvaluationError;

/// One rule firing: `rule_id` assigned `category` to the transaction at
/// `transaction_index` of the evaluated batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    pub rule_id: i64,
    pub transaction_index: usize,
    pub category: String,
}

impl fmt::Display for Firing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule {} -> tx[{}] = {}",
            self.rule_id, self.transaction_index, self.category
        )
    }
}

/// What an engine did while applying a rule set to a batch.
///
/// Lists firings in the order they happened, the evaluation errors that were
/// recovered as non-matches, and the wall-clock duration.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct EvaluationReport {
    firings: Vec<Firing>,
    errors: Vec<RuleEvaluationError>,
    duration: Duration,
}

impl EvaluationReport {
    pub(crate) fn record_firing(&mut self, firing: Firing) {
        self.firings.push(firing);
    }

    pub(crate) fn record_error(&mut self, error: RuleEvaluationError) {
        self.errors.push(error);
    }

    pub(crate) fn finish(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    #[must_use]
    pub fn firings(&self) -> &[Firing] {
        &self.firings
    }

    /// Rule ids that fired for one transaction, in firing order.
    #[must_use]
    pub fn fired_for(&self, transaction_index: usize) -> Vec<i64> {
        self.firings
            .iter()
            .filter(|f| f.transaction_index == transaction_index)
            .map(|f| f.rule_id)
            .collect()
    }

    /// Evaluation errors that were treated as "rule does not match".
    #[must_use]
    pub fn errors(&self) -> &[RuleEvaluationError] {
        &self.errors
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let firings: Vec<String> = self.firings.iter().map(ToString::to_string).collect();
        write!(f, "fired: [{}]", firings.join(", "))?;
        write!(f, ", errors: {}", self.errors.len())?;
        write!(f, ", duration: {:?}", self.duration)?;
        Ok(())
    }
}
