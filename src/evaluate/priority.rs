use std::time::Instant;

use tracing::trace;

use super::{EngineKind, EvaluationEngine};
use crate::{CompiledRuleSet, EvaluationReport, Firing, Transaction};

/// First-match evaluation: for each transaction, try rules in salience order
/// and stop at the first predicate that holds.
///
/// Transactions are evaluated independently of each other.
#[derive(Debug, Default, Clone, Copy)]
pub struct PriorityExpressionEngine;

impl PriorityExpressionEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl EvaluationEngine for PriorityExpressionEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::PriorityExpression
    }

    fn apply(&self, transactions: &mut [Transaction], rules: &CompiledRuleSet) -> EvaluationReport {
        let started = Instant::now();
        let mut report = EvaluationReport::default();

        for (index, tx) in transactions.iter_mut().enumerate() {
            let hit = rules
                .rules()
                .iter()
                .find(|rule| super::matches(rule, tx, index, &mut report));

            if let Some(rule) = hit {
                trace!(rule_id = rule.rule_id, transaction_index = index, "rule matched");
                tx.category = Some(rule.category.name.clone());
                report.record_firing(Firing {
                    rule_id: rule.rule_id,
                    transaction_index: index,
                    category: rule.category.name.clone(),
                });
            }
        }

        report.finish(started.elapsed())
    }
}
