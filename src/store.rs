//! Rule storage collaborator.
//!
//! The engine only reads rules through [`RuleStore`]. [`InMemoryRuleStore`]
//! is a thread-safe implementation for tests, benchmarks and demos.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::RuleRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rule store unavailable: {0}")]
    Unavailable(String),
}

/// Source of rule records, active and inactive alike.
pub trait RuleStore: Send + Sync {
    /// All rules belonging to `customer_id`, in any order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store cannot be read.
    fn find_rules_by_customer(&self, customer_id: &str) -> Result<Vec<RuleRecord>, StoreError>;
}

/// Rules kept in memory, keyed by rule id.
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    rules: RwLock<BTreeMap<i64, RuleRecord>>,
}

impl InMemoryRuleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a rule by id.
    #[instrument(skip(self, rule), fields(rule_id = rule.id, customer_id = %rule.customer_id))]
    pub fn save(&self, rule: RuleRecord) {
        self.rules.write().insert(rule.id, rule);
        debug!("rule saved");
    }

    pub fn save_all(&self, rules: impl IntoIterator<Item = RuleRecord>) {
        let mut guard = self.rules.write();
        for rule in rules {
            guard.insert(rule.id, rule);
        }
    }

    /// Remove a rule, returning it if it existed.
    pub fn delete(&self, rule_id: i64) -> Option<RuleRecord> {
        self.rules.write().remove(&rule_id)
    }

    /// Flip a rule's `active` flag. Returns `false` if the rule is unknown.
    pub fn set_active(&self, rule_id: i64, active: bool) -> bool {
        match self.rules.write().get_mut(&rule_id) {
            Some(rule) => {
                rule.active = active;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, rule_id: i64) -> Option<RuleRecord> {
        self.rules.read().get(&rule_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}

impl RuleStore for InMemoryRuleStore {
    fn find_rules_by_customer(&self, customer_id: &str) -> Result<Vec<RuleRecord>, StoreError> {
        Ok(self
            .rules
            .read()
            .values()
            .filter(|r| r.customer_id == customer_id)
            .cloned()
            .collect())
    }
}
