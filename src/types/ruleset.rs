use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use super::record::RuleRecord;
use super::rule::CompiledRule;

/// BLAKE3 digest of a customer's active rules.
///
/// Two rule lists have the same fingerprint exactly when their active rules
/// agree on id, condition text, priority and category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(blake3::Hash);

impl Fingerprint {
    /// Fingerprint the active subset of `rules`. Inactive rules and input
    /// order do not affect the result.
    #[must_use]
    pub fn of(rules: &[RuleRecord]) -> Self {
        let mut active: Vec<&RuleRecord> = rules.iter().filter(|r| r.active).collect();
        active.sort_by_key(|r| r.id);

        let mut hasher = blake3::Hasher::new();
        hasher.update(&(active.len() as u64).to_le_bytes());
        for rule in active {
            hasher.update(&rule.id.to_le_bytes());
            update_str(&mut hasher, &rule.condition_expression);
            hasher.update(&rule.priority.to_le_bytes());
            match &rule.category {
                Some(category) => {
                    hasher.update(&[1]);
                    hasher.update(&category.id.to_le_bytes());
                    update_str(&mut hasher, &category.name);
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }
        Fingerprint(hasher.finalize())
    }
}

// Length prefix keeps adjacent strings from running together.
fn update_str(hasher: &mut blake3::Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.0.to_hex();
        f.write_str(&hex[..16])
    }
}

/// The executable form of one customer's active rules.
///
/// Rules are ordered by descending priority, ties by ascending rule id.
/// Immutable once built; clones share the rule list.
#[derive(Debug, Clone)]
pub struct CompiledRuleSet {
    pub(crate) customer_id: String,
    pub(crate) fingerprint: Fingerprint,
    pub(crate) generation: u64,
    pub(crate) built_at: SystemTime,
    pub(crate) rules: Arc<[CompiledRule]>,
}

impl CompiledRuleSet {
    #[must_use]
    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Value of the cache's build counter when this set was built.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn built_at(&self) -> SystemTime {
        self.built_at
    }

    /// Rules in firing order.
    #[must_use]
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule ids in firing order.
    #[must_use]
    pub fn firing_order(&self) -> Vec<i64> {
        self.rules.iter().map(CompiledRule::rule_id).collect()
    }
}

/// Renders one clause per rule. Literals are escaped; the text is for
/// inspection only and is never executed.
impl fmt::Display for CompiledRuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "# customer \"{}\" generation {} fingerprint {}",
            self.customer_id.escape_default(),
            self.generation,
            self.fingerprint,
        )?;
        for rule in self.rules.iter() {
            writeln!(
                f,
                "rule {} \"{}\" salience {} when {} then category = \"{}\"",
                rule.rule_id,
                rule.name.escape_default(),
                rule.salience,
                rule.predicate,
                rule.category.name.escape_default(),
            )?;
        }
        Ok(())
    }
}
