//! Per-customer cache of compiled rule sets.
//!
//! Entries are validated on every lookup by fingerprinting the customer's
//! active rules; a changed fingerprint triggers a rebuild that replaces the
//! entry. Builds are single-flight per customer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::store::RuleStore;
use crate::{ClassifyError, CompiledRuleSet, ConditionCompiler, Fingerprint, RuleRecord};

/// Get-or-build cache of [`CompiledRuleSet`]s keyed by customer id.
///
/// Created once per process and shared (behind `Arc`) by every classifier.
/// Reads never block on builds of other customers; concurrent first requests
/// for the same customer compile once.
pub struct CompiledRuleSetCache {
    store: Arc<dyn RuleStore>,
    compiler: ConditionCompiler,
    entries: DashMap<String, Arc<CompiledRuleSet>>,
    build_locks: DashMap<String, Arc<Mutex<()>>>,
    builds: AtomicU64,
    generations: AtomicU64,
}

impl CompiledRuleSetCache {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self {
            store,
            compiler: ConditionCompiler::new(),
            entries: DashMap::new(),
            build_locks: DashMap::new(),
            builds: AtomicU64::new(0),
            generations: AtomicU64::new(0),
        }
    }

    /// Return the compiled rule set for `customer_id`, building it when
    /// missing or when the customer's active rules changed.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::Store`] if the rules cannot be read and
    /// [`ClassifyError::Compile`] if a rule fails to compile. On error any
    /// previously cached entry is kept.
    #[instrument(skip(self))]
    pub fn get(&self, customer_id: &str) -> Result<Arc<CompiledRuleSet>, ClassifyError> {
        let rules = self.store.find_rules_by_customer(customer_id)?;
        let fingerprint = Fingerprint::of(&rules);

        if let Some(hit) = self.fresh_entry(customer_id, fingerprint) {
            debug!(generation = hit.generation, "compiled rule set cache hit");
            return Ok(hit);
        }

        let lock = self.build_lock(customer_id);
        let _guard = lock.lock();

        // The snapshot above may predate a build that finished while we
        // waited. Only rules read under the lock may replace the entry.
        let rules = self.store.find_rules_by_customer(customer_id)?;
        let fingerprint = Fingerprint::of(&rules);
        if let Some(hit) = self.fresh_entry(customer_id, fingerprint) {
            debug!(generation = hit.generation, "rule set built by concurrent request");
            return Ok(hit);
        }

        self.build(customer_id, &rules)
    }

    /// The cached entry for `customer_id`, without validating or building.
    #[must_use]
    pub fn cached(&self, customer_id: &str) -> Option<Arc<CompiledRuleSet>> {
        self.entries.get(customer_id).map(|e| Arc::clone(e.value()))
    }

    /// Drop the entry for `customer_id`. The next `get` rebuilds it.
    pub fn invalidate(&self, customer_id: &str) -> bool {
        self.entries.remove(customer_id).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of completed builds since the cache was created.
    #[must_use]
    pub fn builds(&self) -> u64 {
        self.builds.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn compiler(&self) -> &ConditionCompiler {
        &self.compiler
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn RuleStore> {
        &self.store
    }

    fn fresh_entry(
        &self,
        customer_id: &str,
        fingerprint: Fingerprint,
    ) -> Option<Arc<CompiledRuleSet>> {
        self.entries
            .get(customer_id)
            .filter(|e| e.fingerprint == fingerprint)
            .map(|e| Arc::clone(e.value()))
    }

    fn build_lock(&self, customer_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.build_locks
                .entry(customer_id.to_owned())
                .or_default()
                .value(),
        )
    }

    /// Caller must hold the customer's build lock.
    ///
    /// Generations are unique across customers. A failed build still
    /// consumes one, so the sequence may have gaps.
    fn build(
        &self,
        customer_id: &str,
        rules: &[RuleRecord],
    ) -> Result<Arc<CompiledRuleSet>, ClassifyError> {
        let started = Instant::now();
        let generation = self.generations.fetch_add(1, Ordering::AcqRel) + 1;

        let compiled = match self.compiler.compile_rule_set(customer_id, rules, generation) {
            Ok(compiled) => Arc::new(compiled),
            Err(e) => {
                warn!(
                    rule_id = e.rule_id(),
                    error = %e,
                    "rule set build failed; keeping previous entry"
                );
                return Err(e.into());
            }
        };

        self.builds.fetch_add(1, Ordering::AcqRel);
        self.entries.insert(customer_id.to_owned(), Arc::clone(&compiled));
        info!(
            rules = compiled.len(),
            generation,
            fingerprint = %compiled.fingerprint,
            elapsed = ?started.elapsed(),
            "compiled rule set rebuilt"
        );
        Ok(compiled)
    }
}

impl std::fmt::Debug for CompiledRuleSetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRuleSetCache")
            .field("entries", &self.entries.len())
            .field("builds", &self.builds())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRuleStore;
    use crate::Category;

    fn food() -> Category {
        Category::new(1, "Food")
    }

    fn travel() -> Category {
        Category::new(2, "Travel")
    }

    fn setup() -> (Arc<InMemoryRuleStore>, CompiledRuleSetCache) {
        let store = Arc::new(InMemoryRuleStore::new());
        store.save_all([
            RuleRecord::new(1, "c1", r#"merchantType == "RESTAURANT""#, 10, food()),
            RuleRecord::new(2, "c1", r#"merchantType == "AIRLINE""#, 5, travel()),
        ]);
        let cache = CompiledRuleSetCache::new(store.clone());
        (store, cache)
    }

    #[test]
    fn repeated_get_reuses_entry() {
        let (_store, cache) = setup();
        let a = cache.get("c1").unwrap();
        let b = cache.get("c1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.builds(), 1);
        assert_eq!(a.generation(), 1);
    }

    #[test]
    fn edit_triggers_one_rebuild() {
        let (store, cache) = setup();
        let first = cache.get("c1").unwrap();

        let mut edited = store.get(2).unwrap();
        edited.priority = 20;
        store.save(edited);

        let second = cache.get("c1").unwrap();
        let third = cache.get("c1").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&second, &third));
        assert_eq!(cache.builds(), 2);
        assert_eq!(second.firing_order(), vec![2, 1]);
    }

    #[test]
    fn failed_build_keeps_previous_entry() {
        let (store, cache) = setup();
        let good = cache.get("c1").unwrap();

        let mut broken = store.get(1).unwrap();
        broken.condition_expression = "merchantType ==".into();
        store.save(broken);

        match cache.get("c1") {
            Err(ClassifyError::Compile(e)) => assert_eq!(e.rule_id(), 1),
            other => panic!("expected compile error, got {other:?}"),
        }
        assert!(Arc::ptr_eq(&cache.cached("c1").unwrap(), &good));
        assert_eq!(cache.builds(), 1);
    }

    #[test]
    fn invalidate_forces_rebuild() {
        let (_store, cache) = setup();
        cache.get("c1").unwrap();
        assert!(cache.invalidate("c1"));
        assert!(cache.cached("c1").is_none());
        cache.get("c1").unwrap();
        assert_eq!(cache.builds(), 2);
    }

    #[test]
    fn unknown_customer_gets_empty_set() {
        let (_store, cache) = setup();
        let set = cache.get("nobody").unwrap();
        assert!(set.is_empty());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_build_does_not_reuse_generation() {
        let (store, cache) = setup();
        assert_eq!(cache.get("c1").unwrap().generation(), 1);

        let mut broken = store.get(1).unwrap();
        broken.condition_expression = "merchantType ==".into();
        store.save(broken.clone());
        assert!(cache.get("c1").is_err());

        broken.condition_expression = r#"merchantType == "CAFE""#.into();
        store.save(broken);
        let rebuilt = cache.get("c1").unwrap();
        assert!(rebuilt.generation() > 2);
        assert_eq!(cache.builds(), 2);
    }

    #[test]
    fn generations_are_unique_across_customers() {
        let (store, cache) = setup();
        store.save(RuleRecord::new(3, "c2", "amount > 1", 1, food()));
        let a = cache.get("c1").unwrap();
        let b = cache.get("c2").unwrap();
        let c = cache.get("c3").unwrap();
        assert_eq!([a.generation(), b.generation(), c.generation()], [1, 2, 3]);
    }
}
