use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::{EngineKind, EvaluationEngine};
use crate::{CompiledRule, CompiledRuleSet, EvaluationReport, Firing, Transaction};

/// Forward-chaining evaluation: insert every transaction as a fact, then fire
/// matching rules in salience order over the whole working set.
///
/// Firing a rule sets the fact's category and re-matches the fact against
/// every rule, so a lower-salience rule that still matches fires afterwards
/// and overwrites the category. A rule fires at most once per fact.
#[derive(Debug, Default)]
pub struct ForwardChainingEngine {
    open_sessions: Arc<AtomicUsize>,
}

impl ForwardChainingEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a working session over `rules`. The session is released when it
    /// is dropped.
    #[must_use]
    pub fn open_session(&self, rules: &CompiledRuleSet) -> WorkingSession {
        self.open_sessions.fetch_add(1, Ordering::AcqRel);
        debug!(customer_id = %rules.customer_id, "working session opened");
        WorkingSession {
            rules: Arc::clone(&rules.rules),
            customer_id: rules.customer_id.clone(),
            facts: Vec::new(),
            agenda: BTreeSet::new(),
            refracted: HashSet::new(),
            report: EvaluationReport::default(),
            started: Instant::now(),
            open_sessions: Arc::clone(&self.open_sessions),
        }
    }

    /// Sessions opened by this engine and not yet released.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::Acquire)
    }
}

impl EvaluationEngine for ForwardChainingEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::ForwardChaining
    }

    fn apply(&self, transactions: &mut [Transaction], rules: &CompiledRuleSet) -> EvaluationReport {
        let mut session = self.open_session(rules);
        for tx in transactions.iter() {
            session.insert(tx.clone());
        }
        session.fire_all_rules();
        for (tx, fact) in transactions.iter_mut().zip(session.facts()) {
            tx.category.clone_from(&fact.category);
        }
        session.take_report()
    }

    fn as_forward_chaining(&self) -> Option<&ForwardChainingEngine> {
        Some(self)
    }
}

/// Per-evaluation working memory of the forward-chaining engine.
///
/// Holds the inserted facts and the agenda of pending activations. Dropping
/// the session releases it, on every exit path.
#[derive(Debug)]
pub struct WorkingSession {
    rules: Arc<[CompiledRule]>,
    customer_id: String,
    facts: Vec<Transaction>,
    /// Pending (rule index, fact index) activations. Rule indices follow
    /// firing order, so the first entry is always the next to fire.
    agenda: BTreeSet<(usize, usize)>,
    /// Activations that already fired.
    refracted: HashSet<(usize, usize)>,
    report: EvaluationReport,
    started: Instant,
    open_sessions: Arc<AtomicUsize>,
}

impl WorkingSession {
    /// Insert a fact and match it against every rule. Returns the fact index.
    pub fn insert(&mut self, tx: Transaction) -> usize {
        let fact = self.facts.len();
        self.facts.push(tx);
        self.match_fact(fact);
        fact
    }

    /// Fire activations until the agenda is empty. Returns the number of
    /// firings.
    pub fn fire_all_rules(&mut self) -> usize {
        let mut fired = 0;
        while let Some((rule_idx, fact)) = self.agenda.pop_first() {
            self.refracted.insert((rule_idx, fact));

            let rule = &self.rules[rule_idx];
            let (rule_id, category) = (rule.rule_id, rule.category.name.clone());
            debug!(rule_id, fact, category = %category, "rule fired");
            self.facts[fact].category = Some(category.clone());
            self.report.record_firing(Firing {
                rule_id,
                transaction_index: fact,
                category,
            });
            fired += 1;

            self.match_fact(fact);
        }
        fired
    }

    /// Facts in insertion order.
    #[must_use]
    pub fn facts(&self) -> &[Transaction] {
        &self.facts
    }

    /// Number of activations waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.agenda.len()
    }

    /// Take the facts out of the session. The session stays open until dropped.
    pub fn take_facts(&mut self) -> Vec<Transaction> {
        self.agenda.clear();
        std::mem::take(&mut self.facts)
    }

    /// Take the report of firings and errors so far.
    pub fn take_report(&mut self) -> EvaluationReport {
        std::mem::take(&mut self.report).finish(self.started.elapsed())
    }

    /// Re-evaluate every non-refracted rule against one fact, adding and
    /// withdrawing activations to match.
    fn match_fact(&mut self, fact: usize) {
        for (rule_idx, rule) in self.rules.iter().enumerate() {
            let key = (rule_idx, fact);
            if self.refracted.contains(&key) {
                continue;
            }
            if super::matches(rule, &self.facts[fact], fact, &mut self.report) {
                self.agenda.insert(key);
            } else {
                self.agenda.remove(&key);
            }
        }
    }
}

impl Drop for WorkingSession {
    fn drop(&mut self) {
        self.open_sessions.fetch_sub(1, Ordering::AcqRel);
        debug!(
            customer_id = %self.customer_id,
            facts = self.facts.len(),
            "working session released"
        );
    }
}
