use std::sync::Arc;

use tracing::{debug, instrument};

use crate::evaluate::{EvaluationEngine, WorkingSession};
use crate::{
    ClassifierConfig, ClassifyError, CompiledRuleSetCache, EngineKind, EvaluationReport,
    RuleRecord, Transaction,
};

/// Assigns categories to transactions using a customer's active rules.
///
/// Every call looks the customer's compiled rule set up in the shared cache
/// (rebuilding it if the rules changed) and hands it to the configured
/// engine. Only `category` is ever written.
#[derive(Debug)]
pub struct TransactionClassifier {
    cache: Arc<CompiledRuleSetCache>,
    engine: Box<dyn EvaluationEngine>,
}

impl TransactionClassifier {
    pub fn new(cache: Arc<CompiledRuleSetCache>, engine: Box<dyn EvaluationEngine>) -> Self {
        Self { cache, engine }
    }

    /// Build a classifier running the engine named by `config`.
    pub fn from_config(config: &ClassifierConfig, cache: Arc<CompiledRuleSetCache>) -> Self {
        Self::new(cache, config.engine.build())
    }

    /// Classify one transaction. A transaction no rule matches is returned
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError`] if the customer's rules cannot be read or
    /// compiled.
    #[instrument(
        skip(self, transaction),
        fields(engine = %self.engine.kind(), transaction_id = ?transaction.id)
    )]
    pub fn classify(
        &self,
        mut transaction: Transaction,
        customer_id: &str,
    ) -> Result<Transaction, ClassifyError> {
        let rules = self.cache.get(customer_id)?;
        let report = self
            .engine
            .apply(std::slice::from_mut(&mut transaction), &rules);
        debug!(%report, "transaction classified");
        Ok(transaction)
    }

    /// Classify a list of transactions against one rule set lookup. Output
    /// order and length match the input.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError`] if the customer's rules cannot be read or
    /// compiled; no partial result is returned.
    pub fn classify_batch(
        &self,
        transactions: Vec<Transaction>,
        customer_id: &str,
    ) -> Result<Vec<Transaction>, ClassifyError> {
        self.classify_batch_detailed(transactions, customer_id)
            .map(|(transactions, _)| transactions)
    }

    /// Like [`classify_batch`](Self::classify_batch), also returning which
    /// rules fired and which evaluations failed.
    ///
    /// # Errors
    ///
    /// Same as [`classify_batch`](Self::classify_batch).
    #[instrument(
        skip(self, transactions),
        fields(engine = %self.engine.kind(), batch = transactions.len())
    )]
    pub fn classify_batch_detailed(
        &self,
        mut transactions: Vec<Transaction>,
        customer_id: &str,
    ) -> Result<(Vec<Transaction>, EvaluationReport), ClassifyError> {
        let rules = self.cache.get(customer_id)?;
        let report = self.engine.apply(&mut transactions, &rules);
        debug!(%report, "batch classified");
        Ok((transactions, report))
    }

    /// All rules stored for `customer_id`, active and inactive.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::Store`] if the store cannot be read.
    pub fn get_rules_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<RuleRecord>, ClassifyError> {
        Ok(self.cache.store().find_rules_by_customer(customer_id)?)
    }

    /// Open a forward-chaining working session over the customer's current
    /// rule set, for callers that insert facts and fire rules themselves.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::Unsupported`] when the engine has no
    /// sessions, or a lookup error as for [`classify`](Self::classify).
    #[instrument(skip(self), fields(engine = %self.engine.kind()))]
    pub fn open_session(&self, customer_id: &str) -> Result<WorkingSession, ClassifyError> {
        let engine = self
            .engine
            .as_forward_chaining()
            .ok_or_else(|| ClassifyError::Unsupported {
                operation: "direct session access",
                engine: self.engine.kind(),
            })?;
        let rules = self.cache.get(customer_id)?;
        Ok(engine.open_session(&rules))
    }

    #[must_use]
    pub fn engine_kind(&self) -> EngineKind {
        self.engine.kind()
    }

    #[must_use]
    pub fn engine(&self) -> &dyn EvaluationEngine {
        self.engine.as_ref()
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<CompiledRuleSetCache> {
        &self.cache
    }
}
