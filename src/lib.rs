//! Per-customer transaction classification.
//!
//! Customers own rules of the form *condition → category*. A
//! [`TransactionClassifier`] compiles a customer's active rules once into a
//! [`CompiledRuleSet`], keeps it in a shared [`CompiledRuleSetCache`] that
//! rebuilds on any rule change, and runs it through one of two
//! [`EvaluationEngine`]s to fill in `Transaction::category`.
//!
//! ```
//! use std::sync::Arc;
//! use rulecat::{
//!     Category, ClassifierConfig, CompiledRuleSetCache, InMemoryRuleStore, RuleRecord,
//!     Transaction, TransactionClassifier,
//! };
//!
//! let store = Arc::new(InMemoryRuleStore::new());
//! store.save(RuleRecord::new(
//!     1,
//!     "acme",
//!     r#"merchantType == "RESTAURANT""#,
//!     10,
//!     Category::new(1, "Food"),
//! ));
//!
//! let cache = Arc::new(CompiledRuleSetCache::new(store));
//! let classifier = TransactionClassifier::from_config(&ClassifierConfig::default(), cache);
//!
//! let tx = classifier
//!     .classify(Transaction::new("RESTAURANT", 42.0), "acme")
//!     .unwrap();
//! assert_eq!(tx.category.as_deref(), Some("Food"));
//! ```

mod cache;
mod classifier;
mod compile;
mod config;
mod error;
mod evaluate;
pub mod parse;
mod store;
mod types;

pub use cache::CompiledRuleSetCache;
pub use classifier::TransactionClassifier;
pub use compile::ConditionCompiler;
pub use self::config::ClassifierConfig;
pub use error::ClassifyError;
pub use evaluate::{
    EngineKind, EvaluationEngine, ForwardChainingEngine, PriorityExpressionEngine, WorkingSession,
};
pub use store::{InMemoryRuleStore, RuleStore, StoreError};
pub use types::{
    Category, CompareOp, CompiledRule, CompiledRuleSet, EvaluationError, EvaluationReport, Expr,
    Field, FieldExpr, Fingerprint, Firing, Predicate, RuleCompilationError, RuleEvaluationError,
    RuleRecord, Transaction, Value, field,
};
