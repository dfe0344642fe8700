use thiserror::Error;

use crate::store::StoreError;
use crate::{EngineKind, RuleCompilationError};

/// Unified error returned by the classifier and the rule set cache.
///
/// Evaluation errors never show up here: engines recover them as non-matches
/// and report them through [`EvaluationReport`](crate::EvaluationReport).
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Compile(#[from] RuleCompilationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{operation} is not supported by the {engine} engine")]
    Unsupported {
        operation: &'static str,
        engine: EngineKind,
    },
}
