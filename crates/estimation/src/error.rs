//! Error types for the mixall-estimation crate.

use mixall_composer::StepError;

use crate::config::{AlgoKind, InitMethod};

/// Failure of an algorithm run.
///
/// The composer is left in the state reached at the failing iteration.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} failed at iteration {iteration}: {error}")]
pub struct AlgoError {
    /// The algorithm that failed.
    pub kind: AlgoKind,
    /// 1-indexed iteration at which the failure occurred.
    pub iteration: usize,
    /// The failing step.
    pub error: StepError,
}

/// Error type for all fallible operations in the mixall-estimation crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EstimationError {
    /// Returned when a configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when the random initial draw fails.
    #[error("{method} initialization failed: {error}")]
    InitFailed {
        /// The initialization method.
        method: InitMethod,
        /// The failing step.
        error: StepError,
    },

    /// An algorithm run failed.
    #[error(transparent)]
    Algorithm(#[from] AlgoError),

    /// Returned when no try improved on the incoming likelihood. The
    /// caller's model is unchanged.
    #[error("no improvement after {n_try} tries ({} failures recorded)", .messages.len())]
    NoImprovement {
        /// Number of tries attempted.
        n_try: usize,
        /// One message per failed or rejected trial, in order.
        messages: Vec<String>,
    },
}
