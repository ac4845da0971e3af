//! Error types for the mixall-criteria crate.

/// Error type for all fallible operations in the mixall-criteria crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CriteriaError {
    /// Returned when a criterion name is not recognised.
    #[error("unknown criterion {name:?} (expected bic, aic or icl)")]
    UnknownCriterion {
        /// The name as given.
        name: String,
    },
}
