//! Error types for the mixall-components crate.

/// Error type for all fallible operations in the mixall-components crate.
///
/// Construction errors (invalid data or options) are raised eagerly when a
/// component is bound to its data set. [`ComponentError::DegenerateParameter`]
/// is the only variant produced while estimating.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ComponentError {
    /// Returned when the data array has no rows or no columns.
    #[error("input data is empty")]
    EmptyData,

    /// Returned when the requested number of clusters is zero.
    #[error("invalid cluster count: {n_cluster} (must be >= 1)")]
    InvalidClusterCount {
        /// The invalid cluster count.
        n_cluster: usize,
    },

    /// Returned when a model name cannot be parsed.
    #[error("unknown model name: {name:?}")]
    UnknownModel {
        /// The unrecognised name.
        name: String,
    },

    /// Returned when a column holds no observed value at all.
    #[error("variable {variable} has no observed values")]
    AllMissing {
        /// 0-indexed variable (column).
        variable: usize,
    },

    /// Returned when an observed value is infinite.
    #[error("non-finite value at row {row}, variable {variable}")]
    NonFiniteData {
        /// 0-indexed sample.
        row: usize,
        /// 0-indexed variable.
        variable: usize,
    },

    /// Returned when an observed value is outside the support of the law.
    #[error("value {value} at row {row}, variable {variable} is outside the support: {reason}")]
    OutOfSupport {
        /// 0-indexed sample.
        row: usize,
        /// 0-indexed variable.
        variable: usize,
        /// The offending value.
        value: f64,
        /// Description of the expected support.
        reason: &'static str,
    },

    /// Returned when a family cannot handle missing values.
    #[error("model {model} does not support missing values")]
    MissingNotSupported {
        /// The model name.
        model: String,
    },

    /// Returned when categorical variables do not share a modality set but
    /// the model pools probabilities across variables.
    #[error("incompatible modalities: {reason}")]
    IncompatibleModalities {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when a kernel option is invalid.
    #[error("invalid kernel option: {reason}")]
    InvalidKernelOption {
        /// Description of the problem.
        reason: String,
    },

    /// Returned when there are fewer samples than clusters to seed from.
    #[error("too few samples: {n_sample} samples for {n_cluster} clusters")]
    TooFewSamples {
        /// Number of samples.
        n_sample: usize,
        /// Number of clusters.
        n_cluster: usize,
    },

    /// Returned when an estimated parameter collapses (zero variance, zero
    /// rate, empty cluster weight, or a non-finite value).
    #[error("degenerate {parameter} in cluster {cluster}: {value}")]
    DegenerateParameter {
        /// Name of the parameter.
        parameter: &'static str,
        /// 0-indexed cluster.
        cluster: usize,
        /// The offending value.
        value: f64,
    },
}
