//! Error types for the mixall-composer crate.

use mixall_components::ComponentError;

/// Configuration errors raised when a [`Composer`](crate::Composer) is built.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ComposerError {
    /// Returned when no component is supplied.
    #[error("a composer needs at least one component")]
    NoComponents,

    /// Returned when the cluster count is zero.
    #[error("invalid cluster count: {n_cluster} (must be >= 1)")]
    InvalidClusterCount {
        /// The invalid cluster count.
        n_cluster: usize,
    },

    /// Returned when a component was built for a different cluster count.
    #[error("component {component} has {found} clusters, expected {expected}")]
    ClusterCountMismatch {
        /// 0-indexed component.
        component: usize,
        /// Cluster count of the composer.
        expected: usize,
        /// Cluster count of the component.
        found: usize,
    },

    /// Returned when components disagree on the number of samples.
    #[error("component {component} has {found} samples, expected {expected}")]
    SampleCountMismatch {
        /// 0-indexed component.
        component: usize,
        /// Sample count of the first component.
        expected: usize,
        /// Sample count of the offending component.
        found: usize,
    },

    /// Returned when there are fewer samples than clusters.
    #[error("too few samples: {n_sample} samples for {n_cluster} clusters")]
    TooFewSamples {
        /// Number of samples.
        n_sample: usize,
        /// Number of clusters.
        n_cluster: usize,
    },
}

/// Failure of a single estimation step.
///
/// These are recoverable at the strategy level: the trial that produced one
/// is discarded and the next one is attempted.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StepError {
    /// A cluster's expected occupancy fell below the viability threshold.
    #[error("cluster {cluster} emptied: occupancy {occupancy:.3} below threshold {threshold:.3}")]
    EmptyCluster {
        /// 0-indexed cluster with the lowest occupancy.
        cluster: usize,
        /// Its expected size `tk`.
        occupancy: f64,
        /// The threshold in force.
        threshold: f64,
    },

    /// A component could not estimate its parameters.
    #[error("component {component}: {error}")]
    EstimationFailed {
        /// 0-indexed component.
        component: usize,
        /// The component failure.
        error: ComponentError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_no_components() {
        let e = ComposerError::NoComponents;
        assert_eq!(e.to_string(), "a composer needs at least one component");
    }

    #[test]
    fn error_cluster_count_mismatch() {
        let e = ComposerError::ClusterCountMismatch {
            component: 1,
            expected: 3,
            found: 2,
        };
        assert_eq!(e.to_string(), "component 1 has 2 clusters, expected 3");
    }

    #[test]
    fn error_sample_count_mismatch() {
        let e = ComposerError::SampleCountMismatch {
            component: 2,
            expected: 100,
            found: 99,
        };
        assert_eq!(e.to_string(), "component 2 has 99 samples, expected 100");
    }

    #[test]
    fn error_empty_cluster() {
        let e = StepError::EmptyCluster {
            cluster: 2,
            occupancy: 0.5,
            threshold: 9.0,
        };
        assert_eq!(
            e.to_string(),
            "cluster 2 emptied: occupancy 0.500 below threshold 9.000"
        );
    }

    #[test]
    fn error_estimation_failed() {
        let e = StepError::EstimationFailed {
            component: 0,
            error: ComponentError::DegenerateParameter {
                parameter: "variance",
                cluster: 1,
                value: 0.0,
            },
        };
        assert_eq!(e.to_string(), "component 0: degenerate variance in cluster 1: 0");
    }

    #[test]
    fn error_is_std_error() {
        fn assert_impl<T: std::error::Error>() {}
        assert_impl::<ComposerError>();
        assert_impl::<StepError>();
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_impl<T: Send + Sync>() {}
        assert_impl::<ComposerError>();
        assert_impl::<StepError>();
    }
}
