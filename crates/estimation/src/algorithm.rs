//! EM-family iteration loops.
//!
//! | Algorithm | Iteration | Stops when |
//! |---|---|---|
//! | EM | P, imputation, M, E | `Δ lnL < ε` |
//! | CEM | C, P, imputation, M, E | `|Δ lnL| < ε` |
//! | SEM | S, P, sampling, M, E | never before `n_iter_max` |
//! | SemiSEM | P, sampling, M, E | `|Δ lnL| < ε` |
//!
//! Every C, S and E step checks the cluster occupancy; a breach or a
//! component failure aborts the run.

use mixall_composer::{Composer, StepError};
use rand::Rng;
use tracing::{debug, warn};

use crate::config::{AlgoConfig, AlgoKind};
use crate::error::AlgoError;

/// Result of a completed algorithm run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlgoOutcome {
    /// Number of iterations performed.
    pub n_iter: usize,
    /// Log-likelihood after the last iteration.
    pub ln_likelihood: f64,
    /// `true` if the stop rule fired before `n_iter_max`.
    pub converged: bool,
}

/// An EM-family algorithm bound to its configuration.
#[derive(Debug, Clone, Copy)]
pub struct Algorithm {
    config: AlgoConfig,
}

impl Algorithm {
    /// Creates an algorithm from its configuration.
    pub fn new(config: AlgoConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AlgoConfig {
        &self.config
    }

    /// Iterates on `model` until the stop rule fires or `n_iter_max`
    /// iterations have run.
    ///
    /// # Errors
    ///
    /// Returns an [`AlgoError`] carrying the failing iteration. The model is
    /// left in the state reached at that point.
    pub fn run<R: Rng + ?Sized>(&self, model: &mut Composer, rng: &mut R) -> Result<AlgoOutcome, AlgoError> {
        let kind = self.config.kind();
        let epsilon = self.config.epsilon();
        let failed_at = |iteration: usize| move |error: StepError| AlgoError { kind, iteration, error };

        let mut previous = model.ln_likelihood();
        let mut n_iter = 0;
        let mut converged = false;

        for iteration in 1..=self.config.n_iter_max() {
            let fail = failed_at(iteration);
            match kind {
                AlgoKind::Em => {
                    model.p_step();
                    model.imputation_step();
                    model.m_step().map_err(fail)?;
                    model.e_step().map_err(fail)?;
                }
                AlgoKind::Cem => {
                    model.c_step().map_err(fail)?;
                    model.p_step();
                    model.imputation_step();
                    model.m_step().map_err(fail)?;
                    model.e_step().map_err(fail)?;
                }
                AlgoKind::Sem => {
                    model.s_step(rng).map_err(fail)?;
                    model.p_step();
                    model.sampling_step(rng);
                    model.m_step().map_err(fail)?;
                    model.e_step().map_err(fail)?;
                }
                AlgoKind::SemiSem => {
                    model.p_step();
                    model.sampling_step(rng);
                    model.m_step().map_err(fail)?;
                    model.e_step().map_err(fail)?;
                }
            }
            n_iter = iteration;

            let current = model.ln_likelihood();
            let delta = current - previous;
            debug!(algo = %kind, iteration, ln_likelihood = current, delta, "iteration");

            let stop = match kind {
                AlgoKind::Em => {
                    if delta < 0.0 {
                        warn!(iteration, previous, current, "EM log-likelihood decreased");
                    }
                    delta < epsilon
                }
                AlgoKind::Cem | AlgoKind::SemiSem => delta.abs() < epsilon,
                AlgoKind::Sem => false,
            };
            previous = current;
            if stop {
                converged = true;
                break;
            }
        }

        Ok(AlgoOutcome {
            n_iter,
            ln_likelihood: model.ln_likelihood(),
            converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixall_components::{Component, ModelName};
    use ndarray::Array2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn separated(n_cluster: usize) -> Composer {
        let data = Array2::from_shape_fn((60, 1), |(i, _)| {
            let base = if i < 30 { -4.0 } else { 4.0 };
            base + (i % 6) as f64 * 0.3
        });
        let model: ModelName = "gaussian_sk".parse().unwrap();
        let c = Component::new(model, data, n_cluster).unwrap();
        Composer::new(vec![c], n_cluster).unwrap()
    }

    fn seeded(n_cluster: usize, rng: &mut StdRng) -> Composer {
        let mut m = separated(n_cluster);
        m.initialize_step();
        m.random_class_init(rng).unwrap();
        m
    }

    #[test]
    fn em_converges_before_cap() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut m = seeded(2, &mut rng);
        let algo = Algorithm::new(AlgoConfig::new(AlgoKind::Em).with_n_iter_max(500).with_epsilon(1e-8));
        let out = algo.run(&mut m, &mut rng).unwrap();
        assert!(out.converged);
        assert!(out.n_iter < 500);
        assert_eq!(out.ln_likelihood, m.ln_likelihood());
    }

    #[test]
    fn cem_converges() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut m = seeded(2, &mut rng);
        let algo = Algorithm::new(AlgoConfig::new(AlgoKind::Cem).with_n_iter_max(100).with_epsilon(1e-8));
        let out = algo.run(&mut m, &mut rng).unwrap();
        assert!(out.converged);
    }

    #[test]
    fn sem_runs_every_iteration() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut m = seeded(2, &mut rng);
        let algo = Algorithm::new(AlgoConfig::new(AlgoKind::Sem).with_n_iter_max(15).with_epsilon(1.0));
        let out = algo.run(&mut m, &mut rng).unwrap();
        assert_eq!(out.n_iter, 15);
        assert!(!out.converged);
    }

    #[test]
    fn semisem_without_missing_values_stops_immediately() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut m = seeded(2, &mut rng);
        let em = Algorithm::new(AlgoConfig::new(AlgoKind::Em).with_n_iter_max(500).with_epsilon(1e-10));
        em.run(&mut m, &mut rng).unwrap();
        let semi = Algorithm::new(AlgoConfig::new(AlgoKind::SemiSem).with_n_iter_max(50).with_epsilon(1e-6));
        let out = semi.run(&mut m, &mut rng).unwrap();
        assert!(out.converged);
        assert!(out.n_iter <= 2);
    }

    #[test]
    fn failure_reports_iteration() {
        let mut rng = StdRng::seed_from_u64(5);
        let data = Array2::from_elem((30, 1), 1.0);
        let model: ModelName = "gaussian_sjk".parse().unwrap();
        let c = Component::new(model, data, 3).unwrap();
        let mut m = Composer::new(vec![c], 3).unwrap();
        m.initialize_step();
        let algo = Algorithm::new(AlgoConfig::new(AlgoKind::Em).with_n_iter_max(10));
        let err = algo.run(&mut m, &mut rng).unwrap_err();
        assert_eq!(err.kind, AlgoKind::Em);
        assert_eq!(err.iteration, 1);
        assert!(matches!(err.error, StepError::EstimationFailed { .. }));
    }

    #[test]
    fn cem_reports_empty_cluster_at_first_iteration() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut m = separated(2);
        m.initialize_step();
        let algo = Algorithm::new(AlgoConfig::new(AlgoKind::Cem).with_n_iter_max(10));
        let err = algo.run(&mut m, &mut rng).unwrap_err();
        assert_eq!(err.kind, AlgoKind::Cem);
        assert_eq!(err.iteration, 1);
        assert!(matches!(
            err.error,
            StepError::EmptyCluster { cluster: 1, occupancy, .. } if occupancy == 0.0
        ));
        assert!(m.tik().iter().all(|t| t.is_finite()));
    }
}
