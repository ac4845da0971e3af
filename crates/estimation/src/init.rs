//! Initialization of a model before the main algorithm runs.

use mixall_composer::Composer;
use rand::Rng;
use tracing::debug;

use crate::algorithm::Algorithm;
use crate::config::{InitConfig, InitMethod};
use crate::error::EstimationError;

/// Resets a model, draws a starting point and optionally refines it with a
/// short algorithm run.
#[derive(Debug, Clone, Copy)]
pub struct Initializer {
    config: InitConfig,
}

impl Initializer {
    /// Creates an initializer from its configuration.
    pub fn new(config: InitConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &InitConfig {
        &self.config
    }

    /// Runs `initialize_step`, the configured random draw and, unless its
    /// `n_iter_max` is 0, the init algorithm. Returns the log-likelihood
    /// reached.
    ///
    /// # Errors
    ///
    /// [`EstimationError::InitFailed`] if the draw fails, or
    /// [`EstimationError::Algorithm`] if the init algorithm fails.
    pub fn run<R: Rng + ?Sized>(&self, model: &mut Composer, rng: &mut R) -> Result<f64, EstimationError> {
        let method = self.config.method();
        model.initialize_step();
        let drawn = match method {
            InitMethod::RandomParams => model.random_param_init(rng),
            InitMethod::RandomClass => model.random_class_init(rng),
            InitMethod::RandomFuzzy => model.random_fuzzy_init(rng),
        };
        drawn.map_err(|error| EstimationError::InitFailed { method, error })?;

        let algo = self.config.algo();
        if algo.n_iter_max() > 0 {
            Algorithm::new(*algo).run(model, rng)?;
        }
        debug!(%method, ln_likelihood = model.ln_likelihood(), "initialized");
        Ok(model.ln_likelihood())
    }
}
