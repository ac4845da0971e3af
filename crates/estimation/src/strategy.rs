//! Multi-try estimation strategies.
//!
//! A strategy chains initializations and algorithm runs on trial copies of
//! the caller's model and writes the caller's model back only when a trial
//! ends with a strictly higher log-likelihood than the model had on entry.
//! Ties keep the incoming model.
//!
//! | Strategy | Per try |
//! |---|---|
//! | Simple | init, long run; the best over all tries is kept |
//! | XEM | `n_short_run` × (init, short run), long run on the best short result |
//! | Full | `n_short_run` × (best of `n_init_run` inits, short run), long run on the best short result |
//!
//! XEM and Full accept and stop at the first try that improves on the
//! incoming likelihood.

use mixall_composer::Composer;
use rand::Rng;
use tracing::{debug, debug_span, info};

use crate::algorithm::Algorithm;
use crate::arena::TrialArena;
use crate::config::{StrategyConfig, StrategyKind};
use crate::error::EstimationError;
use crate::init::Initializer;

// Arena slots.
const CURRENT: usize = 0;
const BEST: usize = 1;
const BEST_INIT: usize = 2;

/// Summary of a successful strategy run.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyReport {
    /// Log-likelihood of the model written back to the caller.
    pub ln_likelihood: f64,
    /// Number of tries performed, 1-indexed.
    pub n_try_used: usize,
    /// Failed or rejected trials encountered on the way, in order.
    pub messages: Vec<String>,
}

/// A validated estimation strategy.
#[derive(Debug, Clone, Copy)]
pub struct Strategy {
    config: StrategyConfig,
}

impl Strategy {
    /// Builds a strategy, validating the configuration.
    ///
    /// # Errors
    ///
    /// [`EstimationError::InvalidConfig`] if any count is zero or any
    /// algorithm setting is out of range.
    pub fn from_config(config: &StrategyConfig) -> Result<Self, EstimationError> {
        config.validate()?;
        Ok(Self { config: *config })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Estimates `model`.
    ///
    /// On success the model holds the best trial found. The caller then
    /// typically runs `imputation_step` and `finalize_step`.
    ///
    /// # Errors
    ///
    /// [`EstimationError::NoImprovement`] when no try beats the incoming
    /// log-likelihood. The model is then exactly as it was on entry.
    #[tracing::instrument(skip_all, fields(kind = %self.config.kind(), n_cluster = model.n_cluster()))]
    pub fn run<R: Rng + ?Sized>(
        &self,
        model: &mut Composer,
        rng: &mut R,
    ) -> Result<StrategyReport, EstimationError> {
        let incoming = model.ln_likelihood();
        let mut messages = Vec::new();
        let outcome = match self.config.kind() {
            StrategyKind::Simple => self.run_simple(model, incoming, &mut messages, rng),
            StrategyKind::Xem | StrategyKind::Full => self.run_multi_stage(model, incoming, &mut messages, rng),
        };

        match outcome {
            Some(n_try_used) => {
                info!(
                    n_try_used,
                    ln_likelihood = model.ln_likelihood(),
                    n_message = messages.len(),
                    "strategy improved model"
                );
                Ok(StrategyReport {
                    ln_likelihood: model.ln_likelihood(),
                    n_try_used,
                    messages,
                })
            }
            None => {
                info!(n_try = self.config.n_try(), incoming, "strategy found no improvement");
                Err(EstimationError::NoImprovement {
                    n_try: self.config.n_try(),
                    messages,
                })
            }
        }
    }

    /// Every try runs to completion; the best trial is stored at the end.
    fn run_simple<R: Rng + ?Sized>(
        &self,
        model: &mut Composer,
        incoming: f64,
        messages: &mut Vec<String>,
        rng: &mut R,
    ) -> Option<usize> {
        let initializer = Initializer::new(*self.config.init());
        let long = Algorithm::new(*self.config.long_algo());
        let mut arena = TrialArena::new(model, 2);
        let mut best = incoming;
        let mut found = false;

        for t in 1..=self.config.n_try() {
            let _try = debug_span!("try", t).entered();
            arena.reset(CURRENT, model);
            let trial = arena.get_mut(CURRENT);
            if let Err(e) = initializer.run(trial, rng) {
                record(messages, format!("try {t}: {e}"));
                continue;
            }
            match long.run(trial, rng) {
                Ok(out) if out.ln_likelihood > best => {
                    best = out.ln_likelihood;
                    found = true;
                    arena.swap(CURRENT, BEST);
                }
                Ok(out) => record(
                    messages,
                    format!("try {t}: log-likelihood {} does not improve on {best}", out.ln_likelihood),
                ),
                Err(e) => record(messages, format!("try {t}: {e}")),
            }
        }

        if found {
            arena.store(BEST, model);
            Some(self.config.n_try())
        } else {
            None
        }
    }

    /// XEM and Full: short runs from fresh inits, then a long run on the
    /// best short result, stopping at the first improving try.
    fn run_multi_stage<R: Rng + ?Sized>(
        &self,
        model: &mut Composer,
        incoming: f64,
        messages: &mut Vec<String>,
        rng: &mut R,
    ) -> Option<usize> {
        let short = Algorithm::new(*self.config.short_algo());
        let long = Algorithm::new(*self.config.long_algo());
        let mut arena = TrialArena::new(model, 3);

        for t in 1..=self.config.n_try() {
            let _try = debug_span!("try", t).entered();
            let mut best_short: Option<f64> = None;

            for s in 1..=self.config.n_short_run() {
                let seed = match self.config.kind() {
                    StrategyKind::Full => self.init_step(&mut arena, model, t, s, messages, rng),
                    _ => self.single_init(&mut arena, model, t, s, messages, rng),
                };
                let Some(seed) = seed else {
                    continue;
                };
                match short.run(arena.get_mut(seed), rng) {
                    Ok(out) => {
                        debug!(t, s, ln_likelihood = out.ln_likelihood, "short run done");
                        if best_short.is_none_or(|b| out.ln_likelihood > b) {
                            best_short = Some(out.ln_likelihood);
                            arena.swap(seed, BEST);
                        }
                    }
                    Err(e) => record(messages, format!("try {t}, short run {s}: {e}")),
                }
            }

            if best_short.is_none() {
                record(messages, format!("try {t}: every short run failed"));
                continue;
            }
            match long.run(arena.get_mut(BEST), rng) {
                Ok(out) if out.ln_likelihood > incoming => {
                    arena.store(BEST, model);
                    return Some(t);
                }
                Ok(out) => record(
                    messages,
                    format!(
                        "try {t}: log-likelihood {} does not improve on {incoming}",
                        out.ln_likelihood
                    ),
                ),
                Err(e) => record(messages, format!("try {t}, long run: {e}")),
            }
        }
        None
    }

    /// One fresh initialization in the current slot.
    fn single_init<R: Rng + ?Sized>(
        &self,
        arena: &mut TrialArena,
        model: &Composer,
        t: usize,
        s: usize,
        messages: &mut Vec<String>,
        rng: &mut R,
    ) -> Option<usize> {
        arena.reset(CURRENT, model);
        match Initializer::new(*self.config.init()).run(arena.get_mut(CURRENT), rng) {
            Ok(_) => Some(CURRENT),
            Err(e) => {
                record(messages, format!("try {t}, short run {s}: {e}"));
                None
            }
        }
    }

    /// `n_init_run` fresh initializations; the best is left in the
    /// best-init slot. Every attempt starts from a clean copy of `model`,
    /// so a failed attempt never leaks into the next one.
    fn init_step<R: Rng + ?Sized>(
        &self,
        arena: &mut TrialArena,
        model: &Composer,
        t: usize,
        s: usize,
        messages: &mut Vec<String>,
        rng: &mut R,
    ) -> Option<usize> {
        let initializer = Initializer::new(*self.config.init());
        let mut best: Option<f64> = None;
        for r in 1..=self.config.init().n_init_run() {
            arena.reset(CURRENT, model);
            match initializer.run(arena.get_mut(CURRENT), rng) {
                Ok(ln) => {
                    if best.is_none_or(|b| ln > b) {
                        best = Some(ln);
                        arena.swap(CURRENT, BEST_INIT);
                    }
                }
                Err(e) => record(messages, format!("try {t}, short run {s}, init {r}: {e}")),
            }
        }
        best.map(|_| BEST_INIT)
    }
}

fn record(messages: &mut Vec<String>, message: String) {
    debug!(%message, "trial rejected");
    messages.push(message);
}
