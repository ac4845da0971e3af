//! Algorithms and multi-try strategies for estimating mixture models.
//!
//! Estimation runs in three layers, each driving the one below:
//!
//! | Layer | Type | Role |
//! |---|---|---|
//! | Strategy | [`Strategy`] | tries, short runs and long runs; keeps the best trial |
//! | Initializer | [`Initializer`] | reset, random draw, optional short init algorithm |
//! | Algorithm | [`Algorithm`] | EM, CEM, SEM or SemiSEM iterations on a [`Composer`] |
//!
//! Trials run on copies held in a [`TrialArena`]; the caller's model is
//! only overwritten when a trial strictly improves its log-likelihood.
//!
//! [`Composer`]: mixall_composer::Composer
//!
//! # Quick start
//!
//! ```rust
//! use mixall_components::{Component, ModelName};
//! use mixall_composer::Composer;
//! use mixall_estimation::{Strategy, StrategyConfig, StrategyKind};
//! use ndarray::Array2;
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let data = Array2::from_shape_fn((60, 1), |(i, _)| if i < 30 { i as f64 * 0.1 } else { 8.0 + i as f64 * 0.1 });
//! let model: ModelName = "gaussian_sk".parse().unwrap();
//! let mut composer = Composer::new(vec![Component::new(model, data, 2).unwrap()], 2).unwrap();
//!
//! let config = StrategyConfig::new().with_kind(StrategyKind::Xem).with_n_short_run(2);
//! let strategy = Strategy::from_config(&config).unwrap();
//! let mut rng = StdRng::seed_from_u64(42);
//! let report = strategy.run(&mut composer, &mut rng).unwrap();
//! composer.finalize_step();
//! assert!(report.ln_likelihood.is_finite());
//! ```

pub mod algorithm;
pub mod arena;
pub mod config;
pub mod error;
pub mod init;
pub mod strategy;

pub use algorithm::{AlgoOutcome, Algorithm};
pub use arena::TrialArena;
pub use config::{AlgoConfig, AlgoKind, InitConfig, InitMethod, StrategyConfig, StrategyKind};
pub use error::{AlgoError, EstimationError};
pub use init::Initializer;
pub use strategy::{Strategy, StrategyReport};
