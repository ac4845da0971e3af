//! Latent-state owner of a finite mixture model.
//!
//! A [`Composer`] aggregates one or more mixture components over the same
//! samples and owns the latent variables of the model:
//!
//! | Field | Shape | Meaning |
//! |---|---|---|
//! | `prop` | `K` | mixing proportions |
//! | `tik` | `n × K` | responsibilities, rows sum to 1 |
//! | `tk` | `K` | expected cluster sizes |
//! | `zi` | `n` | hard labels |
//!
//! The single-iteration primitives (E, C, S, M, P and MAP steps) are the
//! building blocks of the EM-family algorithms. Steps that can detect a
//! degenerate model return a [`StepError`] instead of panicking.
//!
//! # Quick start
//!
//! ```rust
//! use mixall_components::{Component, ModelName};
//! use mixall_composer::{Composer, ComposerState};
//! use ndarray::Array2;
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let data = Array2::from_shape_fn((60, 1), |(i, _)| if i < 30 { i as f64 * 0.1 } else { 8.0 + i as f64 * 0.1 });
//! let model: ModelName = "gaussian_sk".parse().unwrap();
//! let component = Component::new(model, data, 2).unwrap();
//!
//! let mut composer = Composer::new(vec![component], 2).unwrap();
//! let mut rng = StdRng::seed_from_u64(42);
//! composer.initialize_step();
//! composer.random_class_init(&mut rng).unwrap();
//! assert_eq!(composer.state(), ComposerState::ParamInitialized);
//! ```

pub mod composer;
pub mod error;
pub mod state;

pub use composer::Composer;
pub use error::{ComposerError, StepError};
pub use state::ComposerState;
