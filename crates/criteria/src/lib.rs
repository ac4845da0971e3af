//! Model-selection criteria for estimated mixture models.
//!
//! | Criterion | Score |
//! |---|---|
//! | BIC | `-2 lnL + p ln n` |
//! | AIC | `-2 lnL + 2 p` |
//! | ICL | BIC `- 2 Σ tik ln tik` |
//!
//! `p` is the number of free parameters of the composer (proportions plus
//! every component). Lower scores are better; [`select_best`] picks the
//! winner among candidates.
//!
//! # Quick start
//!
//! ```rust
//! use mixall_criteria::{Criterion, select_best};
//!
//! let criterion: Criterion = "bic".parse().unwrap();
//! assert_eq!(criterion.name(), "BIC");
//! assert_eq!(select_best(&[812.4, 790.1, f64::NAN]), Some(1));
//! ```

pub mod criterion;
pub mod error;

pub use criterion::{Criterion, aic, bic, select_best};
pub use error::CriteriaError;
