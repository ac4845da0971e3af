//! Penalized-likelihood criteria and best-candidate selection.

use std::fmt;
use std::str::FromStr;

use mixall_composer::Composer;

use crate::error::CriteriaError;

/// A penalized-likelihood criterion. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    /// Bayesian information criterion.
    Bic,
    /// Akaike information criterion.
    Aic,
    /// Integrated completed likelihood.
    Icl,
}

impl Criterion {
    /// Upper-case short name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bic => "BIC",
            Self::Aic => "AIC",
            Self::Icl => "ICL",
        }
    }

    /// Scores `model` from its current log-likelihood and parameter count.
    pub fn value(&self, model: &Composer) -> f64 {
        let p = model.n_free_parameters();
        match self {
            Self::Bic => bic(model.ln_likelihood(), p, model.n_sample()),
            Self::Aic => aic(model.ln_likelihood(), p),
            Self::Icl => model.compute_icl(),
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Criterion {
    type Err = CriteriaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bic" => Ok(Self::Bic),
            "aic" => Ok(Self::Aic),
            "icl" => Ok(Self::Icl),
            _ => Err(CriteriaError::UnknownCriterion { name: s.to_string() }),
        }
    }
}

/// `-2 lnL + p ln n`.
pub fn bic(ln_likelihood: f64, n_free_parameters: usize, n_sample: usize) -> f64 {
    -2.0 * ln_likelihood + n_free_parameters as f64 * (n_sample as f64).ln()
}

/// `-2 lnL + 2 p`.
pub fn aic(ln_likelihood: f64, n_free_parameters: usize) -> f64 {
    -2.0 * ln_likelihood + 2.0 * n_free_parameters as f64
}

/// Index of the lowest finite score. Ties keep the first; `None` if no
/// score is finite.
pub fn select_best(scores: &[f64]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .fold(None, |best: Option<(usize, f64)>, (i, &s)| match best {
            Some((_, b)) if b <= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}
