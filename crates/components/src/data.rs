//! Observed data bound to a component, with missing-value bookkeeping.

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::error::ComponentError;

/// A `(n_sample, n_variable)` data array whose `NaN` entries are missing.
///
/// Missing positions are recorded once at construction. Their values are
/// overwritten by [`DataSet::initialize_missing`] and later by imputation or
/// sampling, but they always remain flagged as missing.
#[derive(Debug, Clone)]
pub struct DataSet {
    values: Array2<f64>,
    missing: Vec<(usize, usize)>,
}

impl DataSet {
    /// Wraps a data array.
    ///
    /// # Errors
    ///
    /// - [`ComponentError::EmptyData`] if the array has no rows or columns.
    /// - [`ComponentError::NonFiniteData`] if an entry is infinite.
    /// - [`ComponentError::AllMissing`] if a column has no observed value.
    pub fn new(values: Array2<f64>) -> Result<Self, ComponentError> {
        let (n_sample, n_variable) = values.dim();
        if n_sample == 0 || n_variable == 0 {
            return Err(ComponentError::EmptyData);
        }

        let mut missing = Vec::new();
        for ((row, variable), &x) in values.indexed_iter() {
            if x.is_nan() {
                missing.push((row, variable));
            } else if x.is_infinite() {
                return Err(ComponentError::NonFiniteData { row, variable });
            }
        }
        for variable in 0..n_variable {
            if values.column(variable).iter().all(|x| x.is_nan()) {
                return Err(ComponentError::AllMissing { variable });
            }
        }

        Ok(Self { values, missing })
    }

    /// Number of samples (rows).
    pub fn n_sample(&self) -> usize {
        self.values.nrows()
    }

    /// Number of variables (columns).
    pub fn n_variable(&self) -> usize {
        self.values.ncols()
    }

    /// The current values, including any filled-in missing entries.
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Value at `(i, j)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[[i, j]]
    }

    /// Positions `(row, variable)` of the missing entries, row-major.
    pub fn missing(&self) -> &[(usize, usize)] {
        &self.missing
    }

    /// Returns `true` if any entry is missing.
    pub fn has_missing(&self) -> bool {
        !self.missing.is_empty()
    }

    /// Checks every observed entry against a support predicate.
    pub fn check_support(
        &self,
        in_support: impl Fn(f64) -> bool,
        reason: &'static str,
    ) -> Result<(), ComponentError> {
        for ((row, variable), &value) in self.values.indexed_iter() {
            if !value.is_nan() && !in_support(value) {
                return Err(ComponentError::OutOfSupport {
                    row,
                    variable,
                    value,
                    reason,
                });
            }
        }
        Ok(())
    }

    /// Observed (never missing) values of column `j`.
    pub fn observed_column(&self, j: usize) -> Vec<f64> {
        let mut column = self.values.column(j).to_vec();
        for &(i, v) in &self.missing {
            if v == j {
                column[i] = f64::NAN;
            }
        }
        column.retain(|x| !x.is_nan());
        column
    }

    /// Fills every missing entry with `fill(j)` computed from the observed
    /// values of its column.
    pub fn initialize_missing(&mut self, fill: impl Fn(&[f64]) -> f64) {
        if self.missing.is_empty() {
            return;
        }
        let per_column: Vec<f64> = (0..self.n_variable())
            .map(|j| fill(&self.observed_column(j)))
            .collect();
        for &(i, j) in &self.missing {
            self.values[[i, j]] = per_column[j];
        }
    }

    /// Replaces every missing entry with `value(i, j)`.
    ///
    /// The replacements are all computed before any entry is written.
    pub fn fill_missing(&mut self, mut value: impl FnMut(usize, usize) -> f64) {
        let filled: Vec<f64> = self.missing.iter().map(|&(i, j)| value(i, j)).collect();
        for (&(i, j), x) in self.missing.iter().zip(filled) {
            self.values[[i, j]] = x;
        }
    }

    /// `Σ_i tik[i, k] · f(x[i, j])` as a `(n_cluster, n_variable)` array.
    pub fn weighted_sums_of(&self, tik: ArrayView2<f64>, f: impl Fn(f64) -> f64) -> Array2<f64> {
        let mapped = self.values.mapv(f);
        tik.t().dot(&mapped)
    }

    /// `Σ_i tik[i, k] · x[i, j]` as a `(n_cluster, n_variable)` array.
    pub fn weighted_sums(&self, tik: ArrayView2<f64>) -> Array2<f64> {
        tik.t().dot(&self.values)
    }

    /// Weighted means `Σ_i tik[i, k] · x[i, j] / tk[k]`.
    pub fn weighted_means(&self, tik: ArrayView2<f64>, tk: ArrayView1<f64>) -> Array2<f64> {
        let mut means = self.weighted_sums(tik);
        for (mut row, &t) in means.rows_mut().into_iter().zip(tk.iter()) {
            row /= t;
        }
        means
    }

    /// Weighted squared deviations `Σ_i tik[i, k] · (x[i, j] - center[k, j])²`.
    pub fn weighted_sq_dev(&self, tik: ArrayView2<f64>, center: &Array2<f64>) -> Array2<f64> {
        let (n_cluster, n_variable) = center.dim();
        let mut out = Array2::zeros((n_cluster, n_variable));
        for (i, x) in self.values.rows().into_iter().enumerate() {
            for k in 0..n_cluster {
                let w = tik[[i, k]];
                if w == 0.0 {
                    continue;
                }
                for j in 0..n_variable {
                    let d = x[j] - center[[k, j]];
                    out[[k, j]] += w * d * d;
                }
            }
        }
        out
    }
}

/// Broadcasts `tk` to a `(n_cluster, n_variable)` weight array.
pub(crate) fn cluster_weights(tk: ArrayView1<f64>, n_variable: usize) -> Array2<f64> {
    Array2::from_shape_fn((tk.len(), n_variable), |(k, _)| tk[k])
}

/// Fails with [`ComponentError::DegenerateParameter`] if any cluster weight
/// is not strictly positive.
pub(crate) fn check_cluster_weights(tk: ArrayView1<f64>) -> Result<(), ComponentError> {
    for (cluster, &value) in tk.iter().enumerate() {
        if !(value.is_finite() && value > 0.0) {
            return Err(ComponentError::DegenerateParameter {
                parameter: "cluster weight",
                cluster,
                value,
            });
        }
    }
    Ok(())
}
