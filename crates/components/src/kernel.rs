//! Kernel Gaussian family (`kernel_gaussian_sk`, `kernel_gaussian_s`).
//!
//! Samples are mapped into the feature space of the RBF kernel
//! `k(x, y) = exp(-‖x - y‖² / (2h²))`. Each cluster is an isotropic Gaussian
//! of working dimension `dim` in that space, so only feature-space squared
//! distances to the weighted cluster centres are needed:
//!
//! ```text
//! d²(i, k) = K_ii - 2 Σ_l w_l K_il + Σ_lm w_l w_m K_lm,   w = tik[:, k] / tk[k]
//! ```

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;

use crate::component::{MixtureComponent, ParameterBlock, seed_rows};
use crate::data::{DataSet, check_cluster_weights};
use crate::error::ComponentError;
use crate::model::{ModelName, Sharing};

/// Options of the kernel Gaussian family.
///
/// # Example
///
/// ```
/// use mixall_components::KernelOptions;
///
/// let options = KernelOptions::new().with_bandwidth(0.5).with_dim(5);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelOptions {
    bandwidth: f64,
    dim: usize,
}

impl KernelOptions {
    /// Creates options with defaults: `bandwidth = 1.0`, `dim = 10`.
    pub fn new() -> Self {
        Self {
            bandwidth: 1.0,
            dim: 10,
        }
    }

    /// Sets the RBF bandwidth `h`.
    pub fn with_bandwidth(mut self, bandwidth: f64) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Sets the working dimension of the feature-space Gaussian.
    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }

    /// Returns the RBF bandwidth.
    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Returns the working dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Validates the options.
    pub fn validate(&self) -> Result<(), ComponentError> {
        if !self.bandwidth.is_finite() || self.bandwidth <= 0.0 {
            return Err(ComponentError::InvalidKernelOption {
                reason: format!("bandwidth must be finite and positive, got {}", self.bandwidth),
            });
        }
        if self.dim == 0 {
            return Err(ComponentError::InvalidKernelOption {
                reason: "dim must be >= 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Kernel Gaussian component.
#[derive(Debug, Clone)]
pub struct KernelComponent {
    gram: Arc<Array2<f64>>,
    sharing: Sharing,
    options: KernelOptions,
    n_variable: usize,
    n_cluster: usize,
    /// Feature-space squared distances, `(n_sample, n_cluster)`.
    dist: Array2<f64>,
    sigma2: Array1<f64>,
}

impl KernelComponent {
    /// Builds the Gram matrix of `data`.
    ///
    /// # Errors
    ///
    /// Fails with [`ComponentError::MissingNotSupported`] if any value is
    /// missing, or [`ComponentError::InvalidKernelOption`] for bad options.
    pub fn new(
        data: DataSet,
        sharing: Sharing,
        n_cluster: usize,
        options: KernelOptions,
    ) -> Result<Self, ComponentError> {
        if n_cluster == 0 {
            return Err(ComponentError::InvalidClusterCount { n_cluster });
        }
        options.validate()?;
        let model = ModelName::KernelGaussian { sigma: sharing };
        if data.has_missing() {
            return Err(ComponentError::MissingNotSupported {
                model: model.to_string(),
            });
        }

        let x = data.values();
        let n = data.n_sample();
        let scale = 2.0 * options.bandwidth * options.bandwidth;
        let mut gram = Array2::zeros((n, n));
        for i in 0..n {
            gram[[i, i]] = 1.0;
            for l in 0..i {
                let d2: f64 = x
                    .row(i)
                    .iter()
                    .zip(x.row(l))
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                let v = (-d2 / scale).exp();
                gram[[i, l]] = v;
                gram[[l, i]] = v;
            }
        }

        Ok(Self {
            gram: Arc::new(gram),
            sharing,
            options,
            n_variable: data.n_variable(),
            n_cluster,
            dist: Array2::zeros((n, n_cluster)),
            sigma2: Array1::ones(n_cluster),
        })
    }

    /// The Gram matrix.
    pub fn gram(&self) -> &Array2<f64> {
        &self.gram
    }

    /// Feature-space variance of each cluster.
    pub fn sigma2(&self) -> &Array1<f64> {
        &self.sigma2
    }

    /// Sets `sigma2` from the current distances and weights `tik`.
    fn update_sigma2(&mut self, tik: ArrayView2<f64>, tk: ArrayView1<f64>) -> Result<(), ComponentError> {
        let dim = self.options.dim as f64;
        let weighted: Vec<f64> = (0..self.n_cluster)
            .map(|k| tik.column(k).dot(&self.dist.column(k)))
            .collect();
        self.sigma2 = match self.sharing {
            Sharing::Common => {
                let total = weighted.iter().sum::<f64>() / (dim * tk.sum());
                Array1::from_elem(self.n_cluster, total)
            }
            _ => Array1::from_shape_fn(self.n_cluster, |k| weighted[k] / (dim * tk[k])),
        };
        for (cluster, &value) in self.sigma2.iter().enumerate() {
            if !(value.is_finite() && value > 0.0) {
                return Err(ComponentError::DegenerateParameter {
                    parameter: "sigma2",
                    cluster,
                    value,
                });
            }
        }
        Ok(())
    }
}

impl MixtureComponent for KernelComponent {
    fn model(&self) -> ModelName {
        ModelName::KernelGaussian {
            sigma: self.sharing,
        }
    }

    fn n_sample(&self) -> usize {
        self.gram.nrows()
    }

    fn n_variable(&self) -> usize {
        self.n_variable
    }

    fn n_cluster(&self) -> usize {
        self.n_cluster
    }

    fn ln_component_probability(&self, i: usize, k: usize) -> f64 {
        let s2 = self.sigma2[k];
        -0.5 * self.options.dim as f64 * ((2.0 * PI).ln() + s2.ln()) - self.dist[[i, k]] / (2.0 * s2)
    }

    fn m_step(&mut self, tik: ArrayView2<f64>, tk: ArrayView1<f64>) -> Result<(), ComponentError> {
        check_cluster_weights(tk)?;
        let gram = &self.gram;
        for k in 0..self.n_cluster {
            let w = tik.column(k).mapv(|t| t / tk[k]);
            let gw = gram.dot(&w);
            let wgw = w.dot(&gw);
            for i in 0..gram.nrows() {
                self.dist[[i, k]] = (gram[[i, i]] - 2.0 * gw[i] + wgw).max(0.0);
            }
        }
        self.update_sigma2(tik, tk)
    }

    fn random_init<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ComponentError> {
        let n = self.gram.nrows();
        let rows = seed_rows(n, self.n_cluster, rng)?;
        let gram = &self.gram;
        for (k, &c) in rows.iter().enumerate() {
            for i in 0..n {
                self.dist[[i, k]] = (gram[[i, i]] - 2.0 * gram[[i, c]] + gram[[c, c]]).max(0.0);
            }
        }
        let uniform = Array2::from_elem((n, self.n_cluster), 1.0);
        let counts = Array1::from_elem(self.n_cluster, n as f64);
        self.update_sigma2(uniform.view(), counts.view())
    }

    fn n_free_parameters(&self) -> usize {
        self.sharing.n_free(self.n_cluster, 1)
    }

    fn initialize_missing(&mut self) {}

    fn imputation_step(&mut self, _tik: ArrayView2<f64>) {}

    fn sampling_step<R: Rng + ?Sized>(&mut self, _tik: ArrayView2<f64>, _rng: &mut R) {}

    fn parameters(&self) -> Vec<ParameterBlock> {
        vec![
            ParameterBlock {
                name: "sigma2".to_string(),
                values: self.sigma2.iter().map(|&s| vec![s]).collect(),
            },
            ParameterBlock {
                name: "dim".to_string(),
                values: vec![vec![self.options.dim as f64]],
            },
        ]
    }
}
