//! The mixture component contract and the closed set of families.

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::Rng;
use serde::Serialize;

use crate::categorical::CategoricalComponent;
use crate::data::DataSet;
use crate::error::ComponentError;
use crate::gamma::GammaComponent;
use crate::gaussian::GaussianComponent;
use crate::kernel::{KernelComponent, KernelOptions};
use crate::model::ModelName;
use crate::poisson::PoissonComponent;

/// A family-specific density model bound to one data set.
///
/// The responsibilities `tik` `(n_sample, n_cluster)` and their column sums
/// `tk` are owned by the caller and passed in on every call that needs them.
pub trait MixtureComponent {
    /// The model this component implements.
    fn model(&self) -> ModelName;

    /// Number of samples of the bound data set.
    fn n_sample(&self) -> usize;

    /// Number of variables of the bound data set.
    fn n_variable(&self) -> usize;

    /// Number of clusters the parameters are sized for.
    fn n_cluster(&self) -> usize;

    /// `ln p_k(x_i)`, the log-density of sample `i` under cluster `k`.
    fn ln_component_probability(&self, i: usize, k: usize) -> f64;

    /// Re-estimates the parameters from the responsibilities.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::DegenerateParameter`] when an estimate
    /// collapses. The parameters may be partially updated in that case.
    fn m_step(&mut self, tik: ArrayView2<f64>, tk: ArrayView1<f64>) -> Result<(), ComponentError>;

    /// Draws a random starting parameter set.
    fn random_init<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ComponentError>;

    /// Number of free parameters.
    fn n_free_parameters(&self) -> usize;

    /// Fills missing entries with a per-column summary of the observed values.
    fn initialize_missing(&mut self);

    /// Replaces missing entries with their expectation under `tik`.
    fn imputation_step(&mut self, tik: ArrayView2<f64>);

    /// Replaces missing entries with draws from the mixture given `tik`.
    fn sampling_step<R: Rng + ?Sized>(&mut self, tik: ArrayView2<f64>, rng: &mut R);

    /// Named parameter tables, one row per cluster.
    fn parameters(&self) -> Vec<ParameterBlock>;
}

/// A named table of estimated parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterBlock {
    /// Parameter name (e.g. `"mean"`).
    pub name: String,
    /// Values, one row per cluster (or a single row for shared values).
    pub values: Vec<Vec<f64>>,
}

impl ParameterBlock {
    /// Builds a block from a 2-D array, row by row.
    pub fn from_array(name: &str, values: &Array2<f64>) -> Self {
        Self {
            name: name.to_string(),
            values: values.rows().into_iter().map(|r| r.to_vec()).collect(),
        }
    }
}

/// Picks `n_cluster` distinct sample indices.
pub(crate) fn seed_rows<R: Rng + ?Sized>(
    n_sample: usize,
    n_cluster: usize,
    rng: &mut R,
) -> Result<Vec<usize>, ComponentError> {
    if n_sample < n_cluster {
        return Err(ComponentError::TooFewSamples {
            n_sample,
            n_cluster,
        });
    }
    Ok(rand::seq::index::sample(rng, n_sample, n_cluster).into_vec())
}

/// Draws a cluster for sample `i` from row `i` of `tik`.
pub(crate) fn draw_cluster<R: Rng + ?Sized>(tik: ArrayView2<f64>, i: usize, rng: &mut R) -> usize {
    mixall_stats::sample_index(&tik.row(i).to_vec(), rng)
}

/// One of the supported mixture families.
#[derive(Debug, Clone)]
pub enum Component {
    /// Diagonal Gaussian.
    Gaussian(GaussianComponent),
    /// Gamma.
    Gamma(GammaComponent),
    /// Poisson.
    Poisson(PoissonComponent),
    /// Categorical.
    Categorical(CategoricalComponent),
    /// Kernel Gaussian.
    Kernel(KernelComponent),
}

impl Component {
    /// Binds `model` to `data` for `n_cluster` clusters.
    ///
    /// Kernel models use [`KernelOptions::default`]; see [`Component::kernel`].
    ///
    /// # Errors
    ///
    /// Returns a [`ComponentError`] if the data are empty, contain values
    /// outside the support of the family, or hold missing values the family
    /// cannot handle.
    pub fn new(model: ModelName, data: Array2<f64>, n_cluster: usize) -> Result<Self, ComponentError> {
        let data = DataSet::new(data)?;
        match model {
            ModelName::Gaussian { sigma } => {
                GaussianComponent::new(data, sigma, n_cluster).map(Self::Gaussian)
            }
            ModelName::Gamma { shape, scale } => {
                GammaComponent::new(data, shape, scale, n_cluster).map(Self::Gamma)
            }
            ModelName::Poisson(structure) => {
                PoissonComponent::new(data, structure, n_cluster).map(Self::Poisson)
            }
            ModelName::Categorical(structure) => {
                CategoricalComponent::new(data, structure, n_cluster).map(Self::Categorical)
            }
            ModelName::KernelGaussian { sigma } => {
                KernelComponent::new(data, sigma, n_cluster, KernelOptions::default())
                    .map(Self::Kernel)
            }
        }
    }

    /// Binds a kernel model with explicit kernel options.
    pub fn kernel(
        model: ModelName,
        data: Array2<f64>,
        n_cluster: usize,
        options: KernelOptions,
    ) -> Result<Self, ComponentError> {
        let ModelName::KernelGaussian { sigma } = model else {
            return Err(ComponentError::InvalidKernelOption {
                reason: format!("{model} is not a kernel model"),
            });
        };
        let data = DataSet::new(data)?;
        KernelComponent::new(data, sigma, n_cluster, options).map(Self::Kernel)
    }
}

macro_rules! dispatch {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            Component::Gaussian($c) => $body,
            Component::Gamma($c) => $body,
            Component::Poisson($c) => $body,
            Component::Categorical($c) => $body,
            Component::Kernel($c) => $body,
        }
    };
}

impl MixtureComponent for Component {
    fn model(&self) -> ModelName {
        dispatch!(self, c => c.model())
    }

    fn n_sample(&self) -> usize {
        dispatch!(self, c => c.n_sample())
    }

    fn n_variable(&self) -> usize {
        dispatch!(self, c => c.n_variable())
    }

    fn n_cluster(&self) -> usize {
        dispatch!(self, c => c.n_cluster())
    }

    #[inline]
    fn ln_component_probability(&self, i: usize, k: usize) -> f64 {
        dispatch!(self, c => c.ln_component_probability(i, k))
    }

    fn m_step(&mut self, tik: ArrayView2<f64>, tk: ArrayView1<f64>) -> Result<(), ComponentError> {
        dispatch!(self, c => c.m_step(tik, tk))
    }

    fn random_init<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ComponentError> {
        dispatch!(self, c => c.random_init(rng))
    }

    fn n_free_parameters(&self) -> usize {
        dispatch!(self, c => c.n_free_parameters())
    }

    fn initialize_missing(&mut self) {
        dispatch!(self, c => c.initialize_missing())
    }

    fn imputation_step(&mut self, tik: ArrayView2<f64>) {
        dispatch!(self, c => c.imputation_step(tik))
    }

    fn sampling_step<R: Rng + ?Sized>(&mut self, tik: ArrayView2<f64>, rng: &mut R) {
        dispatch!(self, c => c.sampling_step(tik, rng))
    }

    fn parameters(&self) -> Vec<ParameterBlock> {
        dispatch!(self, c => c.parameters())
    }
}
