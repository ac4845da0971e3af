//! Poisson family (`poisson_ljk`, `poisson_lk`, `poisson_ljlk`).

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;
use rand_distr::{Distribution, Poisson};
use statrs::function::factorial::ln_factorial;

use crate::component::{MixtureComponent, ParameterBlock, draw_cluster, seed_rows};
use crate::data::{DataSet, check_cluster_weights, cluster_weights};
use crate::error::ComponentError;
use crate::model::{ModelName, PoissonModel, Sharing};

/// Poisson component over non-negative integer counts.
#[derive(Debug, Clone)]
pub struct PoissonComponent {
    data: DataSet,
    structure: PoissonModel,
    n_cluster: usize,
    lambda: Array2<f64>,
    ln_lambda: Array2<f64>,
}

impl PoissonComponent {
    /// Binds the family to a count data set.
    pub fn new(data: DataSet, structure: PoissonModel, n_cluster: usize) -> Result<Self, ComponentError> {
        if n_cluster == 0 {
            return Err(ComponentError::InvalidClusterCount { n_cluster });
        }
        data.check_support(|x| x >= 0.0 && x.fract() == 0.0, "must be a non-negative integer")?;
        let n_variable = data.n_variable();
        let mut component = Self {
            data,
            structure,
            n_cluster,
            lambda: Array2::ones((n_cluster, n_variable)),
            ln_lambda: Array2::zeros((n_cluster, n_variable)),
        };
        component.initialize_missing();
        Ok(component)
    }

    /// Rates, `(n_cluster, n_variable)` after broadcasting.
    pub fn lambda(&self) -> &Array2<f64> {
        &self.lambda
    }

    fn set_lambda(&mut self, lambda: Array2<f64>) -> Result<(), ComponentError> {
        for ((k, _), &value) in lambda.indexed_iter() {
            if !(value.is_finite() && value > 0.0) {
                return Err(ComponentError::DegenerateParameter {
                    parameter: "lambda",
                    cluster: k,
                    value,
                });
            }
        }
        self.ln_lambda = lambda.mapv(f64::ln);
        self.lambda = lambda;
        Ok(())
    }

    /// Closed-form `l_j * l_k` fit, normalised so that `Σ_k tk l_k = n`.
    fn factored(sums: &Array2<f64>, tk: ArrayView1<f64>) -> Array2<f64> {
        let n: f64 = tk.sum();
        let l_j: Vec<f64> = sums.columns().into_iter().map(|c| c.sum() / n).collect();
        let total_j: f64 = l_j.iter().sum();
        let l_k: Vec<f64> = sums
            .rows()
            .into_iter()
            .zip(tk.iter())
            .map(|(r, &t)| r.sum() / (t * total_j))
            .collect();
        Array2::from_shape_fn(sums.dim(), |(k, j)| l_j[j] * l_k[k])
    }
}

impl MixtureComponent for PoissonComponent {
    fn model(&self) -> ModelName {
        ModelName::Poisson(self.structure)
    }

    fn n_sample(&self) -> usize {
        self.data.n_sample()
    }

    fn n_variable(&self) -> usize {
        self.data.n_variable()
    }

    fn n_cluster(&self) -> usize {
        self.n_cluster
    }

    fn ln_component_probability(&self, i: usize, k: usize) -> f64 {
        let mut sum = 0.0;
        for j in 0..self.data.n_variable() {
            let x = self.data.get(i, j);
            sum += x * self.ln_lambda[[k, j]] - self.lambda[[k, j]] - ln_factorial(x as u64);
        }
        sum
    }

    fn m_step(&mut self, tik: ArrayView2<f64>, tk: ArrayView1<f64>) -> Result<(), ComponentError> {
        check_cluster_weights(tk)?;
        let sums = self.data.weighted_sums(tik);
        let weights = cluster_weights(tk, self.data.n_variable());
        let lambda = match self.structure {
            PoissonModel::Ljk => Sharing::ClusterVariable.pool(&sums, &weights),
            PoissonModel::Lk => Sharing::Cluster.pool(&sums, &weights),
            PoissonModel::LjLk => Self::factored(&sums, tk),
        };
        self.set_lambda(lambda)
    }

    fn random_init<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ComponentError> {
        let rows = seed_rows(self.data.n_sample(), self.n_cluster, rng)?;
        let n_variable = self.data.n_variable();
        let column_mean: Vec<f64> = (0..n_variable)
            .map(|j| mixall_stats::mean(&self.data.values().column(j).to_vec()))
            .collect();
        // Halfway between a random sample and the column mean.
        let raw = Array2::from_shape_fn((self.n_cluster, n_variable), |(k, j)| {
            0.5 * (self.data.get(rows[k], j) + column_mean[j])
        });
        let ones = Array2::ones(raw.dim());
        let lambda = match self.structure {
            PoissonModel::Ljk => raw,
            PoissonModel::Lk => Sharing::Cluster.pool(&raw, &ones),
            PoissonModel::LjLk => Self::factored(&raw, Array1::ones(self.n_cluster).view()),
        };
        self.set_lambda(lambda)
    }

    fn n_free_parameters(&self) -> usize {
        let n_variable = self.data.n_variable();
        match self.structure {
            PoissonModel::Ljk => self.n_cluster * n_variable,
            PoissonModel::Lk => self.n_cluster,
            PoissonModel::LjLk => n_variable + self.n_cluster - 1,
        }
    }

    fn initialize_missing(&mut self) {
        self.data
            .initialize_missing(|column| mixall_stats::mean(column).round());
    }

    fn imputation_step(&mut self, tik: ArrayView2<f64>) {
        let lambda = &self.lambda;
        self.data.fill_missing(|i, j| {
            (0..lambda.nrows())
                .map(|k| tik[[i, k]] * lambda[[k, j]])
                .sum::<f64>()
                .round()
        });
    }

    fn sampling_step<R: Rng + ?Sized>(&mut self, tik: ArrayView2<f64>, rng: &mut R) {
        let lambda = &self.lambda;
        self.data.fill_missing(|i, j| {
            let k = draw_cluster(tik, i, rng);
            match Poisson::new(lambda[[k, j]]) {
                Ok(law) => law.sample(rng),
                Err(_) => lambda[[k, j]].round(),
            }
        });
    }

    fn parameters(&self) -> Vec<ParameterBlock> {
        vec![ParameterBlock::from_array("lambda", &self.lambda)]
    }
}
