//! Diagonal Gaussian family (`gaussian_sjk`, `gaussian_sk`, `gaussian_sj`, `gaussian_s`).

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::Rng;
use rand_distr::StandardNormal;
use statrs::consts::LN_SQRT_2PI;

use crate::component::{MixtureComponent, ParameterBlock, draw_cluster, seed_rows};
use crate::data::{DataSet, check_cluster_weights, cluster_weights};
use crate::error::ComponentError;
use crate::model::{ModelName, Sharing};

/// Relative variance floor below which a cluster is declared degenerate.
const VARIANCE_FLOOR: f64 = 1e-20;

/// Gaussian component with per-cluster means and shared or free deviations.
#[derive(Debug, Clone)]
pub struct GaussianComponent {
    data: DataSet,
    sharing: Sharing,
    n_cluster: usize,
    mean: Array2<f64>,
    sigma: Array2<f64>,
}

impl GaussianComponent {
    /// Binds the family to a data set.
    pub fn new(data: DataSet, sharing: Sharing, n_cluster: usize) -> Result<Self, ComponentError> {
        if n_cluster == 0 {
            return Err(ComponentError::InvalidClusterCount { n_cluster });
        }
        let n_variable = data.n_variable();
        let mut component = Self {
            data,
            sharing,
            n_cluster,
            mean: Array2::zeros((n_cluster, n_variable)),
            sigma: Array2::ones((n_cluster, n_variable)),
        };
        component.initialize_missing();
        Ok(component)
    }

    /// Cluster means, `(n_cluster, n_variable)`.
    pub fn mean(&self) -> &Array2<f64> {
        &self.mean
    }

    /// Standard deviations, `(n_cluster, n_variable)` after broadcasting.
    pub fn sigma(&self) -> &Array2<f64> {
        &self.sigma
    }

    /// The current data, with missing entries filled.
    pub fn data(&self) -> &DataSet {
        &self.data
    }

    fn check_variances(&self, var: &Array2<f64>) -> Result<(), ComponentError> {
        for ((k, j), &v) in var.indexed_iter() {
            let mu = self.mean[[k, j]];
            if !v.is_finite() || v <= VARIANCE_FLOOR * (1.0 + mu * mu) {
                return Err(ComponentError::DegenerateParameter {
                    parameter: "variance",
                    cluster: k,
                    value: v,
                });
            }
        }
        Ok(())
    }
}

impl MixtureComponent for GaussianComponent {
    fn model(&self) -> ModelName {
        ModelName::Gaussian {
            sigma: self.sharing,
        }
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
            let sigma = self.sigma[[k, j]];
            let z = (self.data.get(i, j) - self.mean[[k, j]]) / sigma;
            sum -= LN_SQRT_2PI + sigma.ln() + 0.5 * z * z;
        }
        sum
    }

    fn m_step(&mut self, tik: ArrayView2<f64>, tk: ArrayView1<f64>) -> Result<(), ComponentError> {
        check_cluster_weights(tk)?;
        self.mean = self.data.weighted_means(tik, tk);
        let sq_dev = self.data.weighted_sq_dev(tik, &self.mean);
        let var = self
            .sharing
            .pool(&sq_dev, &cluster_weights(tk, self.data.n_variable()));
        self.check_variances(&var)?;
        self.sigma = var.mapv(f64::sqrt);
        Ok(())
    }

    fn random_init<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ComponentError> {
        let rows = seed_rows(self.data.n_sample(), self.n_cluster, rng)?;
        let n_variable = self.data.n_variable();
        for (k, &i) in rows.iter().enumerate() {
            for j in 0..n_variable {
                self.mean[[k, j]] = self.data.get(i, j);
            }
        }

        let sd: Vec<f64> = (0..n_variable)
            .map(|j| mixall_stats::sd(&self.data.values().column(j).to_vec()))
            .collect();
        let var = Array2::from_shape_fn((self.n_cluster, n_variable), |(_, j)| sd[j] * sd[j]);
        let var = self.sharing.pool(&var, &Array2::ones(var.dim()));
        self.check_variances(&var)?;
        self.sigma = var.mapv(f64::sqrt);
        Ok(())
    }

    fn n_free_parameters(&self) -> usize {
        let n_variable = self.data.n_variable();
        self.n_cluster * n_variable + self.sharing.n_free(self.n_cluster, n_variable)
    }

    fn initialize_missing(&mut self) {
        self.data.initialize_missing(mixall_stats::mean);
    }

    fn imputation_step(&mut self, tik: ArrayView2<f64>) {
        let mean = &self.mean;
        self.data.fill_missing(|i, j| {
            (0..mean.nrows()).map(|k| tik[[i, k]] * mean[[k, j]]).sum()
        });
    }

    fn sampling_step<R: Rng + ?Sized>(&mut self, tik: ArrayView2<f64>, rng: &mut R) {
        let (mean, sigma) = (&self.mean, &self.sigma);
        self.data.fill_missing(|i, j| {
            let k = draw_cluster(tik, i, rng);
            let z: f64 = rng.sample(StandardNormal);
            mean[[k, j]] + sigma[[k, j]] * z
        });
    }

    fn parameters(&self) -> Vec<ParameterBlock> {
        vec![
            ParameterBlock::from_array("mean", &self.mean),
            ParameterBlock::from_array("sigma", &self.sigma),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array1, array};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn two_groups() -> DataSet {
        DataSet::new(array![[0.0], [2.0], [10.0], [14.0]]).unwrap()
    }

    fn hard_tik() -> (Array2<f64>, Array1<f64>) {
        (
            array![[1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 1.0]],
            array![2.0, 2.0],
        )
    }

    #[test]
    fn m_step_per_cluster() {
        let mut c = GaussianComponent::new(two_groups(), Sharing::ClusterVariable, 2).unwrap();
        let (tik, tk) = hard_tik();
        c.m_step(tik.view(), tk.view()).unwrap();
        assert_relative_eq!(c.mean()[[0, 0]], 1.0);
        assert_relative_eq!(c.mean()[[1, 0]], 12.0);
        assert_relative_eq!(c.sigma()[[0, 0]], 1.0);
        assert_relative_eq!(c.sigma()[[1, 0]], 2.0);
    }

    #[test]
    fn m_step_pooled() {
        let mut c = GaussianComponent::new(two_groups(), Sharing::Common, 2).unwrap();
        let (tik, tk) = hard_tik();
        c.m_step(tik.view(), tk.view()).unwrap();
        // (1 + 1 + 4 + 4) / 4
        assert_relative_eq!(c.sigma()[[0, 0]], 2.5f64.sqrt());
        assert_relative_eq!(c.sigma()[[1, 0]], 2.5f64.sqrt());
    }

    #[test]
    fn ln_probability_matches_closed_form() {
        let mut c = GaussianComponent::new(two_groups(), Sharing::ClusterVariable, 2).unwrap();
        let (tik, tk) = hard_tik();
        c.m_step(tik.view(), tk.view()).unwrap();
        // x = 0, mean 1, sigma 1
        let expected = -0.5 * (2.0 * std::f64::consts::PI).ln() - 0.5;
        assert_relative_eq!(c.ln_component_probability(0, 0), expected, epsilon = 1e-12);
    }

    #[test]
    fn zero_variance_is_degenerate() {
        let data = DataSet::new(array![[5.0], [5.0], [5.0], [5.0]]).unwrap();
        let mut c = GaussianComponent::new(data, Sharing::ClusterVariable, 2).unwrap();
        let (tik, tk) = hard_tik();
        let err = c.m_step(tik.view(), tk.view()).unwrap_err();
        assert!(matches!(
            err,
            ComponentError::DegenerateParameter {
                parameter: "variance",
                ..
            }
        ));
    }

    #[test]
    fn random_init_uses_distinct_samples() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut c = GaussianComponent::new(two_groups(), Sharing::Cluster, 2).unwrap();
        c.random_init(&mut rng).unwrap();
        assert_ne!(c.mean()[[0, 0]], c.mean()[[1, 0]]);
        assert!(c.sigma().iter().all(|&s| s > 0.0));
    }

    #[test]
    fn free_parameters() {
        let data = DataSet::new(Array2::zeros((5, 3))).unwrap();
        let c = GaussianComponent::new(data.clone(), Sharing::ClusterVariable, 2).unwrap();
        assert_eq!(c.n_free_parameters(), 6 + 6);
        let c = GaussianComponent::new(data, Sharing::Variable, 2).unwrap();
        assert_eq!(c.n_free_parameters(), 6 + 3);
    }

    #[test]
    fn imputation_uses_posterior_mean() {
        let data = DataSet::new(array![[0.0], [2.0], [f64::NAN], [10.0], [14.0]]).unwrap();
        let mut c = GaussianComponent::new(data, Sharing::ClusterVariable, 2).unwrap();
        let tik = array![[1.0, 0.0], [1.0, 0.0], [0.5, 0.5], [0.0, 1.0], [0.0, 1.0]];
        let tk = array![2.5, 2.5];
        c.m_step(tik.view(), tk.view()).unwrap();
        c.imputation_step(tik.view());
        let expected = 0.5 * c.mean()[[0, 0]] + 0.5 * c.mean()[[1, 0]];
        assert_relative_eq!(c.data().get(2, 0), expected, epsilon = 1e-12);
    }
}
