//! Gamma family (`gamma_{ajk,ak}_{bjk,bk,bj,b}`, `gamma_{aj,a}_{bjk,bk}`).
//!
//! Density with shape `a` and scale `b`:
//!
//! ```text
//! ln p(x) = (a - 1) ln x - x / b - ln Γ(a) - a ln b
//! ```
//!
//! The M-step maximises the weighted log-likelihood by coordinate ascent:
//! for a fixed shape the scale has the closed form `b = Σ w x / Σ w a`, and
//! for a fixed scale the shape solves `ψ(a) = Σ w (ln x - ln b) / Σ w`, both
//! pooled over the axes the parameter is shared on.

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::Rng;
use rand_distr::{Distribution, Gamma};
use statrs::function::gamma::ln_gamma;

use crate::component::{MixtureComponent, ParameterBlock, draw_cluster, seed_rows};
use crate::data::{DataSet, check_cluster_weights, cluster_weights};
use crate::error::ComponentError;
use crate::model::{ModelName, Sharing};

const MAX_INNER_ITER: usize = 50;
const INNER_TOLERANCE: f64 = 1e-10;

/// Gamma component.
#[derive(Debug, Clone)]
pub struct GammaComponent {
    data: DataSet,
    shape_sharing: Sharing,
    scale_sharing: Sharing,
    n_cluster: usize,
    shape: Array2<f64>,
    scale: Array2<f64>,
    ln_gamma_shape: Array2<f64>,
}

impl GammaComponent {
    /// Binds the family to a strictly positive data set.
    pub fn new(
        data: DataSet,
        shape_sharing: Sharing,
        scale_sharing: Sharing,
        n_cluster: usize,
    ) -> Result<Self, ComponentError> {
        if n_cluster == 0 {
            return Err(ComponentError::InvalidClusterCount { n_cluster });
        }
        data.check_support(|x| x > 0.0, "must be > 0")?;
        let n_variable = data.n_variable();
        let mut component = Self {
            data,
            shape_sharing,
            scale_sharing,
            n_cluster,
            shape: Array2::ones((n_cluster, n_variable)),
            scale: Array2::ones((n_cluster, n_variable)),
            ln_gamma_shape: Array2::zeros((n_cluster, n_variable)),
        };
        component.initialize_missing();
        Ok(component)
    }

    /// Shape parameters, `(n_cluster, n_variable)` after broadcasting.
    pub fn shape(&self) -> &Array2<f64> {
        &self.shape
    }

    /// Scale parameters, `(n_cluster, n_variable)` after broadcasting.
    pub fn scale(&self) -> &Array2<f64> {
        &self.scale
    }

    fn scale_update(&self, sum_x: &Array2<f64>, weights: &Array2<f64>, shape: &Array2<f64>) -> Array2<f64> {
        self.scale_sharing.pool(sum_x, &(weights * shape))
    }

    fn shape_update(&self, sum_ln_x: &Array2<f64>, weights: &Array2<f64>, scale: &Array2<f64>) -> Array2<f64> {
        let target = self
            .shape_sharing
            .pool(&(sum_ln_x - &(weights * &scale.mapv(f64::ln))), weights);
        target.mapv(mixall_stats::inverse_digamma)
    }

    fn set_parameters(&mut self, shape: Array2<f64>, scale: Array2<f64>) -> Result<(), ComponentError> {
        check_positive(&shape, "shape")?;
        check_positive(&scale, "scale")?;
        self.ln_gamma_shape = shape.mapv(ln_gamma);
        self.shape = shape;
        self.scale = scale;
        Ok(())
    }
}

fn check_positive(values: &Array2<f64>, parameter: &'static str) -> Result<(), ComponentError> {
    for ((k, _), &value) in values.indexed_iter() {
        if !(value.is_finite() && value > 0.0) {
            return Err(ComponentError::DegenerateParameter {
                parameter,
                cluster: k,
                value,
            });
        }
    }
    Ok(())
}

impl MixtureComponent for GammaComponent {
    fn model(&self) -> ModelName {
        ModelName::Gamma {
            shape: self.shape_sharing,
            scale: self.scale_sharing,
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
            let x = self.data.get(i, j);
            let a = self.shape[[k, j]];
            let b = self.scale[[k, j]];
            sum += (a - 1.0) * x.ln() - x / b - self.ln_gamma_shape[[k, j]] - a * b.ln();
        }
        sum
    }

    fn m_step(&mut self, tik: ArrayView2<f64>, tk: ArrayView1<f64>) -> Result<(), ComponentError> {
        check_cluster_weights(tk)?;
        let weights = cluster_weights(tk, self.data.n_variable());
        let sum_x = self.data.weighted_sums(tik);
        let sum_ln_x = self.data.weighted_sums_of(tik, f64::ln);

        // Method-of-moments start.
        let mean = &sum_x / &weights;
        let var = self.data.weighted_sq_dev(tik, &mean) / &weights;
        check_positive(&var, "variance")?;
        let moments = (&mean * &mean) / &var;
        let mut shape = self.shape_sharing.pool(&(&weights * &moments), &weights);
        check_positive(&shape, "shape")?;
        let mut scale = self.scale_update(&sum_x, &weights, &shape);

        for _ in 0..MAX_INNER_ITER {
            let next_shape = self.shape_update(&sum_ln_x, &weights, &scale);
            check_positive(&next_shape, "shape")?;
            let change = (&next_shape - &shape)
                .iter()
                .zip(shape.iter())
                .map(|(d, a)| (d / a).abs())
                .fold(0.0, f64::max);
            shape = next_shape;
            scale = self.scale_update(&sum_x, &weights, &shape);
            if change < INNER_TOLERANCE {
                break;
            }
        }

        self.set_parameters(shape, scale)
    }

    fn random_init<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ComponentError> {
        let rows = seed_rows(self.data.n_sample(), self.n_cluster, rng)?;
        let n_variable = self.data.n_variable();
        let dims = (self.n_cluster, n_variable);

        let column_shape: Vec<f64> = (0..n_variable)
            .map(|j| {
                let column = self.data.values().column(j).to_vec();
                let m = mixall_stats::mean(&column);
                m * m / mixall_stats::variance(&column)
            })
            .collect();
        let ones = Array2::ones(dims);
        let shape = self
            .shape_sharing
            .pool(&Array2::from_shape_fn(dims, |(_, j)| column_shape[j]), &ones);
        // Each cluster is centred on a random sample: a * b = x.
        let centers = Array2::from_shape_fn(dims, |(k, j)| self.data.get(rows[k], j));
        let scale = self.scale_sharing.pool(&(&centers / &shape), &ones);
        self.set_parameters(shape, scale)
    }

    fn n_free_parameters(&self) -> usize {
        let n_variable = self.data.n_variable();
        self.shape_sharing.n_free(self.n_cluster, n_variable)
            + self.scale_sharing.n_free(self.n_cluster, n_variable)
    }

    fn initialize_missing(&mut self) {
        self.data.initialize_missing(mixall_stats::mean);
    }

    fn imputation_step(&mut self, tik: ArrayView2<f64>) {
        let (shape, scale) = (&self.shape, &self.scale);
        self.data.fill_missing(|i, j| {
            (0..shape.nrows())
                .map(|k| tik[[i, k]] * shape[[k, j]] * scale[[k, j]])
                .sum()
        });
    }

    fn sampling_step<R: Rng + ?Sized>(&mut self, tik: ArrayView2<f64>, rng: &mut R) {
        let (shape, scale) = (&self.shape, &self.scale);
        self.data.fill_missing(|i, j| {
            let k = draw_cluster(tik, i, rng);
            let (a, b) = (shape[[k, j]], scale[[k, j]]);
            match Gamma::new(a, b) {
                Ok(law) => law.sample(rng).max(f64::MIN_POSITIVE),
                Err(_) => a * b,
            }
        });
    }

    fn parameters(&self) -> Vec<ParameterBlock> {
        vec![
            ParameterBlock::from_array("shape", &self.shape),
            ParameterBlock::from_array("scale", &self.scale),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array1, Array2};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample(shape: f64, scale: f64, n: usize, rng: &mut StdRng) -> Vec<f64> {
        let law = Gamma::new(shape, scale).unwrap();
        (0..n).map(|_| law.sample(rng)).collect()
    }

    #[test]
    fn recovers_parameters_of_two_clusters() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut values = sample(2.0, 1.0, 2000, &mut rng);
        values.extend(sample(9.0, 3.0, 2000, &mut rng));
        let data = DataSet::new(Array2::from_shape_vec((4000, 1), values).unwrap()).unwrap();
        let tik = Array2::from_shape_fn((4000, 2), |(i, k)| if (i < 2000) == (k == 0) { 1.0 } else { 0.0 });
        let tk = Array1::from(vec![2000.0, 2000.0]);

        let mut c = GammaComponent::new(data, Sharing::ClusterVariable, Sharing::ClusterVariable, 2).unwrap();
        c.m_step(tik.view(), tk.view()).unwrap();
        assert_relative_eq!(c.shape()[[0, 0]], 2.0, max_relative = 0.1);
        assert_relative_eq!(c.scale()[[0, 0]], 1.0, max_relative = 0.1);
        assert_relative_eq!(c.shape()[[1, 0]], 9.0, max_relative = 0.1);
        assert_relative_eq!(c.scale()[[1, 0]], 3.0, max_relative = 0.1);
    }

    #[test]
    fn shared_shape_is_broadcast() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut values = sample(3.0, 1.0, 500, &mut rng);
        values.extend(sample(3.0, 4.0, 500, &mut rng));
        let data = DataSet::new(Array2::from_shape_vec((1000, 1), values).unwrap()).unwrap();
        let tik = Array2::from_shape_fn((1000, 2), |(i, k)| if (i < 500) == (k == 0) { 1.0 } else { 0.0 });
        let tk = Array1::from(vec![500.0, 500.0]);

        let mut c = GammaComponent::new(data, Sharing::Common, Sharing::Cluster, 2).unwrap();
        c.m_step(tik.view(), tk.view()).unwrap();
        assert_eq!(c.shape()[[0, 0]], c.shape()[[1, 0]]);
        assert!(c.scale()[[1, 0]] > 2.0 * c.scale()[[0, 0]]);
        assert_eq!(c.n_free_parameters(), 1 + 2);
    }

    #[test]
    fn rejects_non_positive_data() {
        let data = DataSet::new(ndarray::array![[1.0], [0.0]]).unwrap();
        let err = GammaComponent::new(data, Sharing::Cluster, Sharing::Cluster, 1).unwrap_err();
        assert!(matches!(err, ComponentError::OutOfSupport { row: 1, .. }));
    }

    #[test]
    fn random_init_gives_positive_parameters() {
        let mut rng = StdRng::seed_from_u64(2);
        let values = sample(2.0, 2.0, 50, &mut rng);
        let data = DataSet::new(Array2::from_shape_vec((25, 2), values).unwrap()).unwrap();
        let mut c = GammaComponent::new(data, Sharing::Cluster, Sharing::ClusterVariable, 3).unwrap();
        c.random_init(&mut rng).unwrap();
        assert!(c.shape().iter().all(|&a| a > 0.0));
        assert!(c.scale().iter().all(|&b| b > 0.0));
        assert!(c.ln_component_probability(0, 0).is_finite());
    }
}
