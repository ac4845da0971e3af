//! Categorical family (`categorical_pjk`, `categorical_pk`).
//!
//! Values are integer codes. The modalities of each variable are the sorted
//! distinct observed codes; the probability table of variable `j` is
//! `(n_cluster, n_modality_j)`.

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::Rng;
use rand_distr::{Distribution, Exp1};

use crate::component::{MixtureComponent, ParameterBlock, draw_cluster};
use crate::data::{DataSet, check_cluster_weights};
use crate::error::ComponentError;
use crate::model::{CategoricalModel, ModelName};

/// Categorical component.
#[derive(Debug, Clone)]
pub struct CategoricalComponent {
    data: DataSet,
    structure: CategoricalModel,
    n_cluster: usize,
    modalities: Vec<Vec<f64>>,
    codes: Array2<usize>,
    /// One table per variable for `pjk`, a single shared table for `pk`.
    tables: Vec<Array2<f64>>,
}

impl CategoricalComponent {
    /// Binds the family to an integer-coded data set.
    ///
    /// # Errors
    ///
    /// Besides the data checks, `pk` fails with
    /// [`ComponentError::IncompatibleModalities`] unless every variable
    /// has the same set of observed modalities.
    pub fn new(data: DataSet, structure: CategoricalModel, n_cluster: usize) -> Result<Self, ComponentError> {
        if n_cluster == 0 {
            return Err(ComponentError::InvalidClusterCount { n_cluster });
        }
        data.check_support(|x| x.fract() == 0.0, "must be an integer code")?;

        let n_variable = data.n_variable();
        let modalities: Vec<Vec<f64>> = (0..n_variable)
            .map(|j| {
                let mut levels = data.observed_column(j);
                levels.sort_by(|a, b| a.total_cmp(b));
                levels.dedup();
                levels
            })
            .collect();

        let tables = match structure {
            CategoricalModel::Pjk => modalities
                .iter()
                .map(|levels| uniform_table(n_cluster, levels.len()))
                .collect(),
            CategoricalModel::Pk => {
                if let Some(j) = modalities.iter().position(|m| m != &modalities[0]) {
                    return Err(ComponentError::IncompatibleModalities {
                        reason: format!("variable {j} does not share the modalities of variable 0"),
                    });
                }
                vec![uniform_table(n_cluster, modalities[0].len())]
            }
        };

        let mut component = Self {
            codes: Array2::zeros(data.values().dim()),
            data,
            structure,
            n_cluster,
            modalities,
            tables,
        };
        component.initialize_missing();
        Ok(component)
    }

    /// Sorted modality values of variable `j`.
    pub fn modalities(&self, j: usize) -> &[f64] {
        &self.modalities[j]
    }

    /// Probability table used by variable `j`, `(n_cluster, n_modality)`.
    pub fn table(&self, j: usize) -> &Array2<f64> {
        match self.structure {
            CategoricalModel::Pjk => &self.tables[j],
            CategoricalModel::Pk => &self.tables[0],
        }
    }

    fn refresh_codes(&mut self) {
        for ((i, j), code) in self.codes.indexed_iter_mut() {
            let x = self.data.get(i, j);
            let levels = &self.modalities[j];
            *code = levels
                .binary_search_by(|m| m.total_cmp(&x))
                .unwrap_or_else(|pos| pos.min(levels.len() - 1));
        }
    }

    /// Weighted modality counts `(n_cluster, n_modality)` for variable `j`.
    fn counts(&self, tik: ArrayView2<f64>, j: usize) -> Array2<f64> {
        let mut counts = Array2::zeros((self.n_cluster, self.modalities[j].len()));
        for i in 0..self.data.n_sample() {
            let l = self.codes[[i, j]];
            for k in 0..self.n_cluster {
                counts[[k, l]] += tik[[i, k]];
            }
        }
        counts
    }

    /// Modality value maximising `Σ_k w_k p_kj(l)`.
    fn most_probable(&self, weights: ArrayView1<f64>, j: usize) -> f64 {
        let table = self.table(j);
        let scores: Vec<f64> = (0..table.ncols())
            .map(|l| weights.iter().zip(table.column(l)).map(|(w, p)| w * p).sum::<f64>())
            .collect();
        self.modalities[j][mixall_stats::argmax(&scores)]
    }
}

fn uniform_table(n_cluster: usize, n_modality: usize) -> Array2<f64> {
    Array2::from_elem((n_cluster, n_modality), 1.0 / n_modality as f64)
}

fn check_table(table: &Array2<f64>) -> Result<(), ComponentError> {
    for ((k, _), &value) in table.indexed_iter() {
        if !value.is_finite() {
            return Err(ComponentError::DegenerateParameter {
                parameter: "probability",
                cluster: k,
                value,
            });
        }
    }
    Ok(())
}

impl MixtureComponent for CategoricalComponent {
    fn model(&self) -> ModelName {
        ModelName::Categorical(self.structure)
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
        (0..self.data.n_variable())
            .map(|j| self.table(j)[[k, self.codes[[i, j]]]].ln())
            .sum()
    }

    fn m_step(&mut self, tik: ArrayView2<f64>, tk: ArrayView1<f64>) -> Result<(), ComponentError> {
        check_cluster_weights(tk)?;
        let n_variable = self.data.n_variable();
        let tables: Vec<Array2<f64>> = match self.structure {
            CategoricalModel::Pjk => (0..n_variable)
                .map(|j| {
                    let mut counts = self.counts(tik, j);
                    for (mut row, &t) in counts.rows_mut().into_iter().zip(tk.iter()) {
                        row /= t;
                    }
                    counts
                })
                .collect(),
            CategoricalModel::Pk => {
                let mut counts = (1..n_variable).fold(self.counts(tik, 0), |acc, j| acc + self.counts(tik, j));
                for (mut row, &t) in counts.rows_mut().into_iter().zip(tk.iter()) {
                    row /= t * n_variable as f64;
                }
                vec![counts]
            }
        };
        for table in &tables {
            check_table(table)?;
        }
        self.tables = tables;
        Ok(())
    }

    fn random_init<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ComponentError> {
        // Rows of normalised exponential draws are Dirichlet(1, ..., 1).
        for table in &mut self.tables {
            for mut row in table.rows_mut() {
                row.mapv_inplace(|_| Exp1.sample(rng));
                let total = row.sum();
                row /= total;
            }
        }
        Ok(())
    }

    fn n_free_parameters(&self) -> usize {
        match self.structure {
            CategoricalModel::Pjk => self
                .modalities
                .iter()
                .map(|m| self.n_cluster * (m.len() - 1))
                .sum(),
            CategoricalModel::Pk => self.n_cluster * (self.modalities[0].len() - 1),
        }
    }

    fn initialize_missing(&mut self) {
        self.data
            .initialize_missing(|column| mixall_stats::mode(column).unwrap_or(0.0));
        self.refresh_codes();
    }

    fn imputation_step(&mut self, tik: ArrayView2<f64>) {
        if !self.data.has_missing() {
            return;
        }
        let filled: Vec<f64> = self
            .data
            .missing()
            .iter()
            .map(|&(i, j)| self.most_probable(tik.row(i), j))
            .collect();
        let mut values = filled.into_iter();
        self.data.fill_missing(|_, _| values.next().unwrap_or(0.0));
        self.refresh_codes();
    }

    fn sampling_step<R: Rng + ?Sized>(&mut self, tik: ArrayView2<f64>, rng: &mut R) {
        if !self.data.has_missing() {
            return;
        }
        let drawn: Vec<f64> = self
            .data
            .missing()
            .iter()
            .map(|&(i, j)| {
                let k = draw_cluster(tik, i, rng);
                let l = mixall_stats::sample_index(&self.table(j).row(k).to_vec(), rng);
                self.modalities[j][l]
            })
            .collect();
        let mut values = drawn.into_iter();
        self.data.fill_missing(|_, _| values.next().unwrap_or(0.0));
        self.refresh_codes();
    }

    fn parameters(&self) -> Vec<ParameterBlock> {
        match self.structure {
            CategoricalModel::Pjk => self
                .tables
                .iter()
                .enumerate()
                .map(|(j, t)| ParameterBlock::from_array(&format!("probability[{j}]"), t))
                .collect(),
            CategoricalModel::Pk => vec![ParameterBlock::from_array("probability", &self.tables[0])],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn pjk_m_step_counts_modalities() {
        let data = DataSet::new(array![[1.0], [1.0], [2.0], [3.0], [3.0], [3.0]]).unwrap();
        let mut c = CategoricalComponent::new(data, CategoricalModel::Pjk, 2).unwrap();
        let tik = array![[1.0, 0.0], [1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 1.0], [0.0, 1.0]];
        let tk = array![3.0, 3.0];
        c.m_step(tik.view(), tk.view()).unwrap();
        assert_eq!(c.modalities(0), &[1.0, 2.0, 3.0]);
        assert_relative_eq!(c.table(0)[[0, 0]], 2.0 / 3.0);
        assert_relative_eq!(c.table(0)[[0, 1]], 1.0 / 3.0);
        assert_relative_eq!(c.table(0)[[1, 2]], 1.0);
        assert_eq!(c.ln_component_probability(0, 1), f64::NEG_INFINITY);
        assert_eq!(c.n_free_parameters(), 2 * 2);
    }

    #[test]
    fn pk_pools_variables() {
        let data = DataSet::new(array![[0.0, 1.0], [1.0, 1.0]]).unwrap();
        let mut c = CategoricalComponent::new(data, CategoricalModel::Pk, 1).unwrap();
        let tik = array![[1.0], [1.0]];
        let tk = array![2.0];
        c.m_step(tik.view(), tk.view()).unwrap();
        assert_relative_eq!(c.table(0)[[0, 0]], 0.25);
        assert_relative_eq!(c.table(1)[[0, 1]], 0.75);
    }

    #[test]
    fn pk_requires_common_modalities() {
        let data = DataSet::new(array![[0.0, 1.0], [1.0, 2.0]]).unwrap();
        let err = CategoricalComponent::new(data, CategoricalModel::Pk, 1).unwrap_err();
        assert!(matches!(err, ComponentError::IncompatibleModalities { .. }));
    }

    #[test]
    fn random_init_rows_sum_to_one() {
        let data = DataSet::new(array![[0.0], [1.0], [2.0], [1.0]]).unwrap();
        let mut c = CategoricalComponent::new(data, CategoricalModel::Pjk, 3).unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        c.random_init(&mut rng).unwrap();
        for row in c.table(0).rows() {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn missing_values_use_mode_then_posterior() {
        let data = DataSet::new(array![[4.0], [4.0], [7.0], [7.0], [7.0], [f64::NAN]]).unwrap();
        let mut c = CategoricalComponent::new(data, CategoricalModel::Pjk, 2).unwrap();
        assert_eq!(c.data.get(5, 0), 7.0);

        let tik = array![[1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]];
        let tk = array![3.0, 3.0];
        c.m_step(tik.view(), tk.view()).unwrap();
        c.imputation_step(tik.view());
        assert_eq!(c.data.get(5, 0), 7.0);

        let tik = array![[1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 1.0], [1.0, 0.0], [1.0, 0.0]];
        c.imputation_step(tik.view());
        // Cluster 0 holds two 4s and one 7.
        assert_eq!(c.data.get(5, 0), 4.0);
    }
}
