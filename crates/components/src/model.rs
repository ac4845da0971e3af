//! Model names and parameter-sharing structures.
//!
//! Every family is identified by a string such as `gaussian_sjk` or
//! `gamma_ak_bj`. The suffix letters say over which axes a parameter is
//! allowed to vary: `j` for variables, `k` for clusters.

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use serde::Serialize;

use crate::error::ComponentError;

/// How a parameter is shared across clusters and variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sharing {
    /// One value per (cluster, variable) pair (`jk`).
    ClusterVariable,
    /// One value per cluster, shared by all variables (`k`).
    Cluster,
    /// One value per variable, shared by all clusters (`j`).
    Variable,
    /// A single value (no suffix).
    Common,
}

impl Sharing {
    /// Returns `true` if the parameter may differ between clusters.
    pub fn varies_by_cluster(self) -> bool {
        matches!(self, Self::ClusterVariable | Self::Cluster)
    }

    /// Number of free values for `n_cluster` clusters and `n_variable` variables.
    pub fn n_free(self, n_cluster: usize, n_variable: usize) -> usize {
        match self {
            Self::ClusterVariable => n_cluster * n_variable,
            Self::Cluster => n_cluster,
            Self::Variable => n_variable,
            Self::Common => 1,
        }
    }

    /// Pools the ratio `num / den` over the shared axes.
    ///
    /// Both arrays are `(n_cluster, n_variable)`. Numerators and
    /// denominators are summed over every axis the parameter does not vary
    /// on, and the ratio is broadcast back to the full shape.
    pub fn pool(self, num: &Array2<f64>, den: &Array2<f64>) -> Array2<f64> {
        let (n_cluster, n_variable) = num.dim();
        match self {
            Self::ClusterVariable => num / den,
            Self::Cluster => {
                let ratios: Vec<f64> = (0..n_cluster)
                    .map(|k| num.row(k).sum() / den.row(k).sum())
                    .collect();
                Array2::from_shape_fn((n_cluster, n_variable), |(k, _)| ratios[k])
            }
            Self::Variable => {
                let ratios: Vec<f64> = (0..n_variable)
                    .map(|j| num.column(j).sum() / den.column(j).sum())
                    .collect();
                Array2::from_shape_fn((n_cluster, n_variable), |(_, j)| ratios[j])
            }
            Self::Common => {
                let ratio = num.sum() / den.sum();
                Array2::from_elem((n_cluster, n_variable), ratio)
            }
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::ClusterVariable => "jk",
            Self::Cluster => "k",
            Self::Variable => "j",
            Self::Common => "",
        }
    }

    fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "jk" => Some(Self::ClusterVariable),
            "k" => Some(Self::Cluster),
            "j" => Some(Self::Variable),
            "" => Some(Self::Common),
            _ => None,
        }
    }
}

/// Rate structure of the Poisson family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoissonModel {
    /// One rate per (cluster, variable).
    Ljk,
    /// One rate per cluster.
    Lk,
    /// Rate factored as `l_j * l_k`.
    LjLk,
}

/// Probability structure of the categorical family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalModel {
    /// One probability table per (cluster, variable).
    Pjk,
    /// One probability table per cluster, shared by all variables.
    Pk,
}

/// Identifies a mixture family and its parameter structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelName {
    /// Diagonal Gaussian with the given standard-deviation sharing.
    Gaussian {
        /// Sharing of the standard deviations.
        sigma: Sharing,
    },
    /// Gamma with shape `a` and scale `b`.
    Gamma {
        /// Sharing of the shape parameters.
        shape: Sharing,
        /// Sharing of the scale parameters.
        scale: Sharing,
    },
    /// Poisson counts.
    Poisson(PoissonModel),
    /// Integer-coded categorical data.
    Categorical(CategoricalModel),
    /// Gaussian model in the feature space of an RBF kernel.
    KernelGaussian {
        /// Sharing of the feature-space variance (`Cluster` or `Common`).
        sigma: Sharing,
    },
}

impl ModelName {
    /// Every supported model, in a stable order.
    pub fn all() -> Vec<ModelName> {
        let mut out = Vec::new();
        for sigma in [
            Sharing::ClusterVariable,
            Sharing::Cluster,
            Sharing::Variable,
            Sharing::Common,
        ] {
            out.push(Self::Gaussian { sigma });
        }
        for shape in [Sharing::ClusterVariable, Sharing::Cluster] {
            for scale in [
                Sharing::ClusterVariable,
                Sharing::Cluster,
                Sharing::Variable,
                Sharing::Common,
            ] {
                out.push(Self::Gamma { shape, scale });
            }
        }
        for shape in [Sharing::Variable, Sharing::Common] {
            for scale in [Sharing::ClusterVariable, Sharing::Cluster] {
                out.push(Self::Gamma { shape, scale });
            }
        }
        out.extend([
            Self::Poisson(PoissonModel::Ljk),
            Self::Poisson(PoissonModel::Lk),
            Self::Poisson(PoissonModel::LjLk),
            Self::Categorical(CategoricalModel::Pjk),
            Self::Categorical(CategoricalModel::Pk),
            Self::KernelGaussian {
                sigma: Sharing::Cluster,
            },
            Self::KernelGaussian {
                sigma: Sharing::Common,
            },
        ]);
        out
    }

    /// Returns `true` if the family accepts missing values.
    pub fn supports_missing(self) -> bool {
        !matches!(self, Self::KernelGaussian { .. })
    }

    fn is_valid(self) -> bool {
        match self {
            Self::Gamma { shape, scale } => shape.varies_by_cluster() || scale.varies_by_cluster(),
            Self::KernelGaussian { sigma } => matches!(sigma, Sharing::Cluster | Sharing::Common),
            _ => true,
        }
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gaussian { sigma } => write!(f, "gaussian_s{}", sigma.suffix()),
            Self::Gamma { shape, scale } => {
                write!(f, "gamma_a{}_b{}", shape.suffix(), scale.suffix())
            }
            Self::Poisson(PoissonModel::Ljk) => f.write_str("poisson_ljk"),
            Self::Poisson(PoissonModel::Lk) => f.write_str("poisson_lk"),
            Self::Poisson(PoissonModel::LjLk) => f.write_str("poisson_ljlk"),
            Self::Categorical(CategoricalModel::Pjk) => f.write_str("categorical_pjk"),
            Self::Categorical(CategoricalModel::Pk) => f.write_str("categorical_pk"),
            Self::KernelGaussian { sigma } => write!(f, "kernel_gaussian_s{}", sigma.suffix()),
        }
    }
}

impl FromStr for ModelName {
    type Err = ComponentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let unknown = || ComponentError::UnknownModel {
            name: s.to_string(),
        };

        let parsed = if let Some(rest) = lower.strip_prefix("kernel_gaussian_s") {
            Self::KernelGaussian {
                sigma: Sharing::from_suffix(rest).ok_or_else(unknown)?,
            }
        } else if let Some(rest) = lower.strip_prefix("gaussian_s") {
            Self::Gaussian {
                sigma: Sharing::from_suffix(rest).ok_or_else(unknown)?,
            }
        } else if let Some(rest) = lower.strip_prefix("gamma_a") {
            let (shape, scale) = rest.split_once("_b").ok_or_else(unknown)?;
            Self::Gamma {
                shape: Sharing::from_suffix(shape).ok_or_else(unknown)?,
                scale: Sharing::from_suffix(scale).ok_or_else(unknown)?,
            }
        } else {
            match lower.as_str() {
                "poisson_ljk" => Self::Poisson(PoissonModel::Ljk),
                "poisson_lk" => Self::Poisson(PoissonModel::Lk),
                "poisson_ljlk" => Self::Poisson(PoissonModel::LjLk),
                "categorical_pjk" => Self::Categorical(CategoricalModel::Pjk),
                "categorical_pk" => Self::Categorical(CategoricalModel::Pk),
                _ => return Err(unknown()),
            }
        };

        if parsed.is_valid() {
            Ok(parsed)
        } else {
            Err(unknown())
        }
    }
}

impl Serialize for ModelName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
