//! Mixture component families for the mixall estimation engine.
//!
//! A component binds one probability family to one data set and exposes the
//! per-sample log-densities and the parameter update used by the EM-family
//! algorithms. The composer only ever sees the [`MixtureComponent`] trait and
//! the closed [`Component`] enum.
//!
//! | Family | Models |
//! |---|---|
//! | Gaussian | `gaussian_sjk`, `gaussian_sk`, `gaussian_sj`, `gaussian_s` |
//! | Gamma | `gamma_{ajk,ak}_{bjk,bk,bj,b}`, `gamma_{aj,a}_{bjk,bk}` |
//! | Poisson | `poisson_ljk`, `poisson_lk`, `poisson_ljlk` |
//! | Categorical | `categorical_pjk`, `categorical_pk` |
//! | Kernel Gaussian | `kernel_gaussian_sk`, `kernel_gaussian_s` |
//!
//! Missing observations are `NaN` in the input array.
//!
//! # Quick start
//!
//! ```rust
//! use mixall_components::{Component, MixtureComponent, ModelName};
//! use ndarray::array;
//!
//! let data = array![[0.1], [0.3], [5.2], [4.9]];
//! let model: ModelName = "gaussian_sk".parse().unwrap();
//! let component = Component::new(model, data, 2).unwrap();
//!
//! assert_eq!(component.n_sample(), 4);
//! assert_eq!(component.n_free_parameters(), 2 + 2);
//! ```

pub mod categorical;
pub mod component;
pub mod data;
pub mod error;
pub mod gamma;
pub mod gaussian;
pub mod kernel;
pub mod model;
pub mod poisson;

pub use categorical::CategoricalComponent;
pub use component::{Component, MixtureComponent, ParameterBlock};
pub use data::DataSet;
pub use error::ComponentError;
pub use gamma::GammaComponent;
pub use gaussian::GaussianComponent;
pub use kernel::{KernelComponent, KernelOptions};
pub use model::{CategoricalModel, ModelName, PoissonModel, Sharing};
pub use poisson::PoissonComponent;
