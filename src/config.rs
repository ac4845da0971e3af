use std::path::PathBuf;

use serde::Deserialize;

/// Top-level MixAll configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MixallConfig {
    /// Global RNG seed.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Selection criterion: `bic`, `aic` or `icl`.
    #[serde(default = "default_criterion")]
    pub criterion: String,

    /// Cluster counts to estimate.
    #[serde(default = "default_clusters")]
    pub clusters: Vec<usize>,

    /// JSON report path.
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// One block per data set, all over the same samples.
    #[serde(rename = "component")]
    pub components: Vec<ComponentToml>,

    /// Estimation strategy.
    #[serde(default)]
    pub strategy: StrategyToml,
}

fn default_criterion() -> String {
    "bic".to_string()
}
fn default_clusters() -> Vec<usize> {
    vec![2]
}

/// A data file bound to one model.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentToml {
    pub path: PathBuf,
    pub model: String,
    #[serde(default)]
    pub header: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Kernel models only.
    #[serde(default)]
    pub bandwidth: Option<f64>,
    /// Kernel models only.
    #[serde(default)]
    pub dim: Option<usize>,
}

fn default_delimiter() -> String {
    "auto".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyToml {
    #[serde(default = "default_strategy_kind")]
    pub kind: String,
    #[serde(default = "default_n_try")]
    pub n_try: usize,
    #[serde(default = "default_n_short_run")]
    pub n_short_run: usize,
    #[serde(default)]
    pub init: InitToml,
    #[serde(default)]
    pub short_run: AlgoToml,
    #[serde(default)]
    pub long_run: AlgoToml,
}

impl Default for StrategyToml {
    fn default() -> Self {
        Self {
            kind: default_strategy_kind(),
            n_try: default_n_try(),
            n_short_run: default_n_short_run(),
            init: InitToml::default(),
            short_run: AlgoToml::default(),
            long_run: AlgoToml::default(),
        }
    }
}

fn default_strategy_kind() -> String {
    "full".to_string()
}
fn default_n_try() -> usize {
    1
}
fn default_n_short_run() -> usize {
    5
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitToml {
    #[serde(default = "default_init_method")]
    pub method: String,
    #[serde(default = "default_n_init_run")]
    pub n_init_run: usize,
    #[serde(default)]
    pub algo: Option<String>,
    #[serde(default)]
    pub n_iter: Option<usize>,
    #[serde(default)]
    pub epsilon: Option<f64>,
}

impl Default for InitToml {
    fn default() -> Self {
        Self {
            method: default_init_method(),
            n_init_run: default_n_init_run(),
            algo: None,
            n_iter: None,
            epsilon: None,
        }
    }
}

fn default_init_method() -> String {
    "class".to_string()
}
fn default_n_init_run() -> usize {
    5
}

/// Algorithm overrides. Unset fields keep the default of the run they
/// configure (init, short or long).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AlgoToml {
    #[serde(default)]
    pub algo: Option<String>,
    #[serde(default)]
    pub n_iter: Option<usize>,
    #[serde(default)]
    pub epsilon: Option<f64>,
}
