//! Configuration of algorithms, initializers and strategies.

use std::fmt;
use std::str::FromStr;

use crate::error::EstimationError;

/// The EM-family algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgoKind {
    /// Expectation-Maximization.
    Em,
    /// Classification EM.
    Cem,
    /// Stochastic EM.
    Sem,
    /// Stochastic EM that only samples missing values.
    SemiSem,
}

impl fmt::Display for AlgoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Em => "EM",
            Self::Cem => "CEM",
            Self::Sem => "SEM",
            Self::SemiSem => "SemiSEM",
        })
    }
}

impl FromStr for AlgoKind {
    type Err = EstimationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "em" => Ok(Self::Em),
            "cem" => Ok(Self::Cem),
            "sem" => Ok(Self::Sem),
            "semisem" | "semi_sem" | "semi-sem" => Ok(Self::SemiSem),
            _ => Err(EstimationError::InvalidConfig {
                reason: format!("unknown algorithm {s:?} (expected em, cem, sem or semisem)"),
            }),
        }
    }
}

/// One algorithm run: kind, iteration cap and convergence tolerance.
///
/// # Example
///
/// ```
/// use mixall_estimation::{AlgoConfig, AlgoKind};
///
/// let config = AlgoConfig::new(AlgoKind::Em)
///     .with_n_iter_max(200)
///     .with_epsilon(1e-6);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlgoConfig {
    kind: AlgoKind,
    n_iter_max: usize,
    epsilon: f64,
}

impl AlgoConfig {
    /// Creates a configuration with `n_iter_max = 200` and `epsilon = 1e-8`.
    pub fn new(kind: AlgoKind) -> Self {
        Self {
            kind,
            n_iter_max: 200,
            epsilon: 1e-8,
        }
    }

    /// Sets the algorithm kind.
    pub fn with_kind(mut self, kind: AlgoKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the maximum number of iterations.
    pub fn with_n_iter_max(mut self, n_iter_max: usize) -> Self {
        self.n_iter_max = n_iter_max;
        self
    }

    /// Sets the likelihood-change tolerance.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    // --- Accessors ---

    /// Returns the algorithm kind.
    pub fn kind(&self) -> AlgoKind {
        self.kind
    }

    /// Returns the maximum number of iterations.
    pub fn n_iter_max(&self) -> usize {
        self.n_iter_max
    }

    /// Returns the likelihood-change tolerance.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Validates this configuration: at least one iteration and a finite,
    /// non-negative tolerance.
    pub fn validate(&self) -> Result<(), EstimationError> {
        if self.n_iter_max == 0 {
            return Err(EstimationError::InvalidConfig {
                reason: format!("{}: n_iter_max must be >= 1", self.kind),
            });
        }
        self.validate_epsilon()
    }

    fn validate_epsilon(&self) -> Result<(), EstimationError> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(EstimationError::InvalidConfig {
                reason: format!(
                    "{}: epsilon must be finite and non-negative, got {}",
                    self.kind, self.epsilon
                ),
            });
        }
        Ok(())
    }
}

impl Default for AlgoConfig {
    fn default() -> Self {
        Self::new(AlgoKind::Em)
    }
}

/// How the initial parameter set is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitMethod {
    /// Random parameters drawn by every component.
    RandomParams,
    /// Random hard labels drawn from the proportions.
    RandomClass,
    /// Random soft responsibilities.
    RandomFuzzy,
}

impl fmt::Display for InitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RandomParams => "random_params",
            Self::RandomClass => "random_class",
            Self::RandomFuzzy => "random_fuzzy",
        })
    }
}

impl FromStr for InitMethod {
    type Err = EstimationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random_params" | "params" => Ok(Self::RandomParams),
            "random_class" | "class" => Ok(Self::RandomClass),
            "random_fuzzy" | "fuzzy" => Ok(Self::RandomFuzzy),
            _ => Err(EstimationError::InvalidConfig {
                reason: format!("unknown init method {s:?} (expected params, class or fuzzy)"),
            }),
        }
    }
}

/// Initialization: draw method, number of attempts kept by the full
/// strategy, and the short algorithm run right after the draw.
///
/// An init algorithm with `n_iter_max == 0` is skipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitConfig {
    method: InitMethod,
    n_init_run: usize,
    algo: AlgoConfig,
}

impl InitConfig {
    /// Creates the default initialization: random classes, 5 attempts, then
    /// 20 SEM iterations with `epsilon = 0.01`.
    pub fn new() -> Self {
        Self {
            method: InitMethod::RandomClass,
            n_init_run: 5,
            algo: AlgoConfig::new(AlgoKind::Sem)
                .with_n_iter_max(20)
                .with_epsilon(0.01),
        }
    }

    /// Sets the draw method.
    pub fn with_method(mut self, method: InitMethod) -> Self {
        self.method = method;
        self
    }

    /// Sets the number of initialization attempts.
    pub fn with_n_init_run(mut self, n_init_run: usize) -> Self {
        self.n_init_run = n_init_run;
        self
    }

    /// Sets the algorithm run after the draw.
    pub fn with_algo(mut self, algo: AlgoConfig) -> Self {
        self.algo = algo;
        self
    }

    // --- Accessors ---

    /// Returns the draw method.
    pub fn method(&self) -> InitMethod {
        self.method
    }

    /// Returns the number of initialization attempts.
    pub fn n_init_run(&self) -> usize {
        self.n_init_run
    }

    /// Returns the algorithm run after the draw.
    pub fn algo(&self) -> &AlgoConfig {
        &self.algo
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), EstimationError> {
        if self.n_init_run == 0 {
            return Err(EstimationError::InvalidConfig {
                reason: "n_init_run must be >= 1".to_string(),
            });
        }
        self.algo.validate_epsilon()
    }
}

impl Default for InitConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The multi-try strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Init + long run per try, best kept.
    Simple,
    /// Several init + short runs, best refined by a long run.
    Xem,
    /// Like `Xem`, with the best of several inits seeding each short run.
    Full,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Simple => "simple",
            Self::Xem => "xem",
            Self::Full => "full",
        })
    }
}

impl FromStr for StrategyKind {
    type Err = EstimationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "xem" => Ok(Self::Xem),
            "full" => Ok(Self::Full),
            _ => Err(EstimationError::InvalidConfig {
                reason: format!("unknown strategy {s:?} (expected simple, xem or full)"),
            }),
        }
    }
}

/// Configuration of an estimation strategy.
///
/// Defaults follow the usual MixAll settings: full strategy, 1 try,
/// 5 init runs (random classes + 20 SEM iterations), 5 short runs of
/// 100 EM iterations (`1e-4`) and a long run of 1000 EM iterations (`1e-7`).
///
/// # Example
///
/// ```
/// use mixall_estimation::{AlgoConfig, AlgoKind, StrategyConfig, StrategyKind};
///
/// let config = StrategyConfig::new()
///     .with_kind(StrategyKind::Xem)
///     .with_n_try(3)
///     .with_long_algo(AlgoConfig::new(AlgoKind::Em).with_n_iter_max(500));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyConfig {
    kind: StrategyKind,
    n_try: usize,
    n_short_run: usize,
    init: InitConfig,
    short_algo: AlgoConfig,
    long_algo: AlgoConfig,
}

impl StrategyConfig {
    /// Creates a configuration with the defaults listed above.
    pub fn new() -> Self {
        Self {
            kind: StrategyKind::Full,
            n_try: 1,
            n_short_run: 5,
            init: InitConfig::new(),
            short_algo: AlgoConfig::new(AlgoKind::Em)
                .with_n_iter_max(100)
                .with_epsilon(1e-4),
            long_algo: AlgoConfig::new(AlgoKind::Em)
                .with_n_iter_max(1000)
                .with_epsilon(1e-7),
        }
    }

    /// Sets the strategy kind.
    pub fn with_kind(mut self, kind: StrategyKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the number of tries.
    pub fn with_n_try(mut self, n_try: usize) -> Self {
        self.n_try = n_try;
        self
    }

    /// Sets the number of short runs per try.
    pub fn with_n_short_run(mut self, n_short_run: usize) -> Self {
        self.n_short_run = n_short_run;
        self
    }

    /// Sets the initialization.
    pub fn with_init(mut self, init: InitConfig) -> Self {
        self.init = init;
        self
    }

    /// Sets the short-run algorithm.
    pub fn with_short_algo(mut self, algo: AlgoConfig) -> Self {
        self.short_algo = algo;
        self
    }

    /// Sets the long-run algorithm.
    pub fn with_long_algo(mut self, algo: AlgoConfig) -> Self {
        self.long_algo = algo;
        self
    }

    // --- Accessors ---

    /// Returns the strategy kind.
    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// Returns the number of tries.
    pub fn n_try(&self) -> usize {
        self.n_try
    }

    /// Returns the number of short runs per try.
    pub fn n_short_run(&self) -> usize {
        self.n_short_run
    }

    /// Returns the initialization.
    pub fn init(&self) -> &InitConfig {
        &self.init
    }

    /// Returns the short-run algorithm.
    pub fn short_algo(&self) -> &AlgoConfig {
        &self.short_algo
    }

    /// Returns the long-run algorithm.
    pub fn long_algo(&self) -> &AlgoConfig {
        &self.long_algo
    }

    /// Validates this configuration.
    ///
    /// Short-run settings are only checked for the strategies that use them.
    pub fn validate(&self) -> Result<(), EstimationError> {
        if self.n_try == 0 {
            return Err(EstimationError::InvalidConfig {
                reason: "n_try must be >= 1".to_string(),
            });
        }
        self.init.validate()?;
        self.long_algo.validate()?;
        if self.kind != StrategyKind::Simple {
            if self.n_short_run == 0 {
                return Err(EstimationError::InvalidConfig {
                    reason: "n_short_run must be >= 1".to_string(),
                });
            }
            self.short_algo.validate()?;
        }
        Ok(())
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::new()
    }
}
