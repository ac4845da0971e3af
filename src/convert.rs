//! Pure conversion functions: TOML config structs -> crate API config types.

use anyhow::{Context, Result, bail};

use mixall_components::{KernelOptions, ModelName};
use mixall_criteria::Criterion;
use mixall_estimation::{AlgoConfig, AlgoKind, InitConfig, InitMethod, StrategyConfig, StrategyKind};

use crate::config::*;
use crate::input::Delimiter;

/// Parses a model name such as `gaussian_sk` or `gamma_ajk_bk`.
pub fn parse_model(s: &str) -> Result<ModelName> {
    s.parse::<ModelName>().with_context(|| format!("invalid model: {s:?}"))
}

/// Parses a criterion name into the corresponding enum variant.
pub fn parse_criterion(s: &str) -> Result<Criterion> {
    s.parse::<Criterion>().with_context(|| format!("invalid criterion: {s:?}"))
}

/// Parses a delimiter name into the corresponding enum variant.
pub fn parse_delimiter(s: &str) -> Result<Delimiter> {
    match s.to_lowercase().as_str() {
        "auto" => Ok(Delimiter::Auto),
        "comma" | "," => Ok(Delimiter::Char(',')),
        "semicolon" | ";" => Ok(Delimiter::Char(';')),
        "tab" | "\t" => Ok(Delimiter::Char('\t')),
        "whitespace" | "space" => Ok(Delimiter::Whitespace),
        other => bail!("unknown delimiter: {other:?}"),
    }
}

/// Applies the set fields of an algorithm override to `base`.
pub fn apply_algo(
    base: AlgoConfig,
    algo: Option<&str>,
    n_iter: Option<usize>,
    epsilon: Option<f64>,
) -> Result<AlgoConfig> {
    let mut cfg = base;
    if let Some(name) = algo {
        let kind = name
            .parse::<AlgoKind>()
            .with_context(|| format!("invalid algorithm: {name:?}"))?;
        cfg = cfg.with_kind(kind);
    }
    if let Some(n) = n_iter {
        cfg = cfg.with_n_iter_max(n);
    }
    if let Some(eps) = epsilon {
        cfg = cfg.with_epsilon(eps);
    }
    Ok(cfg)
}

/// Builds an [`InitConfig`] from the TOML init table.
pub fn build_init_config(init: &InitToml) -> Result<InitConfig> {
    let base = InitConfig::new();
    let method = init
        .method
        .parse::<InitMethod>()
        .with_context(|| format!("invalid init method: {:?}", init.method))?;
    let algo = apply_algo(*base.algo(), init.algo.as_deref(), init.n_iter, init.epsilon)?;
    Ok(base
        .with_method(method)
        .with_n_init_run(init.n_init_run)
        .with_algo(algo))
}

/// Builds a validated [`StrategyConfig`] from the TOML strategy table.
pub fn build_strategy_config(strategy: &StrategyToml) -> Result<StrategyConfig> {
    let base = StrategyConfig::new();
    let kind = strategy
        .kind
        .parse::<StrategyKind>()
        .with_context(|| format!("invalid strategy: {:?}", strategy.kind))?;
    let short = &strategy.short_run;
    let long = &strategy.long_run;
    let cfg = base
        .with_kind(kind)
        .with_n_try(strategy.n_try)
        .with_n_short_run(strategy.n_short_run)
        .with_init(build_init_config(&strategy.init)?)
        .with_short_algo(apply_algo(
            *base.short_algo(),
            short.algo.as_deref(),
            short.n_iter,
            short.epsilon,
        )?)
        .with_long_algo(apply_algo(
            *base.long_algo(),
            long.algo.as_deref(),
            long.n_iter,
            long.epsilon,
        )?);
    cfg.validate().context("invalid [strategy] table")?;
    Ok(cfg)
}

/// Builds [`KernelOptions`] for a component block, or `None` if the block
/// sets no kernel option.
pub fn build_kernel_options(component: &ComponentToml) -> Result<Option<KernelOptions>> {
    if component.bandwidth.is_none() && component.dim.is_none() {
        return Ok(None);
    }
    let mut opts = KernelOptions::new();
    if let Some(h) = component.bandwidth {
        opts = opts.with_bandwidth(h);
    }
    if let Some(dim) = component.dim {
        opts = opts.with_dim(dim);
    }
    opts.validate()
        .with_context(|| format!("invalid kernel options for {}", component.path.display()))?;
    Ok(Some(opts))
}

/// Checks the cluster grid: non-empty, every count at least 1.
pub fn validate_clusters(clusters: &[usize]) -> Result<()> {
    if clusters.is_empty() {
        bail!("clusters must list at least one cluster count");
    }
    if let Some(&bad) = clusters.iter().find(|&&k| k == 0) {
        bail!("cluster counts must be >= 1, got {bad}");
    }
    Ok(())
}
