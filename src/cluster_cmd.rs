//! Cluster command: estimate every cluster count and select the best model.

use anyhow::{Context, Result, bail};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{info, info_span, warn};

use mixall_components::{Component, KernelOptions, ModelName};
use mixall_composer::Composer;
use mixall_criteria::{Criterion, select_best};
use mixall_estimation::{EstimationError, Strategy};

use crate::cli::ClusterArgs;
use crate::config::MixallConfig;
use crate::report::{CandidateRow, ModelReport, Report, write_report};
use crate::{convert, input};

/// A data file read and bound to its model, ready to build components.
struct Source {
    path: String,
    model: ModelName,
    data: Array2<f64>,
    kernel: Option<KernelOptions>,
}

impl Source {
    fn component(&self, n_cluster: usize) -> Result<Component> {
        let built = match self.kernel {
            Some(opts) => Component::kernel(self.model, self.data.clone(), n_cluster, opts),
            None => Component::new(self.model, self.data.clone(), n_cluster),
        };
        built.with_context(|| format!("{} ({})", self.path, self.model))
    }
}

/// Run the clustering pipeline.
pub fn run(args: ClusterArgs) -> Result<()> {
    let _cmd = info_span!("cluster").entered();
    // 1. Load project TOML
    let toml_str = std::fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read config file: {}", args.config.display()))?;
    let config: MixallConfig = toml::from_str(&toml_str).context("failed to parse TOML config")?;

    // 2. Build library configs
    let criterion = convert::parse_criterion(&config.criterion)?;
    let strategy = Strategy::from_config(&convert::build_strategy_config(&config.strategy)?)
        .context("invalid strategy")?;
    convert::validate_clusters(&config.clusters)?;
    if config.components.is_empty() {
        bail!("at least one [[component]] block is required");
    }

    // 3. Read data
    let sources = read_sources(&config)?;

    // 4. One seed per candidate, drawn up front so results do not depend on
    // thread scheduling
    let mut rng = match args.seed.or(config.seed) {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_os_rng(),
    };
    let seeds: Vec<u64> = config.clusters.iter().map(|_| rng.random()).collect();

    // 5. Estimate candidates in parallel
    let outcomes: Vec<Result<(Composer, Vec<String>), Failure>> = config
        .clusters
        .par_iter()
        .zip(seeds.par_iter())
        .map(|(&n_cluster, &seed)| {
            let _k = info_span!("candidate", n_cluster).entered();
            let mut rng = StdRng::seed_from_u64(seed);
            estimate(&sources, n_cluster, &strategy, &mut rng)
        })
        .collect();

    let mut rows = Vec::with_capacity(outcomes.len());
    let mut models = Vec::with_capacity(outcomes.len());
    for (&n_cluster, outcome) in config.clusters.iter().zip(outcomes) {
        match outcome {
            Ok((composer, messages)) => {
                let score = criterion.value(&composer);
                info!(
                    n_cluster,
                    ln_likelihood = composer.ln_likelihood(),
                    score,
                    "candidate estimated"
                );
                rows.push(CandidateRow {
                    n_cluster,
                    ln_likelihood: Some(composer.ln_likelihood()),
                    n_free_parameters: Some(composer.n_free_parameters()),
                    score: Some(score),
                    error: None,
                    messages,
                });
                models.push(Some(composer));
            }
            Err(Failure { error, messages }) => {
                warn!(n_cluster, error = %format!("{error:#}"), "candidate failed");
                rows.push(CandidateRow::failed(n_cluster, format!("{error:#}"), messages));
                models.push(None);
            }
        }
    }

    // 6. Select
    let scores: Vec<f64> = rows
        .iter()
        .map(|r| r.score.unwrap_or(f64::INFINITY))
        .collect();
    let Some(selected) = select_best(&scores) else {
        bail!("every candidate failed ({} tried)", rows.len());
    };
    let Some(best) = models[selected].as_ref() else {
        bail!("selected candidate has no model");
    };
    info!(
        n_cluster = best.n_cluster(),
        criterion = %criterion,
        score = scores[selected],
        "model selected"
    );

    // 7. Write report
    let paths: Vec<String> = sources.iter().map(|s| s.path.clone()).collect();
    let report = Report {
        criterion: criterion.name().to_string(),
        selected,
        model: ModelReport::from_composer(best, &paths),
        candidates: rows,
    };
    let output = args.output.or(config.output);
    write_report(&report, output.as_deref())
}

fn read_sources(config: &MixallConfig) -> Result<Vec<Source>> {
    let mut sources = Vec::with_capacity(config.components.len());
    for block in &config.components {
        let model = convert::parse_model(&block.model)?;
        let delimiter = convert::parse_delimiter(&block.delimiter)?;
        let kernel = convert::build_kernel_options(block)?;
        if kernel.is_some() && !matches!(model, ModelName::KernelGaussian { .. }) {
            bail!(
                "{}: bandwidth and dim only apply to kernel models, not {model}",
                block.path.display()
            );
        }
        let data = input::read_table(&block.path, delimiter, block.header)?;
        sources.push(Source {
            path: block.path.display().to_string(),
            model,
            data,
            kernel,
        });
    }

    let n_sample = sources[0].data.nrows();
    if let Some(bad) = sources.iter().find(|s| s.data.nrows() != n_sample) {
        bail!(
            "{} has {} rows but {} has {n_sample}",
            bad.path,
            bad.data.nrows(),
            sources[0].path
        );
    }
    Ok(sources)
}

/// Why a candidate could not be estimated, with the rejected trials.
struct Failure {
    error: anyhow::Error,
    messages: Vec<String>,
}

impl From<anyhow::Error> for Failure {
    fn from(error: anyhow::Error) -> Self {
        Self {
            error,
            messages: Vec::new(),
        }
    }
}

fn estimate(
    sources: &[Source],
    n_cluster: usize,
    strategy: &Strategy,
    rng: &mut StdRng,
) -> Result<(Composer, Vec<String>), Failure> {
    let components = sources
        .iter()
        .map(|s| s.component(n_cluster))
        .collect::<Result<Vec<_>>>()?;
    let mut composer = Composer::new(components, n_cluster).context("failed to build composer")?;

    match strategy.run(&mut composer, rng) {
        Ok(report) => {
            composer.imputation_step();
            composer.finalize_step();
            Ok((composer, report.messages))
        }
        Err(EstimationError::NoImprovement { n_try, messages }) => Err(Failure {
            error: anyhow::anyhow!("no improvement after {n_try} tries"),
            messages,
        }),
        Err(e) => Err(anyhow::Error::new(e).context("estimation failed").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_distr::{Distribution, Normal, Poisson};
    use std::fmt::Write as _;
    use std::path::Path;

    fn write_data(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let mut rng = StdRng::seed_from_u64(1);
        let left = Normal::new(-4.0, 1.0).unwrap();
        let right = Normal::new(4.0, 1.0).unwrap();
        let low = Poisson::new(1.0).unwrap();
        let high = Poisson::new(12.0).unwrap();

        let mut reals = String::from("x;y\n");
        let mut counts = String::new();
        for i in 0..200 {
            let (a, b) = if i % 2 == 0 {
                (left.sample(&mut rng), left.sample(&mut rng))
            } else {
                (right.sample(&mut rng), right.sample(&mut rng))
            };
            let c: f64 = if i % 2 == 0 { low.sample(&mut rng) } else { high.sample(&mut rng) };
            if i == 7 {
                writeln!(reals, "NA;{b}").unwrap();
            } else {
                writeln!(reals, "{a};{b}").unwrap();
            }
            writeln!(counts, "{c}").unwrap();
        }
        let reals_path = dir.join("reals.csv");
        let counts_path = dir.join("counts.txt");
        std::fs::write(&reals_path, reals).unwrap();
        std::fs::write(&counts_path, counts).unwrap();
        (reals_path, counts_path)
    }

    #[test]
    fn cluster_writes_report_selecting_two() {
        let dir = tempfile::tempdir().unwrap();
        let (reals, counts) = write_data(dir.path());
        let config_path = dir.path().join("mixall.toml");
        let output = dir.path().join("report.json");
        let config = format!(
            r#"
            criterion = "bic"
            clusters = [1, 2, 3]

            [[component]]
            path = {reals:?}
            model = "gaussian_sjk"
            header = true

            [[component]]
            path = {counts:?}
            model = "poisson_ljk"

            [strategy]
            kind = "xem"
            n_try = 2
            n_short_run = 3
            "#
        );
        std::fs::write(&config_path, config).unwrap();

        run(ClusterArgs {
            config: config_path,
            output: Some(output.clone()),
            seed: Some(11),
        })
        .unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(json["criterion"], "BIC");
        assert_eq!(json["model"]["n_cluster"], 2);
        assert_eq!(json["candidates"].as_array().unwrap().len(), 3);
        assert_eq!(json["model"]["components"][1]["model"], "poisson_ljk");
    }

    #[test]
    fn mismatched_row_counts_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        std::fs::write(&a, "1\n2\n3\n").unwrap();
        std::fs::write(&b, "1\n2\n").unwrap();
        let config_path = dir.path().join("mixall.toml");
        std::fs::write(
            &config_path,
            format!(
                "[[component]]\npath = {a:?}\nmodel = \"gaussian_s\"\n\n[[component]]\npath = {b:?}\nmodel = \"gaussian_s\"\n"
            ),
        )
        .unwrap();

        let err = run(ClusterArgs {
            config: config_path,
            output: None,
            seed: Some(1),
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("rows"));
    }
}
