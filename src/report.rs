//! JSON report of a clustering run.

use std::path::Path;

use anyhow::{Context, Result};
use mixall_components::{MixtureComponent, ModelName, ParameterBlock};
use mixall_composer::Composer;
use serde::Serialize;
use tracing::info;

/// Everything written at the end of `mixall cluster`.
#[derive(Debug, Serialize)]
pub struct Report {
    pub criterion: String,
    /// Index into `candidates` of the selected model.
    pub selected: usize,
    pub model: ModelReport,
    pub candidates: Vec<CandidateRow>,
}

/// One line of the score table.
#[derive(Debug, Serialize)]
pub struct CandidateRow {
    pub n_cluster: usize,
    pub ln_likelihood: Option<f64>,
    pub n_free_parameters: Option<usize>,
    pub score: Option<f64>,
    /// Set when the candidate could not be estimated.
    pub error: Option<String>,
    /// Rejected trials reported by the strategy.
    pub messages: Vec<String>,
}

impl CandidateRow {
    /// A candidate that could not be built or estimated.
    pub fn failed(n_cluster: usize, error: String, messages: Vec<String>) -> Self {
        Self {
            n_cluster,
            ln_likelihood: None,
            n_free_parameters: None,
            score: None,
            error: Some(error),
            messages,
        }
    }
}

/// The selected model in full.
#[derive(Debug, Serialize)]
pub struct ModelReport {
    pub n_cluster: usize,
    pub ln_likelihood: f64,
    pub icl: f64,
    pub proportions: Vec<f64>,
    pub labels: Vec<usize>,
    pub responsibilities: Vec<Vec<f64>>,
    pub components: Vec<ComponentReport>,
}

#[derive(Debug, Serialize)]
pub struct ComponentReport {
    pub path: String,
    pub model: ModelName,
    pub parameters: Vec<ParameterBlock>,
}

impl ModelReport {
    /// Snapshot of a finalized composer. `paths` names the data file of
    /// each component, in order.
    pub fn from_composer(composer: &Composer, paths: &[String]) -> Self {
        let components = composer
            .components()
            .iter()
            .zip(paths)
            .map(|(c, path)| ComponentReport {
                path: path.clone(),
                model: c.model(),
                parameters: c.parameters(),
            })
            .collect();
        Self {
            n_cluster: composer.n_cluster(),
            ln_likelihood: composer.ln_likelihood(),
            icl: composer.compute_icl(),
            proportions: composer.prop().to_vec(),
            labels: composer.zi().to_vec(),
            responsibilities: composer.tik().rows().into_iter().map(|r| r.to_vec()).collect(),
            components,
        }
    }
}

/// Writes `report` as pretty JSON to `path`, or to stdout when `path` is
/// `None`.
pub fn write_report(report: &Report, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    match path {
        Some(p) => {
            std::fs::write(p, json)
                .with_context(|| format!("failed to write report: {}", p.display()))?;
            info!(path = %p.display(), "report written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixall_components::Component;
    use ndarray::Array2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn report_serializes_selected_model() {
        let data = Array2::from_shape_fn((40, 1), |(i, _)| if i < 20 { (i % 4) as f64 } else { 30.0 + (i % 4) as f64 });
        let model: ModelName = "gaussian_sk".parse().unwrap();
        let mut composer = Composer::new(vec![Component::new(model, data, 2).unwrap()], 2).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        composer.initialize_step();
        composer.random_class_init(&mut rng).unwrap();
        composer.finalize_step();

        let report = Report {
            criterion: "BIC".to_string(),
            selected: 0,
            model: ModelReport::from_composer(&composer, &["a.csv".to_string()]),
            candidates: vec![CandidateRow::failed(3, "too few samples".to_string(), Vec::new())],
        };
        let value: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["model"]["components"][0]["model"], "gaussian_sk");
        assert_eq!(value["model"]["labels"].as_array().unwrap().len(), 40);
        assert_eq!(value["model"]["responsibilities"][0].as_array().unwrap().len(), 2);
        assert_eq!(value["candidates"][0]["error"], "too few samples");
        assert!(value["candidates"][0]["score"].is_null());
    }
}
