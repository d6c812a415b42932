//! End-to-end run: features in, prediction/component/accuracy artifacts out

use crate::accuracy::{AccuracyEvaluator, AccuracySummary};
use crate::aggregator::ForecastAggregator;
use crate::config::PipelineConfig;
use crate::data::FeatureLoader;
use crate::error::Result;
use crate::output;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use tracing::{info, warn};

/// Counts reported after a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub entities: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub prediction_rows: usize,
    pub component_rows: usize,
    /// `None` when no entity produced historical actuals
    pub accuracy: Option<AccuracySummary>,
}

/// Load features, forecast every entity and write all artifacts
///
/// A schema problem in the feature table aborts before any entity is
/// processed. Entity failures are written to the failure summary and the
/// run carries on.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    config.validate()?;

    info!(path = %config.features_path.display(), "loading features");
    let table = FeatureLoader::from_csv(&config.features_path)?;
    let entities = table.entities().len();

    let model = config.model.build()?;
    let output = ForecastAggregator::new(model)
        .with_horizon(config.horizon_days)?
        .with_workers(config.workers)?
        .run(&table)?;

    fs::create_dir_all(&config.output_dir)?;
    output::write_predictions(config.predictions_path(), &output.predictions)?;
    output::write_components(config.components_path(), &output.components)?;
    output::write_failures(config.failures_path(), &output.failures)?;

    let accuracy = if output.predictions.is_empty() {
        warn!("no entity produced predictions, skipping accuracy report");
        match fs::remove_file(config.accuracy_path()) {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        None
    } else {
        let summary = AccuracyEvaluator::evaluate(&output.predictions)?;
        output::write_accuracy_report(config.accuracy_path(), &summary)?;
        Some(summary)
    };

    let summary = RunSummary {
        entities,
        succeeded: output.succeeded(),
        failed: output.failures.len(),
        prediction_rows: output.predictions.len(),
        component_rows: output.components.len(),
        accuracy,
    };

    info!(
        entities = summary.entities,
        succeeded = summary.succeeded,
        failed = summary.failed,
        output_dir = %config.output_dir.display(),
        "pipeline complete"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    const HEADER: &str = "transaction_date,store_id,product_id,daily_qty,temperature_2m_max,temperature_2m_min,precipitation_sum,day_of_week,is_holiday";

    fn features(days: u32) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for d in 0..days {
            writeln!(file, "2023-01-{:02},1,1,{},25.0,15.0,0.0,{},0", d + 2, 5 + d, d % 7).unwrap();
        }
        file
    }

    #[test]
    fn test_accuracy_skipped_when_every_entity_fails() {
        let features = features(2);
        let out = tempdir().unwrap();
        let config = PipelineConfig {
            features_path: features.path().to_path_buf(),
            output_dir: out.path().to_path_buf(),
            ..PipelineConfig::default()
        };

        let summary = run(&config).unwrap();
        assert_eq!(summary.entities, 1);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.accuracy, None);
        assert!(config.failures_path().exists());
        assert!(!config.accuracy_path().exists());
    }

    #[test]
    fn test_failed_rerun_removes_previous_accuracy_report() {
        let out = tempdir().unwrap();
        let good = features(5);
        let config = PipelineConfig {
            features_path: good.path().to_path_buf(),
            output_dir: out.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        let first = run(&config).unwrap();
        assert_eq!(first.succeeded, 1);
        assert!(config.accuracy_path().exists());

        let bad = features(2);
        let config = PipelineConfig {
            features_path: bad.path().to_path_buf(),
            ..config
        };
        let second = run(&config).unwrap();
        assert_eq!(second.succeeded, 0);
        assert_eq!(second.accuracy, None);
        assert!(!config.accuracy_path().exists());
    }
}
