//! Runs every entity through the forecaster and merges the results
//!
//! Entities are independent: each one gets its own model instance and output
//! buffers, runs on a rayon pool, and is merged back in sorted entity order.
//! A failing entity is recorded in the failure list and never stops the run.

use crate::components::ComponentExtractor;
use crate::data::{EntityKey, FeatureRow, FeatureTable};
use crate::error::{ForecastError, Result};
use crate::forecaster::EntityForecaster;
use crate::frame::{RegressorFrameBuilder, DEFAULT_HORIZON_DAYS};
use crate::models::RegressionModel;
use crate::records::{ComponentRecord, PredictionRecord};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// An entity that produced no output rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFailure {
    pub store_id: String,
    pub product_id: String,
    /// Error category, e.g. `fit` or `alignment`
    pub kind: String,
    pub reason: String,
}

impl EntityFailure {
    fn new(entity: &EntityKey, err: &ForecastError) -> Self {
        Self {
            store_id: entity.store_id.clone(),
            product_id: entity.product_id.clone(),
            kind: err.kind().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Concatenated tables for all successful entities plus the failure summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastOutput {
    pub predictions: Vec<PredictionRecord>,
    pub components: Vec<ComponentRecord>,
    pub failures: Vec<EntityFailure>,
}

impl ForecastOutput {
    /// Entities that produced rows
    pub fn succeeded(&self) -> usize {
        let mut entities: Vec<EntityKey> = self.predictions.iter().map(|r| r.entity()).collect();
        entities.dedup();
        entities.len()
    }
}

struct EntityOutput {
    predictions: Vec<PredictionRecord>,
    components: Vec<ComponentRecord>,
}

/// Fits and forecasts every entity of a feature table
#[derive(Debug, Clone)]
pub struct ForecastAggregator<M: RegressionModel> {
    model: M,
    horizon: usize,
    workers: usize,
}

impl<M> ForecastAggregator<M>
where
    M: RegressionModel + Send + Sync,
{
    /// Aggregator with the default 30 day horizon on a single worker
    pub fn new(model: M) -> Self {
        Self {
            model,
            horizon: DEFAULT_HORIZON_DAYS,
            workers: 1,
        }
    }

    pub fn with_horizon(mut self, horizon: usize) -> Result<Self> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Forecast horizon must be at least one day".to_string(),
            ));
        }
        self.horizon = horizon;
        Ok(self)
    }

    pub fn with_workers(mut self, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(ForecastError::InvalidParameter(
                "Worker count must be at least one".to_string(),
            ));
        }
        self.workers = workers;
        Ok(self)
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process every entity and merge in sorted entity order
    pub fn run(&self, table: &FeatureTable) -> Result<ForecastOutput> {
        let started = Instant::now();
        let groups: Vec<(EntityKey, Vec<FeatureRow>)> = table.partition().into_iter().collect();
        info!(
            entities = groups.len(),
            workers = self.workers,
            horizon = self.horizon,
            model = self.model.name(),
            "forecasting entities"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| ForecastError::InvalidParameter(format!("Cannot start worker pool: {}", e)))?;

        let results: Vec<(EntityKey, Result<EntityOutput>)> = pool.install(|| {
            groups
                .par_iter()
                .map(|(entity, rows)| (entity.clone(), self.forecast_entity(entity, rows)))
                .collect()
        });

        let mut output = ForecastOutput::default();
        for (entity, result) in results {
            match result {
                Ok(entity_output) => {
                    output.predictions.extend(entity_output.predictions);
                    output.components.extend(entity_output.components);
                }
                Err(err) => {
                    warn!(
                        store_id = %entity.store_id,
                        product_id = %entity.product_id,
                        kind = err.kind(),
                        error = %err,
                        "entity skipped"
                    );
                    output.failures.push(EntityFailure::new(&entity, &err));
                }
            }
        }

        info!(
            predictions = output.predictions.len(),
            components = output.components.len(),
            failures = output.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "forecast run complete"
        );

        Ok(output)
    }

    fn forecast_entity(&self, entity: &EntityKey, rows: &[FeatureRow]) -> Result<EntityOutput> {
        let frame = RegressorFrameBuilder::training_frame(rows)?;
        let mut forecaster = EntityForecaster::new(entity.clone(), self.model.clone());
        forecaster.fit(frame)?;

        let mut predictions = forecaster.predict_historical()?;
        predictions.extend(forecaster.predict_future(self.horizon)?);
        let components = ComponentExtractor::extract(&forecaster, self.horizon)?;

        debug!(
            entity = %entity,
            predictions = predictions.len(),
            components = components.len(),
            "entity forecast"
        );

        Ok(EntityOutput {
            predictions,
            components,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdditiveRegression;
    use chrono::{Duration, NaiveDate};

    fn rows(store: &str, product: &str, days: i64) -> Vec<FeatureRow> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        (0..days)
            .map(|d| {
                FeatureRow::new(start + Duration::days(d), store, product, 4 + (d % 3) as u64)
                    .with_weather(28.0, 18.0, 0.0)
            })
            .collect()
    }

    fn table() -> FeatureTable {
        let mut all = rows("2", "1", 12);
        all.extend(rows("10", "1", 2));
        all.extend(rows("1", "5", 9));
        FeatureTable::new(all).unwrap()
    }

    #[test]
    fn test_short_entity_is_isolated() {
        let output = ForecastAggregator::new(AdditiveRegression::default())
            .run(&table())
            .unwrap();

        assert_eq!(output.failures.len(), 1);
        let failure = &output.failures[0];
        assert_eq!((failure.store_id.as_str(), failure.product_id.as_str()), ("10", "1"));
        assert_eq!(failure.kind, "fit");

        assert_eq!(output.succeeded(), 2);
        assert_eq!(output.predictions.len(), (9 + 30) + (12 + 30));
        assert_eq!(output.components.len(), output.predictions.len());
        assert!(output.predictions.iter().all(|r| r.store_id != "10"));
    }

    #[test]
    fn test_output_in_entity_order() {
        let output = ForecastAggregator::new(AdditiveRegression::default())
            .run(&table())
            .unwrap();

        assert_eq!(output.predictions[0].store_id, "1");
        assert_eq!(output.predictions[0].product_id, "5");
        assert_eq!(output.predictions.last().unwrap().store_id, "2");
    }

    #[test]
    fn test_worker_count_does_not_change_output() {
        let model = AdditiveRegression::default();
        let single = ForecastAggregator::new(model.clone()).run(&table()).unwrap();
        let parallel = ForecastAggregator::new(model)
            .with_workers(4)
            .unwrap()
            .run(&table())
            .unwrap();

        assert_eq!(single, parallel);
    }

    #[test]
    fn test_horizon_past_calendar_end_fails_each_entity() {
        let output = ForecastAggregator::new(AdditiveRegression::default())
            .with_horizon(100_000_000)
            .unwrap()
            .run(&table())
            .unwrap();

        assert_eq!(output.failures.len(), 3);
        assert_eq!(output.failures[0].kind, "alignment");
        assert_eq!(output.failures[1].kind, "alignment");
        assert_eq!(output.failures[2].kind, "fit");
        assert!(output.predictions.is_empty());
        assert!(output.components.is_empty());
    }

    #[test]
    fn test_invalid_settings() {
        let model = AdditiveRegression::default();
        assert!(ForecastAggregator::new(model.clone()).with_horizon(0).is_err());
        assert!(ForecastAggregator::new(model).with_workers(0).is_err());
    }
}
