//! Global and per-entity accuracy over historical predictions

use crate::data::EntityKey;
use crate::error::{ForecastError, Result};
use crate::metrics::{mean_absolute_error, mean_absolute_percentage_error, root_mean_squared_error};
use crate::records::PredictionRecord;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Error metrics over every evaluated row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GlobalAccuracy {
    pub mae: f64,
    pub rmse: f64,
    /// `None` when every evaluated actual was zero
    pub mape: Option<f64>,
    /// Rows that contributed to MAE and RMSE
    pub observations: usize,
}

/// MAPE for one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityAccuracy {
    pub store_id: String,
    pub product_id: String,
    pub mape: Option<f64>,
}

/// Global triple plus the per-entity MAPE table, entities in sorted order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracySummary {
    pub global: GlobalAccuracy,
    pub entities: Vec<EntityAccuracy>,
}

impl fmt::Display for AccuracySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Forecast Accuracy ({} observations):", self.global.observations)?;
        writeln!(f, "  MAE:     {:.4}", self.global.mae)?;
        writeln!(f, "  RMSE:    {:.4}", self.global.rmse)?;
        match self.global.mape {
            Some(mape) => writeln!(f, "  MAPE:    {:.4}%", mape)?,
            None => writeln!(f, "  MAPE:    undefined")?,
        }
        writeln!(f, "  Entities: {}", self.entities.len())
    }
}

/// Computes accuracy from a predictions table
#[derive(Debug, Clone, Copy, Default)]
pub struct AccuracyEvaluator;

impl AccuracyEvaluator {
    /// Evaluate historical rows with an observed quantity
    ///
    /// Future rows and rows without `actual_qty` are ignored. Zero actuals
    /// count towards MAE and RMSE but are left out of every MAPE.
    pub fn evaluate(predictions: &[PredictionRecord]) -> Result<AccuracySummary> {
        let mut forecast = Vec::new();
        let mut actual = Vec::new();
        let mut per_entity: BTreeMap<EntityKey, (Vec<f64>, Vec<f64>)> = BTreeMap::new();

        for record in predictions.iter().filter(|r| !r.is_future) {
            let Some(observed) = record.actual_qty else {
                continue;
            };
            forecast.push(record.predicted_qty);
            actual.push(observed);

            let (f, a) = per_entity.entry(record.entity()).or_default();
            f.push(record.predicted_qty);
            a.push(observed);
        }

        if actual.is_empty() {
            return Err(ForecastError::DataError(
                "No historical predictions with observed quantities to evaluate".to_string(),
            ));
        }

        let global = GlobalAccuracy {
            mae: mean_absolute_error(&forecast, &actual)?,
            rmse: root_mean_squared_error(&forecast, &actual)?,
            mape: mean_absolute_percentage_error(&forecast, &actual)?,
            observations: actual.len(),
        };

        let entities = per_entity
            .into_iter()
            .map(|(key, (f, a))| {
                Ok(EntityAccuracy {
                    mape: mean_absolute_percentage_error(&f, &a)?,
                    store_id: key.store_id,
                    product_id: key.product_id,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            observations = global.observations,
            entities = entities.len(),
            mae = global.mae,
            rmse = global.rmse,
            "accuracy evaluated"
        );

        Ok(AccuracySummary { global, entities })
    }
}
