//! Additive decomposition over history plus horizon

use crate::error::{ForecastError, Result};
use crate::forecaster::EntityForecaster;
use crate::models::{FittedRegression, RegressionModel};
use crate::records::ComponentRecord;

/// Extracts per-date component contributions from a fitted forecaster
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentExtractor;

impl ComponentExtractor {
    /// Decompose every date of the historical index followed by `horizon` future days
    ///
    /// Uses the same regressor fills as the forecaster's own predictions, so
    /// `predicted_qty` here matches the prediction table date for date. A row
    /// is future when its position is at or past the length of the model's
    /// historical index.
    pub fn extract<M: RegressionModel>(
        forecaster: &EntityForecaster<M>,
        horizon: usize,
    ) -> Result<Vec<ComponentRecord>> {
        let historical = forecaster.historical_regressors()?;
        let history_len = historical.len();
        let full = historical.concat(forecaster.future_regressors(horizon)?);

        let decomposition = forecaster.fitted()?.predict(&full)?;
        if decomposition.len() != full.len() {
            return Err(ForecastError::AlignmentError(format!(
                "{}: decomposition has {} rows for {} dates",
                forecaster.entity(),
                decomposition.len(),
                full.len()
            )));
        }

        let entity = forecaster.entity();
        Ok(decomposition
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| ComponentRecord {
                date: row.ds,
                predicted_qty: row.yhat,
                trend: row.trend,
                weekly_seasonal: row.weekly,
                temp_max: row.effects.temp_max,
                temp_min: row.effects.temp_min,
                rain: row.effects.rain,
                dow: row.effects.dow,
                holiday_flag: row.effects.holiday_flag,
                store_id: entity.store_id.clone(),
                product_id: entity.product_id.clone(),
                is_future: i >= history_len,
            })
            .collect())
    }
}
