//! Per-entity model ownership: fit, historical predict, future predict

use crate::data::EntityKey;
use crate::error::{ForecastError, Result};
use crate::frame::{RegressorFrame, RegressorFrameBuilder, TrainingFrame};
use crate::models::{FittedRegression, RegressionModel};
use crate::records::PredictionRecord;
use tracing::debug;

/// Owns one model instance for one entity
///
/// Nothing is shared between forecasters; each entity gets its own model,
/// training frame and fitted state.
#[derive(Debug)]
pub struct EntityForecaster<M: RegressionModel> {
    entity: EntityKey,
    model: M,
    frame: Option<TrainingFrame>,
    fitted: Option<M::Fitted>,
}

impl<M: RegressionModel> EntityForecaster<M> {
    pub fn new(entity: EntityKey, model: M) -> Self {
        Self {
            entity,
            model,
            frame: None,
            fitted: None,
        }
    }

    pub fn entity(&self) -> &EntityKey {
        &self.entity
    }

    /// Train the model on the entity's training frame
    ///
    /// Frames shorter than the model's minimum fail with `FitError`; errors
    /// from the model itself are surfaced as-is without a retry.
    pub fn fit(&mut self, frame: TrainingFrame) -> Result<()> {
        let needed = self.model.min_observations();
        if frame.len() < needed {
            return Err(ForecastError::FitError(format!(
                "{} has {} observations, model {} needs at least {}",
                self.entity,
                frame.len(),
                self.model.name(),
                needed
            )));
        }

        let fitted = self.model.fit(&frame)?;
        debug!(entity = %self.entity, rows = frame.len(), model = fitted.name(), "entity fitted");
        self.frame = Some(frame);
        self.fitted = Some(fitted);
        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn fitted(&self) -> Result<&M::Fitted> {
        self.fitted.as_ref().ok_or_else(|| {
            ForecastError::FitError(format!("{} has not been fitted", self.entity))
        })
    }

    pub fn training_frame(&self) -> Result<&TrainingFrame> {
        self.frame.as_ref().ok_or_else(|| {
            ForecastError::FitError(format!("{} has not been fitted", self.entity))
        })
    }

    /// Regressors for the model's historical date index, gaps filled
    pub fn historical_regressors(&self) -> Result<RegressorFrame> {
        let fitted = self.fitted()?;
        RegressorFrameBuilder::historical(self.training_frame()?, fitted.history_dates())
    }

    /// Regressors for the `horizon` days after training ends
    pub fn future_regressors(&self, horizon: usize) -> Result<RegressorFrame> {
        let frame = self.training_frame()?;
        let dates = self.fitted()?.future_dates(horizon)?;

        let last = frame.last_date().ok_or_else(|| {
            ForecastError::AlignmentError(format!("{} has an empty training frame", self.entity))
        })?;
        if dates.len() != horizon {
            return Err(ForecastError::AlignmentError(format!(
                "Model produced {} future dates for a {} day horizon",
                dates.len(),
                horizon
            )));
        }
        if let Some(first) = dates.first().filter(|d| **d <= last) {
            return Err(ForecastError::AlignmentError(format!(
                "Future date {} is not after training end {}",
                first, last
            )));
        }

        RegressorFrameBuilder::project_future(frame, &dates)
    }

    /// Predictions for exactly the historical date index the model was fit on
    pub fn predict_historical(&self) -> Result<Vec<PredictionRecord>> {
        let frame = self.training_frame()?;
        let regressors = self.historical_regressors()?;
        let prediction = self.fitted()?.predict(&regressors)?;
        self.check_length(prediction.len(), regressors.len())?;

        Ok(prediction
            .rows
            .iter()
            .map(|row| self.record(row.ds, row.yhat, frame.actual(row.ds), false))
            .collect())
    }

    /// Predictions for the `horizon` calendar days strictly after the last training date
    pub fn predict_future(&self, horizon: usize) -> Result<Vec<PredictionRecord>> {
        let regressors = self.future_regressors(horizon)?;
        let prediction = self.fitted()?.predict(&regressors)?;
        self.check_length(prediction.len(), regressors.len())?;

        Ok(prediction
            .rows
            .iter()
            .map(|row| self.record(row.ds, row.yhat, None, true))
            .collect())
    }

    fn check_length(&self, predicted: usize, requested: usize) -> Result<()> {
        if predicted != requested {
            return Err(ForecastError::AlignmentError(format!(
                "{}: model returned {} rows for {} requested dates",
                self.entity, predicted, requested
            )));
        }
        Ok(())
    }

    fn record(
        &self,
        date: chrono::NaiveDate,
        predicted_qty: f64,
        actual_qty: Option<f64>,
        is_future: bool,
    ) -> PredictionRecord {
        PredictionRecord {
            date,
            predicted_qty,
            actual_qty,
            store_id: self.entity.store_id.clone(),
            product_id: self.entity.product_id.clone(),
            is_future,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureRow;
    use crate::frame::DEFAULT_HORIZON_DAYS;
    use crate::models::AdditiveRegression;
    use chrono::{Duration, NaiveDate};

    fn training(days: i64) -> TrainingFrame {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let rows: Vec<FeatureRow> = (0..days)
            .map(|d| {
                FeatureRow::new(start + Duration::days(d), "Delhi", "1", 5).with_weather(
                    25.0,
                    14.0,
                    0.0,
                )
            })
            .collect();
        RegressorFrameBuilder::training_frame(&rows).unwrap()
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let forecaster = EntityForecaster::new(EntityKey::new("Delhi", "1"), AdditiveRegression::default());
        assert!(!forecaster.is_fitted());
        assert!(forecaster.predict_historical().is_err());
        assert!(forecaster.predict_future(3).is_err());
    }

    #[test]
    fn test_fit_rejects_short_frame() {
        let mut forecaster =
            EntityForecaster::new(EntityKey::new("Delhi", "1"), AdditiveRegression::default());
        let err = forecaster.fit(training(2)).unwrap_err();
        assert!(matches!(err, ForecastError::FitError(_)));
        assert!(!forecaster.is_fitted());
    }

    #[test]
    fn test_historical_and_future_partition() {
        let mut forecaster =
            EntityForecaster::new(EntityKey::new("Delhi", "1"), AdditiveRegression::default());
        forecaster.fit(training(10)).unwrap();

        let history = forecaster.predict_historical().unwrap();
        let future = forecaster.predict_future(DEFAULT_HORIZON_DAYS).unwrap();

        assert_eq!(history.len(), 10);
        assert!(history.iter().all(|r| !r.is_future && r.actual_qty == Some(5.0)));
        assert_eq!(future.len(), 30);
        assert!(future.iter().all(|r| r.is_future && r.actual_qty.is_none()));

        let last = history.last().unwrap().date;
        assert_eq!(future[0].date, last + Duration::days(1));
        assert!(future.windows(2).all(|w| w[1].date == w[0].date + Duration::days(1)));
    }

    #[test]
    fn test_dense_history_has_missing_actuals() {
        let frame = training(6);
        let sparse: Vec<_> = frame
            .rows()
            .iter()
            .filter(|r| r.ds.format("%d").to_string() != "03")
            .copied()
            .collect();
        let sparse = TrainingFrame::new(sparse).unwrap();

        let mut forecaster = EntityForecaster::new(
            EntityKey::new("Delhi", "1"),
            AdditiveRegression::default().with_dense_history(true),
        );
        forecaster.fit(sparse).unwrap();
        let history = forecaster.predict_historical().unwrap();

        assert_eq!(history.len(), 6);
        let gap = &history[2];
        assert_eq!(gap.date, NaiveDate::from_ymd_opt(2023, 1, 3).unwrap());
        assert_eq!(gap.actual_qty, None);
        assert!(gap.predicted_qty.is_finite());
    }
}
