//! Additive trend + weekly seasonality + regressor model
//!
//! `yhat(t) = trend(t) + weekly(t) + Σ beta_j * standardised(x_j)`, estimated
//! jointly by ridge-stabilised least squares. The ridge term keeps the fit
//! well posed when a short history has fewer rows than model columns or when
//! `dow` overlaps with the weekly Fourier terms.

use crate::error::{ForecastError, Result};
use crate::frame::{RegressorFrame, RegressorFrameBuilder, Regressors, TrainingFrame, REGRESSOR_NAMES};
use crate::models::ols::ridge_fit;
use crate::models::{ComponentRow, Decomposition, FittedRegression, RegressionModel};
use chrono::{Duration, NaiveDate};
use std::f64::consts::PI;
use tracing::debug;

const WEEK_DAYS: f64 = 7.0;
const N_REGRESSORS: usize = REGRESSOR_NAMES.len();

/// Additive regression model definition
#[derive(Debug, Clone)]
pub struct AdditiveRegression {
    /// Name of the model
    name: String,
    /// Fourier order of the weekly seasonality
    weekly_order: usize,
    /// Ridge penalty on every column except the intercept
    ridge: f64,
    min_observations: usize,
    /// Rebuild a gap-free daily calendar between first and last observation
    dense_history: bool,
}

/// Fitted additive model for one entity
#[derive(Debug, Clone)]
pub struct FittedAdditive {
    name: String,
    weekly_order: usize,
    start: NaiveDate,
    /// Days spanned by the history; time is scaled to [0, 1] over it
    t_scale: f64,
    y_scale: f64,
    history: Vec<NaiveDate>,
    intercept: f64,
    slope: f64,
    weekly: Vec<f64>,
    coefficients: [f64; N_REGRESSORS],
    centers: [f64; N_REGRESSORS],
    scales: [f64; N_REGRESSORS],
}

impl AdditiveRegression {
    /// Create a new additive model
    pub fn new(weekly_order: usize, ridge: f64, min_observations: usize) -> Result<Self> {
        if !ridge.is_finite() || ridge < 0.0 {
            return Err(ForecastError::InvalidParameter(
                "Ridge penalty must be a non-negative number".to_string(),
            ));
        }
        if min_observations == 0 {
            return Err(ForecastError::InvalidParameter(
                "Minimum observations must be positive".to_string(),
            ));
        }

        Ok(Self {
            name: format!("Additive Regression (weekly_order={}, ridge={})", weekly_order, ridge),
            weekly_order,
            ridge,
            min_observations,
            dense_history: false,
        })
    }

    /// Use every calendar day between first and last observation as the history index
    pub fn with_dense_history(mut self, dense: bool) -> Self {
        self.dense_history = dense;
        self
    }
}

impl Default for AdditiveRegression {
    fn default() -> Self {
        Self {
            name: "Additive Regression (weekly_order=3, ridge=0.001)".to_string(),
            weekly_order: 3,
            ridge: 1e-3,
            min_observations: 3,
            dense_history: false,
        }
    }
}

impl RegressionModel for AdditiveRegression {
    type Fitted = FittedAdditive;

    fn fit(&self, frame: &TrainingFrame) -> Result<Self::Fitted> {
        let rows = frame.rows();
        if rows.len() < self.min_observations {
            return Err(ForecastError::FitError(format!(
                "Insufficient data. Need at least {} observations, got {}",
                self.min_observations,
                rows.len()
            )));
        }
        if rows.iter().any(|r| !r.y.is_finite() || !r.regressors.is_finite()) {
            return Err(ForecastError::FitError(
                "Training frame contains non-finite values".to_string(),
            ));
        }

        let start = rows[0].ds;
        let end = rows[rows.len() - 1].ds;
        let t_scale = ((end - start).num_days() as f64).max(1.0);

        let y_scale = rows.iter().map(|r| r.y.abs()).fold(0.0, f64::max);
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

        let (centers, scales) = standardisation(frame);

        let design: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| {
                let t = (r.ds - start).num_days() as f64;
                let mut x = Vec::with_capacity(2 + 2 * self.weekly_order + N_REGRESSORS);
                x.push(1.0);
                x.push(t / t_scale);
                x.extend(fourier_terms(t, WEEK_DAYS, self.weekly_order));
                let values = r.regressors.values();
                for j in 0..N_REGRESSORS {
                    x.push((values[j] - centers[j]) / scales[j]);
                }
                x
            })
            .collect();
        let y: Vec<f64> = rows.iter().map(|r| r.y / y_scale).collect();

        let beta = ridge_fit(&design, &y, self.ridge, &[0])
            .map_err(|e| ForecastError::FitError(e.to_string()))?;

        let weekly_end = 2 + 2 * self.weekly_order;
        let mut coefficients = [0.0; N_REGRESSORS];
        coefficients.copy_from_slice(&beta[weekly_end..weekly_end + N_REGRESSORS]);

        let history = if self.dense_history {
            (0..=(end - start).num_days())
                .map(|d| start + Duration::days(d))
                .collect()
        } else {
            frame.dates()
        };

        debug!(
            observations = rows.len(),
            history = history.len(),
            "fitted additive regression"
        );

        Ok(FittedAdditive {
            name: self.name.clone(),
            weekly_order: self.weekly_order,
            start,
            t_scale,
            y_scale,
            history,
            intercept: beta[0],
            slope: beta[1],
            weekly: beta[2..weekly_end].to_vec(),
            coefficients,
            centers,
            scales,
        })
    }

    fn min_observations(&self) -> usize {
        self.min_observations
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl FittedAdditive {
    fn component_row(&self, ds: NaiveDate, regressors: &Regressors) -> ComponentRow {
        let t = (ds - self.start).num_days() as f64;
        let trend = (self.intercept + self.slope * t / self.t_scale) * self.y_scale;
        let weekly = fourier_terms(t, WEEK_DAYS, self.weekly_order)
            .iter()
            .zip(&self.weekly)
            .map(|(x, b)| x * b)
            .sum::<f64>()
            * self.y_scale;

        let values = regressors.values();
        let mut effects = [0.0; N_REGRESSORS];
        for j in 0..N_REGRESSORS {
            effects[j] =
                self.coefficients[j] * (values[j] - self.centers[j]) / self.scales[j] * self.y_scale;
        }

        let mut row = ComponentRow {
            ds,
            yhat: 0.0,
            trend,
            weekly,
            effects: Regressors::from_values(effects),
        };
        row.yhat = row.component_sum();
        row
    }
}

impl FittedRegression for FittedAdditive {
    fn history_dates(&self) -> &[NaiveDate] {
        &self.history
    }

    fn future_dates(&self, horizon: usize) -> Result<Vec<NaiveDate>> {
        match self.history.last() {
            Some(last) => RegressorFrameBuilder::future_dates(*last, horizon),
            None => Err(ForecastError::AlignmentError(
                "Model has an empty historical index".to_string(),
            )),
        }
    }

    fn predict(&self, regressors: &RegressorFrame) -> Result<Decomposition> {
        let mut rows = Vec::with_capacity(regressors.len());
        for (ds, row) in regressors.dates.iter().zip(&regressors.rows) {
            if !row.is_finite() {
                return Err(ForecastError::DataError(format!(
                    "Incomplete regressor row for {}",
                    ds
                )));
            }
            rows.push(self.component_row(*ds, row));
        }
        Ok(Decomposition { rows })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// `[sin(2πt/p), cos(2πt/p), ..., sin(2πkt/p), cos(2πkt/p)]`
fn fourier_terms(t: f64, period: f64, order: usize) -> Vec<f64> {
    let mut terms = Vec::with_capacity(2 * order);
    for k in 1..=order {
        let angle = 2.0 * PI * k as f64 * t / period;
        terms.push(angle.sin());
        terms.push(angle.cos());
    }
    terms
}

/// Per-regressor centre and scale
///
/// 0/1 regressors stay unscaled; constant regressors are centred to zero.
fn standardisation(frame: &TrainingFrame) -> ([f64; N_REGRESSORS], [f64; N_REGRESSORS]) {
    let mut centers = [0.0; N_REGRESSORS];
    let mut scales = [1.0; N_REGRESSORS];
    let n = frame.len() as f64;

    for j in 0..N_REGRESSORS {
        let column: Vec<f64> = frame.rows().iter().map(|r| r.regressors.values()[j]).collect();
        if column.iter().all(|v| *v == 0.0 || *v == 1.0) {
            continue;
        }
        let mean = column.iter().sum::<f64>() / n;
        let std = (column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        centers[j] = mean;
        if std > 1e-12 {
            scales[j] = std;
        }
    }

    (centers, scales)
}
