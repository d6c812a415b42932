//! Time-series regression models with exogenous regressors
//!
//! The orchestration layer only talks to a model through [`RegressionModel`]
//! and [`FittedRegression`]; any implementation that honours the decomposition
//! contract can be plugged in.

use crate::error::Result;
use crate::frame::{RegressorFrame, Regressors, TrainingFrame};
use chrono::NaiveDate;
use std::fmt::Debug;

pub mod additive;
pub mod ols;

pub use additive::{AdditiveRegression, FittedAdditive};

/// One predicted date, broken down into additive components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentRow {
    pub ds: NaiveDate,
    /// Full prediction
    pub yhat: f64,
    pub trend: f64,
    pub weekly: f64,
    /// Contribution of each regressor, in canonical regressor order
    pub effects: Regressors,
}

impl ComponentRow {
    /// Sum of the listed components
    pub fn component_sum(&self) -> f64 {
        self.trend + self.weekly + self.effects.values().iter().sum::<f64>()
    }
}

/// Prediction with its decomposition, one row per requested date
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decomposition {
    pub rows: Vec<ComponentRow>,
}

impl Decomposition {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn yhat(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.yhat).collect()
    }
}

/// A fitted model bound to the canonical regressor set
pub trait FittedRegression: Debug {
    /// The historical date index the model was fit on
    fn history_dates(&self) -> &[NaiveDate];

    /// The `horizon` dates following the historical index; `AlignmentError`
    /// when they cannot be represented
    fn future_dates(&self, horizon: usize) -> Result<Vec<NaiveDate>>;

    /// Predict and decompose; every regressor row must be complete
    fn predict(&self, regressors: &RegressorFrame) -> Result<Decomposition>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Unfitted model that can be fit to one entity's training frame
pub trait RegressionModel: Debug + Clone {
    /// The type of fitted model produced
    type Fitted: FittedRegression;

    /// Fit the model; fails with `FitError` on insufficient or degenerate data
    fn fit(&self, frame: &TrainingFrame) -> Result<Self::Fitted>;

    /// Fewest observations the model accepts
    fn min_observations(&self) -> usize;

    /// Get the name of the model
    fn name(&self) -> &str;
}
