//! # Sales Forecast
//!
//! Per-store, per-product daily sales forecasting with calendar, holiday and
//! weather regressors.
//!
//! ## Features
//!
//! - FeatureTable loading from CSV (polars) with schema validation
//! - Regressor-aligned training frames with backward-only gap filling
//! - Additive trend + weekly seasonality + regressor model behind a trait pair
//! - 30 day forecasts with persistence-filled future weather
//! - Additive component decompositions over history and horizon
//! - Per-entity failure isolation and parallel entity processing
//! - Global and per-entity accuracy (MAE, RMSE, MAPE)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sales_forecast::{AccuracyEvaluator, AdditiveRegression, FeatureLoader, ForecastAggregator};
//!
//! # fn main() -> sales_forecast::Result<()> {
//! // Load features
//! let table = FeatureLoader::from_csv("features_daily.csv")?;
//!
//! // Forecast every (store, product) entity
//! let output = ForecastAggregator::new(AdditiveRegression::default()).run(&table)?;
//! for failure in &output.failures {
//!     println!("{} / {}: {}", failure.store_id, failure.product_id, failure.reason);
//! }
//!
//! // Score the historical fit
//! let accuracy = AccuracyEvaluator::evaluate(&output.predictions)?;
//! println!("{}", accuracy);
//! # Ok(())
//! # }
//! ```

pub mod accuracy;
pub mod aggregator;
pub mod calendar;
pub mod components;
pub mod config;
pub mod data;
pub mod error;
pub mod forecaster;
pub mod frame;
pub mod metrics;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod records;

// Re-export commonly used types
pub use crate::accuracy::{AccuracyEvaluator, AccuracySummary};
pub use crate::aggregator::{EntityFailure, ForecastAggregator, ForecastOutput};
pub use crate::components::ComponentExtractor;
pub use crate::config::PipelineConfig;
pub use crate::data::{EntityKey, FeatureLoader, FeatureRow, FeatureTable};
pub use crate::error::{ForecastError, Result};
pub use crate::forecaster::EntityForecaster;
pub use crate::frame::{RegressorFrameBuilder, TrainingFrame, DEFAULT_HORIZON_DAYS};
pub use crate::models::{AdditiveRegression, FittedRegression, RegressionModel};
pub use crate::records::{ComponentRecord, PredictionRecord};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
