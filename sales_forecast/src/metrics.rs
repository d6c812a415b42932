//! Error metrics for evaluating forecasts against observed quantities

use crate::error::{ForecastError, Result};
use statrs::statistics::Statistics;

fn check_pairs(forecast: &[f64], actual: &[f64]) -> Result<()> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(ForecastError::DataError(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }
    Ok(())
}

/// Mean Absolute Error
pub fn mean_absolute_error(forecast: &[f64], actual: &[f64]) -> Result<f64> {
    check_pairs(forecast, actual)?;
    Ok(forecast
        .iter()
        .zip(actual)
        .map(|(f, a)| (a - f).abs())
        .mean())
}

/// Root Mean Squared Error
pub fn root_mean_squared_error(forecast: &[f64], actual: &[f64]) -> Result<f64> {
    check_pairs(forecast, actual)?;
    let mse = forecast
        .iter()
        .zip(actual)
        .map(|(f, a)| (a - f).powi(2))
        .mean();
    Ok(mse.sqrt())
}

/// Mean Absolute Percentage Error, in percent
///
/// Pairs whose actual is zero are left out of both the sum and the count.
/// Returns `None` when no pair has a non-zero actual.
pub fn mean_absolute_percentage_error(forecast: &[f64], actual: &[f64]) -> Result<Option<f64>> {
    check_pairs(forecast, actual)?;
    let terms: Vec<f64> = forecast
        .iter()
        .zip(actual)
        .filter(|(_, a)| **a != 0.0)
        .map(|(f, a)| ((a - f) / a).abs() * 100.0)
        .collect();

    if terms.is_empty() {
        return Ok(None);
    }
    Ok(Some(terms.mean()))
}
