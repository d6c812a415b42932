//! Regressor-aligned frames for one entity
//!
//! Converts feature rows into the canonical training schema (`ds`, `y` and the
//! five named regressors) and rebuilds complete regressor rows for any date
//! the model asks about, historical or future. Every fill in this module looks
//! backwards only: a missing value is replaced by the last value observed
//! strictly before it, never by a later one.

use crate::calendar;
use crate::data::FeatureRow;
use crate::error::{ForecastError, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical regressor names, in model column order
pub const REGRESSOR_NAMES: [&str; 5] = ["temp_max", "temp_min", "rain", "dow", "holiday_flag"];

/// Default forecast horizon in days
pub const DEFAULT_HORIZON_DAYS: usize = 30;

/// One complete row of exogenous regressors
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Regressors {
    pub temp_max: f64,
    pub temp_min: f64,
    pub rain: f64,
    pub dow: f64,
    pub holiday_flag: f64,
}

impl Regressors {
    /// Values in `REGRESSOR_NAMES` order
    pub fn values(&self) -> [f64; 5] {
        [
            self.temp_max,
            self.temp_min,
            self.rain,
            self.dow,
            self.holiday_flag,
        ]
    }

    /// Build from values in `REGRESSOR_NAMES` order
    pub fn from_values(values: [f64; 5]) -> Self {
        Self {
            temp_max: values[0],
            temp_min: values[1],
            rain: values[2],
            dow: values[3],
            holiday_flag: values[4],
        }
    }

    /// Look a regressor up by its canonical name
    pub fn get(&self, name: &str) -> Option<f64> {
        REGRESSOR_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values()[i])
    }

    pub fn is_finite(&self) -> bool {
        self.values().iter().all(|v| v.is_finite())
    }

    /// Weather carried forward, calendar recomputed for `date`, no holiday
    fn persisted(last: &Regressors, date: NaiveDate) -> Self {
        Self {
            temp_max: last.temp_max,
            temp_min: last.temp_min,
            rain: last.rain,
            dow: calendar::day_of_week(date) as f64,
            holiday_flag: 0.0,
        }
    }
}

/// One observation of the training frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub ds: NaiveDate,
    /// Target quantity
    pub y: f64,
    pub regressors: Regressors,
}

/// Per-entity training data, strictly increasing in `ds`
///
/// Calendar days missing from the source stay missing here; the frame is not
/// densified. A model that reconstructs a denser historical calendar gets the
/// missing days back through [`RegressorFrameBuilder::align_historical`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrainingFrame {
    rows: Vec<TrainingRow>,
}

impl TrainingFrame {
    /// Create a frame, sorting by date and rejecting duplicate dates
    pub fn new(mut rows: Vec<TrainingRow>) -> Result<Self> {
        rows.sort_by_key(|r| r.ds);
        if let Some(pair) = rows.windows(2).find(|w| w[0].ds == w[1].ds) {
            return Err(ForecastError::DataError(format!(
                "Duplicate training date {}",
                pair[0].ds
            )));
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[TrainingRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.ds).collect()
    }

    pub fn targets(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.y).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.ds)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.ds)
    }

    /// Last observed regressor row; the persistence source for the future
    pub fn last_regressors(&self) -> Option<Regressors> {
        self.rows.last().map(|r| r.regressors)
    }

    /// Observed target on `date`, if that date is part of the frame
    pub fn actual(&self, date: NaiveDate) -> Option<f64> {
        self.rows
            .binary_search_by_key(&date, |r| r.ds)
            .ok()
            .map(|i| self.rows[i].y)
    }

    /// Last row strictly before `date`
    fn last_before(&self, date: NaiveDate) -> Option<&TrainingRow> {
        let idx = self.rows.partition_point(|r| r.ds < date);
        idx.checked_sub(1).map(|i| &self.rows[i])
    }
}

/// Complete regressor rows for an ordered date sequence
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegressorFrame {
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<Regressors>,
}

impl RegressorFrame {
    pub fn new(dates: Vec<NaiveDate>, rows: Vec<Regressors>) -> Result<Self> {
        if dates.len() != rows.len() {
            return Err(ForecastError::AlignmentError(format!(
                "{} dates but {} regressor rows",
                dates.len(),
                rows.len()
            )));
        }
        Ok(Self { dates, rows })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Append `other` after this frame
    pub fn concat(mut self, other: RegressorFrame) -> Self {
        self.dates.extend(other.dates);
        self.rows.extend(other.rows);
        self
    }

    /// Column of one regressor by canonical name
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = REGRESSOR_NAMES.iter().position(|n| *n == name)?;
        Some(self.rows.iter().map(|r| r.values()[idx]).collect())
    }
}

/// Training frame reindexed onto a model date index; unmatched dates are `None`
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRegressors {
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<Option<Regressors>>,
}

impl AlignedRegressors {
    /// Number of dates with no source row
    pub fn gap_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_none()).count()
    }
}

/// Builds training frames and aligned regressor frames for one entity
#[derive(Debug, Clone, Copy, Default)]
pub struct RegressorFrameBuilder;

impl RegressorFrameBuilder {
    /// Map an entity's feature rows onto the canonical training schema
    ///
    /// temp_max ← temperature_2m_max, temp_min ← temperature_2m_min,
    /// rain ← precipitation_sum, dow ← day_of_week, holiday_flag ← is_holiday.
    /// A missing weather cell takes the entity's last earlier observation; a
    /// missing cell with nothing before it fails the entity.
    pub fn training_frame(rows: &[FeatureRow]) -> Result<TrainingFrame> {
        let mut sorted: Vec<&FeatureRow> = rows.iter().collect();
        sorted.sort_by_key(|r| r.date);

        let mut last_seen: [Option<f64>; 3] = [None; 3];
        let mut out = Vec::with_capacity(sorted.len());

        for row in sorted {
            let observed = [
                row.weather.temp_max,
                row.weather.temp_min,
                row.weather.precipitation_sum,
            ];
            let mut weather = [0.0; 3];
            for (i, value) in observed.iter().enumerate() {
                if let Some(v) = value.filter(|v| v.is_finite()) {
                    last_seen[i] = Some(v);
                }
                weather[i] = last_seen[i].ok_or_else(|| {
                    ForecastError::FitError(format!(
                        "Regressor {} missing on {} for {} with no earlier observation",
                        REGRESSOR_NAMES[i],
                        row.date,
                        row.entity()
                    ))
                })?;
            }

            out.push(TrainingRow {
                ds: row.date,
                y: row.daily_qty as f64,
                regressors: Regressors {
                    temp_max: weather[0],
                    temp_min: weather[1],
                    rain: weather[2],
                    dow: row.calendar.day_of_week as f64,
                    holiday_flag: if row.is_holiday { 1.0 } else { 0.0 },
                },
            });
        }

        TrainingFrame::new(out)
    }

    /// Reindex the training frame onto `dates`, leaving unmatched dates empty
    pub fn align_historical(frame: &TrainingFrame, dates: &[NaiveDate]) -> AlignedRegressors {
        let by_date: BTreeMap<NaiveDate, Regressors> =
            frame.rows().iter().map(|r| (r.ds, r.regressors)).collect();

        AlignedRegressors {
            dates: dates.to_vec(),
            rows: dates.iter().map(|d| by_date.get(d).copied()).collect(),
        }
    }

    /// Fill alignment gaps from the last training row before each gap
    ///
    /// Weather persists from that row, dow is recomputed from the gap date and
    /// holiday_flag is 0. A gap before the first training row cannot be filled
    /// without looking ahead and is an alignment error.
    pub fn fill_gaps(aligned: AlignedRegressors, frame: &TrainingFrame) -> Result<RegressorFrame> {
        let mut rows = Vec::with_capacity(aligned.rows.len());

        for (date, row) in aligned.dates.iter().zip(aligned.rows) {
            let filled = match row {
                Some(r) => r,
                None => {
                    let prior = frame.last_before(*date).ok_or_else(|| {
                        ForecastError::AlignmentError(format!(
                            "No observation precedes historical date {}",
                            date
                        ))
                    })?;
                    Regressors::persisted(&prior.regressors, *date)
                }
            };
            rows.push(filled);
        }

        RegressorFrame::new(aligned.dates, rows)
    }

    /// Aligned and gap-filled regressors for a historical date index
    pub fn historical(frame: &TrainingFrame, dates: &[NaiveDate]) -> Result<RegressorFrame> {
        Self::fill_gaps(Self::align_historical(frame, dates), frame)
    }

    /// The `horizon` calendar days following `last`
    ///
    /// A horizon reaching past the last representable date is an alignment error.
    pub fn future_dates(last: NaiveDate, horizon: usize) -> Result<Vec<NaiveDate>> {
        let out_of_range = || {
            ForecastError::AlignmentError(format!(
                "A {} day horizon after {} is out of the calendar range",
                horizon, last
            ))
        };
        last.checked_add_days(Days::new(horizon as u64))
            .ok_or_else(out_of_range)?;

        (1..=horizon as u64)
            .map(|d| last.checked_add_days(Days::new(d)))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(out_of_range)
    }

    /// Regressors for future dates under the persistence assumption
    ///
    /// temp_max, temp_min and rain hold the entity's last observed values,
    /// dow comes from each future date and holiday_flag is 0 because future
    /// holidays are not looked up.
    pub fn project_future(frame: &TrainingFrame, dates: &[NaiveDate]) -> Result<RegressorFrame> {
        let last_row = frame.rows().last().ok_or_else(|| {
            ForecastError::AlignmentError("Cannot project regressors from an empty frame".to_string())
        })?;

        let mut expected = last_row.ds;
        for date in dates {
            expected = expected.succ_opt().ok_or_else(|| {
                ForecastError::AlignmentError(format!(
                    "No calendar day follows {}",
                    expected
                ))
            })?;
            if *date != expected {
                return Err(ForecastError::AlignmentError(format!(
                    "Future date {} out of sequence; expected {} after training end {}",
                    date, expected, last_row.ds
                )));
            }
        }

        let rows = dates
            .iter()
            .map(|d| Regressors::persisted(&last_row.regressors, *d))
            .collect();

        RegressorFrame::new(dates.to_vec(), rows)
    }
}
