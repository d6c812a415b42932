//! Daily feature table handling for forecasting
//!
//! The feature table is produced by the upstream ETL step: one row per
//! (date, store, product) with sales, calendar, holiday and weather columns.
//! This module loads it, validates its schema and groups it per entity.

use crate::calendar::{CalendarAttributes, Season};
use crate::error::{ForecastError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Date column of the feature table
pub const DATE_COLUMN: &str = "transaction_date";

/// Columns that must be present before any entity is processed
pub const REQUIRED_COLUMNS: [&str; 9] = [
    DATE_COLUMN,
    "store_id",
    "product_id",
    "daily_qty",
    "temperature_2m_max",
    "temperature_2m_min",
    "precipitation_sum",
    "day_of_week",
    "is_holiday",
];

/// Identifier columns, always read as text
pub const ID_COLUMNS: [&str; 2] = ["store_id", "product_id"];

/// Identifier of one independently forecast (store, product) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub store_id: String,
    pub product_id: String,
}

impl EntityKey {
    pub fn new(store_id: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            product_id: product_id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store={} product={}", self.store_id, self.product_id)
    }
}

impl Ord for EntityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(&self.store_id, &other.store_id)
            .then_with(|| natural_cmp(&self.product_id, &other.product_id))
    }
}

impl PartialOrd for EntityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Numeric ids compare as numbers and sort before textual ids
fn natural_cmp(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Daily weather observations; absent when the weather lookup failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub precipitation_sum: Option<f64>,
    pub windspeed_max: Option<f64>,
}

/// One row of the daily feature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub store_id: String,
    pub store_location: Option<String>,
    pub product_id: String,
    /// Units sold that day
    pub daily_qty: u64,
    pub daily_sales_amount: Option<f64>,
    pub transactions_count: Option<u64>,
    pub calendar: CalendarAttributes,
    pub is_holiday: bool,
    pub holiday_name: Option<String>,
    pub weather: Weather,
}

impl FeatureRow {
    /// Build a row with calendar attributes derived from the date
    pub fn new(
        date: NaiveDate,
        store_id: impl Into<String>,
        product_id: impl Into<String>,
        daily_qty: u64,
    ) -> Self {
        Self {
            date,
            store_id: store_id.into(),
            store_location: None,
            product_id: product_id.into(),
            daily_qty,
            daily_sales_amount: None,
            transactions_count: None,
            calendar: CalendarAttributes::for_date(date),
            is_holiday: false,
            holiday_name: None,
            weather: Weather::default(),
        }
    }

    /// Set the weather observations
    pub fn with_weather(mut self, temp_max: f64, temp_min: f64, precipitation_sum: f64) -> Self {
        self.weather.temp_max = Some(temp_max);
        self.weather.temp_min = Some(temp_min);
        self.weather.precipitation_sum = Some(precipitation_sum);
        self
    }

    /// Mark the row as a named holiday
    pub fn with_holiday(mut self, name: &str) -> Self {
        self.is_holiday = true;
        self.holiday_name = Some(name.to_string());
        self
    }

    pub fn entity(&self) -> EntityKey {
        EntityKey::new(self.store_id.clone(), self.product_id.clone())
    }
}

/// The daily per-entity feature table, unique per (date, store_id, product_id)
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Create a table, rejecting duplicate (date, store_id, product_id) rows
    pub fn new(rows: Vec<FeatureRow>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            if !seen.insert((row.date, row.entity())) {
                return Err(ForecastError::SchemaError(format!(
                    "Duplicate feature row for {} on {}",
                    row.entity(),
                    row.date
                )));
            }
        }

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct entities sorted by (store_id, product_id)
    pub fn entities(&self) -> Vec<EntityKey> {
        self.partition().into_keys().collect()
    }

    /// Rows grouped per entity, each group sorted by date
    pub fn partition(&self) -> BTreeMap<EntityKey, Vec<FeatureRow>> {
        let mut groups: BTreeMap<EntityKey, Vec<FeatureRow>> = BTreeMap::new();
        for row in &self.rows {
            groups.entry(row.entity()).or_default().push(row.clone());
        }
        for rows in groups.values_mut() {
            rows.sort_by_key(|r| r.date);
        }
        groups
    }

    /// First and last date in the table
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.rows.iter().map(|r| r.date).min()?;
        let last = self.rows.iter().map(|r| r.date).max()?;
        Some((first, last))
    }
}

/// Data loader for the daily feature table
#[derive(Debug)]
pub struct FeatureLoader;

impl FeatureLoader {
    /// Load the feature table from a CSV file
    ///
    /// Identifier columns are read as text so that `"001"` and `"1"` stay
    /// distinct entities.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<FeatureTable> {
        let path = path.as_ref();
        let headers = ::csv::Reader::from_path(path)?.headers()?.clone();
        let mut text_ids = Schema::new();
        for name in ID_COLUMNS {
            if headers.iter().any(|h| h == name) {
                text_ids.with_column(name.into(), DataType::Utf8);
            }
        }

        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .with_dtypes(Some(Arc::new(text_ids)))
            .finish()?;

        Self::from_dataframe(df)
    }

    /// Load the feature table from a Parquet file
    pub fn from_parquet<P: AsRef<Path>>(path: P) -> Result<FeatureTable> {
        let file = File::open(path)?;
        let df = ParquetReader::new(file).finish()?;

        Self::from_dataframe(df)
    }

    /// Create the feature table from an existing DataFrame
    pub fn from_dataframe(df: DataFrame) -> Result<FeatureTable> {
        check_required_columns(&df.get_column_names())?;

        let height = df.height();
        let dates = text_column(&df, DATE_COLUMN)?;
        let store_ids = text_column(&df, "store_id")?;
        let product_ids = text_column(&df, "product_id")?;
        let quantities = f64_column(&df, "daily_qty")?;
        let temp_max = f64_column(&df, "temperature_2m_max")?;
        let temp_min = f64_column(&df, "temperature_2m_min")?;
        let precipitation = f64_column(&df, "precipitation_sum")?;
        let day_of_week = f64_column(&df, "day_of_week")?;
        let is_holiday = flag_column(&df, "is_holiday")?;

        let store_locations = optional(&df, "store_location", text_column)?;
        let sales_amounts = optional(&df, "daily_sales_amount", f64_column)?;
        let transaction_counts = optional(&df, "transactions_count", f64_column)?;
        let weekend_flags = optional(&df, "is_weekend", flag_column)?;
        let months = optional(&df, "month", f64_column)?;
        let quarters = optional(&df, "quarter", f64_column)?;
        let years = optional(&df, "year", f64_column)?;
        let seasons = optional(&df, "season", text_column)?;
        let holiday_names = optional(&df, "holiday_name", text_column)?;
        let windspeed = optional(&df, "windspeed_10m_max", f64_column)?;

        let mut rows = Vec::with_capacity(height);
        for i in 0..height {
            let raw_date = required(&dates[i], DATE_COLUMN, i)?;
            let date = parse_date(raw_date).ok_or_else(|| {
                ForecastError::SchemaError(format!(
                    "Invalid {} '{}' at row {}",
                    DATE_COLUMN, raw_date, i
                ))
            })?;

            let store_id = required(&store_ids[i], "store_id", i)?.trim().to_string();
            let product_id = required(&product_ids[i], "product_id", i)?.trim().to_string();
            let daily_qty = whole_number(*required(&quantities[i], "daily_qty", i)?, "daily_qty", i)?;

            let dow = whole_number(*required(&day_of_week[i], "day_of_week", i)?, "day_of_week", i)?;

            let mut calendar = CalendarAttributes::for_date(date);
            check_calendar("day_of_week", dow as i64, calendar.day_of_week as i64, date, i)?;
            if let Some(flag) = cell(&weekend_flags, i) {
                check_calendar("is_weekend", flag as i64, calendar.is_weekend as i64, date, i)?;
            }
            if let Some(month) = cell(&months, i) {
                let month = whole_number(month, "month", i)?;
                check_calendar("month", month as i64, calendar.month as i64, date, i)?;
            }
            if let Some(quarter) = cell(&quarters, i) {
                let quarter = whole_number(quarter, "quarter", i)?;
                check_calendar("quarter", quarter as i64, calendar.quarter as i64, date, i)?;
            }
            if let Some(year) = cell(&years, i) {
                let year = whole_number(year, "year", i)?;
                check_calendar("year", year as i64, calendar.year as i64, date, i)?;
            }
            if let Some(season) = cell(&seasons, i) {
                calendar.season = season.parse::<Season>()?;
            }

            let transactions_count = match cell(&transaction_counts, i) {
                Some(count) => Some(whole_number(count, "transactions_count", i)?),
                None => None,
            };

            rows.push(FeatureRow {
                date,
                store_id,
                store_location: cell(&store_locations, i),
                product_id,
                daily_qty,
                daily_sales_amount: cell(&sales_amounts, i),
                transactions_count,
                calendar,
                is_holiday: *required(&is_holiday[i], "is_holiday", i)?,
                holiday_name: cell(&holiday_names, i).filter(|name| !name.is_empty()),
                weather: Weather {
                    temp_max: temp_max[i],
                    temp_min: temp_min[i],
                    precipitation_sum: precipitation[i],
                    windspeed_max: cell(&windspeed, i),
                },
            });
        }

        FeatureTable::new(rows)
    }
}

/// Fail with a schema error naming every absent required column
pub fn check_required_columns(columns: &[&str]) -> Result<()> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|required| !columns.contains(required))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ForecastError::SchemaError(format!(
            "Missing required column(s): {}",
            missing.join(", ")
        )))
    }
}

/// Parse `YYYY-MM-DD`, or a timestamp whose date part is `YYYY-MM-DD`
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            raw.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })
}

fn required<'a, T>(value: &'a Option<T>, column: &str, row: usize) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| {
        ForecastError::SchemaError(format!("Null value in column '{}' at row {}", column, row))
    })
}

fn cell<T: Clone>(column: &Option<Vec<Option<T>>>, row: usize) -> Option<T> {
    column.as_ref().and_then(|values| values[row].clone())
}

fn whole_number(value: f64, column: &str, row: usize) -> Result<u64> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(ForecastError::SchemaError(format!(
            "Column '{}' must hold a non-negative integer, found {} at row {}",
            column, value, row
        )));
    }
    Ok(value as u64)
}

/// Calendar columns must agree with the attributes derived from the date
fn check_calendar(column: &str, found: i64, expected: i64, date: NaiveDate, row: usize) -> Result<()> {
    if found != expected {
        return Err(ForecastError::SchemaError(format!(
            "Column '{}' holds {} at row {} but {} implies {}",
            column, found, row, date, expected
        )));
    }
    Ok(())
}

fn optional<T>(
    df: &DataFrame,
    name: &str,
    read: fn(&DataFrame, &str) -> Result<Vec<Option<T>>>,
) -> Result<Option<Vec<Option<T>>>> {
    if df.get_column_names().contains(&name) {
        read(df, name).map(Some)
    } else {
        Ok(None)
    }
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name).map_err(|e| {
        ForecastError::SchemaError(format!("Column '{}' not found: {}", name, e))
    })
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = column(df, name)?.cast(&DataType::Float64).map_err(|e| {
        ForecastError::SchemaError(format!("Column '{}' is not numeric: {}", name, e))
    })?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}

fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = column(df, name)?.cast(&DataType::Utf8)?;
    let values = series
        .utf8()?
        .into_iter()
        .map(|value| value.map(|s| s.to_string()))
        .collect();
    Ok(values)
}

fn flag_column(df: &DataFrame, name: &str) -> Result<Vec<Option<bool>>> {
    let series = column(df, name)?;
    match series.dtype() {
        DataType::Boolean => Ok(series.bool()?.into_iter().collect()),
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .map(|value| value.map(|s| parse_flag(name, s)).transpose())
            .collect(),
        _ => Ok(f64_column(df, name)?
            .into_iter()
            .map(|value| value.map(|v| v != 0.0))
            .collect()),
    }
}

fn parse_flag(column: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "1.0" | "true" | "yes" => Ok(true),
        "0" | "0.0" | "false" | "no" => Ok(false),
        other => Err(ForecastError::SchemaError(format!(
            "Column '{}' holds '{}', expected a 0/1 or true/false flag",
            column, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_frame() -> DataFrame {
        df!(
            "transaction_date" => &["2023-01-02", "2023-01-01", "2023-01-01"],
            "store_id" => &[1i64, 1, 2],
            "store_location" => &["Delhi", "Delhi", "Cochin"],
            "product_id" => &[10i64, 10, 10],
            "daily_qty" => &[4i64, 3, 7],
            "temperature_2m_max" => &[Some(21.5), Some(20.0), None],
            "temperature_2m_min" => &[Some(8.0), Some(7.5), None],
            "precipitation_sum" => &[Some(0.0), Some(1.2), None],
            "day_of_week" => &[0i64, 6, 6],
            "is_holiday" => &[0i64, 1, 1],
            "holiday_name" => &[None, Some("New Year"), Some("New Year")],
            "season" => &["Winter", "Winter", "Winter"]
        )
        .unwrap()
    }

    #[test]
    fn test_from_dataframe_reads_rows() {
        let table = FeatureLoader::from_dataframe(sample_frame()).unwrap();
        assert_eq!(table.len(), 3);

        let first = &table.rows()[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2023, 1, 2).unwrap());
        assert_eq!(first.store_id, "1");
        assert_eq!(first.product_id, "10");
        assert_eq!(first.daily_qty, 4);
        assert_eq!(first.store_location.as_deref(), Some("Delhi"));
        assert_eq!(first.weather.temp_max, Some(21.5));
        assert!(!first.is_holiday);
        assert_eq!(first.holiday_name, None);

        let cochin = &table.rows()[2];
        assert!(cochin.is_holiday);
        assert_eq!(cochin.weather.temp_max, None);
        assert_eq!(cochin.calendar.season, Season::Winter);
    }

    #[test]
    fn test_missing_required_column_is_schema_error() {
        let df = sample_frame().drop("precipitation_sum").unwrap();
        let err = FeatureLoader::from_dataframe(df).unwrap_err();
        match err {
            ForecastError::SchemaError(msg) => assert!(msg.contains("precipitation_sum")),
            other => panic!("Expected SchemaError, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_rows_rejected() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let rows = vec![FeatureRow::new(date, "1", "1", 2), FeatureRow::new(date, "1", "1", 3)];
        assert!(matches!(
            FeatureTable::new(rows),
            Err(ForecastError::SchemaError(_))
        ));
    }

    #[test]
    fn test_partition_sorts_entities_and_dates() {
        let table = FeatureLoader::from_dataframe(sample_frame()).unwrap();
        let groups = table.partition();
        let keys: Vec<&EntityKey> = groups.keys().collect();
        assert_eq!(keys, vec![&EntityKey::new("1", "10"), &EntityKey::new("2", "10")]);

        let dates: Vec<NaiveDate> = groups[&EntityKey::new("1", "10")]
            .iter()
            .map(|r| r.date)
            .collect();
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_entity_ordering_is_natural() {
        let mut keys = vec![
            EntityKey::new("10", "1"),
            EntityKey::new("2", "1"),
            EntityKey::new("Delhi", "1"),
            EntityKey::new("2", "03"),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                EntityKey::new("2", "1"),
                EntityKey::new("2", "03"),
                EntityKey::new("10", "1"),
                EntityKey::new("Delhi", "1"),
            ]
        );
    }

    #[test]
    fn test_parquet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.parquet");
        let mut df = sample_frame();
        ParquetWriter::new(File::create(&path).unwrap())
            .finish(&mut df)
            .unwrap();

        let table = FeatureLoader::from_parquet(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.entities().len(), 2);
    }

    #[test]
    fn test_sunday_first_day_of_week_rejected() {
        // 2023-01-02 is a Monday; a Sunday = 0 export would write 1
        let mut df = sample_frame();
        df.with_column(Series::new("day_of_week", &[1i64, 0, 0])).unwrap();
        match FeatureLoader::from_dataframe(df).unwrap_err() {
            ForecastError::SchemaError(msg) => {
                assert!(msg.contains("day_of_week"));
                assert!(msg.contains("2023-01-02"));
            }
            other => panic!("Expected SchemaError, got {:?}", other),
        }
    }

    #[test]
    fn test_calendar_columns_checked_against_date() {
        let mut df = sample_frame();
        df.with_column(Series::new("month", &[2i64, 1, 1])).unwrap();
        assert!(matches!(
            FeatureLoader::from_dataframe(df),
            Err(ForecastError::SchemaError(_))
        ));

        let mut df = sample_frame();
        df.with_column(Series::new("is_weekend", &[0i64, 1, 1])).unwrap();
        df.with_column(Series::new("month", &[1i64, 1, 1])).unwrap();
        df.with_column(Series::new("quarter", &[1i64, 1, 1])).unwrap();
        df.with_column(Series::new("year", &[2023i64, 2023, 2023])).unwrap();
        let table = FeatureLoader::from_dataframe(df).unwrap();
        assert_eq!(table.rows()[1].calendar.day_of_week, 6);
        assert!(table.rows()[1].calendar.is_weekend);
    }

    #[test]
    fn test_csv_ids_keep_leading_zeros() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        std::fs::write(
            &path,
            "transaction_date,store_id,product_id,daily_qty,temperature_2m_max,temperature_2m_min,precipitation_sum,day_of_week,is_holiday\n\
             2023-01-02,01,001,4,21.0,8.0,0.0,0,0\n\
             2023-01-02,1,001,5,21.0,8.0,0.0,0,0\n",
        )
        .unwrap();

        let table = FeatureLoader::from_csv(&path).unwrap();
        assert_eq!(
            table.entities(),
            vec![EntityKey::new("01", "001"), EntityKey::new("1", "001")]
        );
    }

    #[test]
    fn test_parse_date_forms() {
        let expected = NaiveDate::from_ymd_opt(2023, 3, 4);
        assert_eq!(parse_date("2023-03-04"), expected);
        assert_eq!(parse_date("2023-03-04 00:00:00"), expected);
        assert_eq!(parse_date("2023-03-04T00:00:00.000"), expected);
        assert_eq!(parse_date("04-03-2023"), None);
    }
}
