//! Writers and readers for the output tables

use crate::accuracy::AccuracySummary;
use crate::aggregator::EntityFailure;
use crate::error::Result;
use crate::records::{ComponentRecord, PredictionRecord};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Header of the combined accuracy report
pub const ACCURACY_HEADER: [&str; 5] = ["Metric", "Value", "store_id", "product_id", "MAPE (%)"];

fn write_records<T: Serialize, P: AsRef<Path>>(path: P, records: &[T], header: &[&str]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    // Written by hand so an empty table still carries its header
    writer.write_record(header)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the predictions table
pub fn write_predictions<P: AsRef<Path>>(path: P, records: &[PredictionRecord]) -> Result<()> {
    write_records(
        path,
        records,
        &["date", "predicted_qty", "actual_qty", "store_id", "product_id", "is_future"],
    )
}

/// Write the components table
pub fn write_components<P: AsRef<Path>>(path: P, records: &[ComponentRecord]) -> Result<()> {
    write_records(
        path,
        records,
        &[
            "date",
            "predicted_qty",
            "trend",
            "weekly",
            "temp_max",
            "temp_min",
            "rain",
            "dow",
            "holiday_flag",
            "store_id",
            "product_id",
            "is_future",
        ],
    )
}

/// Read a predictions table written by [`write_predictions`]
pub fn read_predictions<P: AsRef<Path>>(path: P) -> Result<Vec<PredictionRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

/// One line of the accuracy report; floats go through the same serializer
/// as the prediction tables
#[derive(Debug, Default, Serialize)]
struct AccuracyRow<'a> {
    metric: &'a str,
    value: Option<f64>,
    store_id: &'a str,
    product_id: &'a str,
    mape: Option<f64>,
}

/// Write global metrics, a blank separator row, then per-entity MAPE
pub fn write_accuracy_report<P: AsRef<Path>>(path: P, summary: &AccuracySummary) -> Result<()> {
    let global = &summary.global;
    let mut rows: Vec<AccuracyRow> = [
        ("MAE", Some(global.mae)),
        ("RMSE", Some(global.rmse)),
        ("MAPE (%)", global.mape),
    ]
    .into_iter()
    .map(|(metric, value)| AccuracyRow {
        metric,
        value,
        ..AccuracyRow::default()
    })
    .collect();

    rows.push(AccuracyRow::default());

    rows.extend(summary.entities.iter().map(|entity| AccuracyRow {
        store_id: &entity.store_id,
        product_id: &entity.product_id,
        mape: entity.mape,
        ..AccuracyRow::default()
    }));

    write_records(path, &rows, &ACCURACY_HEADER)
}

/// Write the failure summary as a JSON array
pub fn write_failures<P: AsRef<Path>>(path: P, failures: &[EntityFailure]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, failures)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
