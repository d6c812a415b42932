//! Output row types shared by the prediction and component tables

use crate::data::EntityKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One predicted date for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub date: NaiveDate,
    pub predicted_qty: f64,
    /// Observed quantity; only present on historical rows with an observation
    pub actual_qty: Option<f64>,
    pub store_id: String,
    pub product_id: String,
    #[serde(with = "int_flag")]
    pub is_future: bool,
}

impl PredictionRecord {
    pub fn entity(&self) -> EntityKey {
        EntityKey::new(self.store_id.clone(), self.product_id.clone())
    }
}

/// One date of an entity's additive decomposition
///
/// The regressor columns hold each regressor's contribution to
/// `predicted_qty`, not the regressor values themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub date: NaiveDate,
    pub predicted_qty: f64,
    pub trend: f64,
    #[serde(rename = "weekly")]
    pub weekly_seasonal: f64,
    pub temp_max: f64,
    pub temp_min: f64,
    pub rain: f64,
    pub dow: f64,
    pub holiday_flag: f64,
    pub store_id: String,
    pub product_id: String,
    #[serde(with = "int_flag")]
    pub is_future: bool,
}

impl ComponentRecord {
    pub fn entity(&self) -> EntityKey {
        EntityKey::new(self.store_id.clone(), self.product_id.clone())
    }
}

/// Booleans written as `0`/`1`
mod int_flag {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim() {
            "1" | "1.0" | "true" | "True" => Ok(true),
            "0" | "0.0" | "false" | "False" => Ok(false),
            other => Err(de::Error::custom(format!("invalid is_future flag '{}'", other))),
        }
    }
}
