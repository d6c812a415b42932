//! Calendar attributes derived from a sales date

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ForecastError;

/// Retail season, following the Indian climate calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Summer,
    Monsoon,
    #[serde(rename = "Post-monsoon")]
    PostMonsoon,
}

impl Season {
    /// Map a month (1-12) onto its season
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Summer,
            6..=9 => Season::Monsoon,
            _ => Season::PostMonsoon,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Summer => "Summer",
            Season::Monsoon => "Monsoon",
            Season::PostMonsoon => "Post-monsoon",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "winter" => Ok(Season::Winter),
            "summer" => Ok(Season::Summer),
            "monsoon" => Ok(Season::Monsoon),
            "post-monsoon" | "post_monsoon" | "postmonsoon" => Ok(Season::PostMonsoon),
            other => Err(ForecastError::SchemaError(format!(
                "Unknown season '{}'",
                other
            ))),
        }
    }
}

/// Day of week with Monday = 0 and Sunday = 6
pub fn day_of_week(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_monday()
}

/// Saturday or Sunday
pub fn is_weekend(date: NaiveDate) -> bool {
    day_of_week(date) >= 5
}

/// Calendar quarter (1-4) of a month (1-12)
pub fn quarter(month: u32) -> u32 {
    (month.clamp(1, 12) - 1) / 3 + 1
}

/// Calendar attributes carried on every feature row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarAttributes {
    /// Day of week (0=Monday, 6=Sunday)
    pub day_of_week: u32,
    /// Is weekend (Saturday or Sunday)
    pub is_weekend: bool,
    /// Month (1-12)
    pub month: u32,
    /// Quarter (1-4)
    pub quarter: u32,
    pub year: i32,
    pub season: Season,
}

impl CalendarAttributes {
    /// Derive every attribute from the date alone
    pub fn for_date(date: NaiveDate) -> Self {
        let month = date.month();
        Self {
            day_of_week: day_of_week(date),
            is_weekend: is_weekend(date),
            month,
            quarter: quarter(month),
            year: date.year(),
            season: Season::from_month(month),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_of_week_starts_monday() {
        // 2023-01-02 was a Monday
        assert_eq!(day_of_week(date(2023, 1, 2)), 0);
        assert_eq!(day_of_week(date(2023, 1, 8)), 6);
        assert!(is_weekend(date(2023, 1, 7)));
        assert!(!is_weekend(date(2023, 1, 6)));
    }

    #[test]
    fn test_season_calculation() {
        assert_eq!(Season::from_month(1), Season::Winter);
        assert_eq!(Season::from_month(12), Season::Winter);
        assert_eq!(Season::from_month(4), Season::Summer);
        assert_eq!(Season::from_month(7), Season::Monsoon);
        assert_eq!(Season::from_month(9), Season::Monsoon);
        assert_eq!(Season::from_month(10), Season::PostMonsoon);
        assert_eq!(Season::from_month(11), Season::PostMonsoon);
    }

    #[test]
    fn test_season_parsing() {
        assert_eq!("Post-monsoon".parse::<Season>().unwrap(), Season::PostMonsoon);
        assert_eq!(" winter ".parse::<Season>().unwrap(), Season::Winter);
        assert_eq!(Season::PostMonsoon.to_string(), "Post-monsoon");
        assert!("Spring".parse::<Season>().is_err());
    }

    #[test]
    fn test_calendar_attributes() {
        let attrs = CalendarAttributes::for_date(date(2023, 8, 15));
        assert_eq!(attrs.day_of_week, 1);
        assert!(!attrs.is_weekend);
        assert_eq!(attrs.month, 8);
        assert_eq!(attrs.quarter, 3);
        assert_eq!(attrs.year, 2023);
        assert_eq!(attrs.season, Season::Monsoon);
    }
}
