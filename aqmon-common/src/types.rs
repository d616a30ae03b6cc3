//! Typed measurement records and summary row shapes
//!
//! Rows coming back from the store are decoded into these fixed-field
//! records at the adapter boundary. Aggregate row shapes mirror the
//! store-side GROUP BY queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One pollutant measurement event
///
/// Produced by the external ingestion pipeline; immutable and read-only
/// here. `aqi` and `category` are independently nullable: the stored
/// category label comes from the ingestion pipeline, not from re-applying
/// the classifier breakpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Reading {
    /// Opaque unique identifier
    pub id: String,
    /// Measurement timestamp (UTC)
    pub recorded_at: DateTime<Utc>,
    pub city: String,
    /// Region / state code (e.g. "TX")
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Pollutant code from an open set (e.g. "O3", "PM2.5")
    pub pollutant: String,
    /// AQI value; non-negative when present
    pub aqi: Option<f64>,
    /// Category label assigned at ingestion time
    pub category: Option<String>,
}

/// Per-region aggregate row (non-null AQI readings only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RegionSummary {
    pub region: String,
    pub reading_count: i64,
    pub mean_aqi: f64,
    pub max_aqi: f64,
    pub min_aqi: f64,
}

/// Per-pollutant aggregate row (non-null AQI readings only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PollutantSummary {
    pub pollutant: String,
    pub reading_count: i64,
    pub mean_aqi: f64,
    pub max_aqi: f64,
}

/// Per-(hour, pollutant) aggregate row for the time-series chart
///
/// `hour` is the reading timestamp truncated to the hour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyPoint {
    pub hour: DateTime<Utc>,
    pub pollutant: String,
    /// Mean of non-null AQI values; None when every reading in the
    /// bucket lacks an AQI value
    pub mean_aqi: Option<f64>,
    pub reading_count: i64,
}

/// Recency window bounding which readings a refresh cycle includes
///
/// Restricted to the fixed menu offered by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TimeWindow {
    Hours1,
    Hours3,
    Hours6,
    Hours12,
    Hours24,
    Hours48,
}

impl TimeWindow {
    /// Window length in hours
    pub fn hours(&self) -> i64 {
        match self {
            TimeWindow::Hours1 => 1,
            TimeWindow::Hours3 => 3,
            TimeWindow::Hours6 => 6,
            TimeWindow::Hours12 => 12,
            TimeWindow::Hours24 => 24,
            TimeWindow::Hours48 => 48,
        }
    }

    /// Parse from an hour count; None if not on the menu
    pub fn from_hours(hours: i64) -> Option<Self> {
        match hours {
            1 => Some(TimeWindow::Hours1),
            3 => Some(TimeWindow::Hours3),
            6 => Some(TimeWindow::Hours6),
            12 => Some(TimeWindow::Hours12),
            24 => Some(TimeWindow::Hours24),
            48 => Some(TimeWindow::Hours48),
            _ => None,
        }
    }

    /// All selectable windows, ascending
    pub fn all_variants() -> &'static [TimeWindow] {
        &[
            TimeWindow::Hours1,
            TimeWindow::Hours3,
            TimeWindow::Hours6,
            TimeWindow::Hours12,
            TimeWindow::Hours24,
            TimeWindow::Hours48,
        ]
    }

    /// Recency cutoff for this window relative to `now`
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - chrono::Duration::hours(self.hours())
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        TimeWindow::Hours24
    }
}

impl TryFrom<i64> for TimeWindow {
    type Error = String;

    fn try_from(hours: i64) -> Result<Self, Self::Error> {
        TimeWindow::from_hours(hours)
            .ok_or_else(|| format!("invalid time window: {} hours (expected 1/3/6/12/24/48)", hours))
    }
}

impl From<TimeWindow> for i64 {
    fn from(window: TimeWindow) -> i64 {
        window.hours()
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hours = self.hours();
        if hours == 1 {
            write!(f, "1 hour")
        } else {
            write!(f, "{} hours", hours)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_round_trip() {
        for window in TimeWindow::all_variants() {
            assert_eq!(TimeWindow::from_hours(window.hours()), Some(*window));
        }
    }

    #[test]
    fn test_window_rejects_off_menu() {
        assert_eq!(TimeWindow::from_hours(0), None);
        assert_eq!(TimeWindow::from_hours(2), None);
        assert_eq!(TimeWindow::from_hours(72), None);
        assert_eq!(TimeWindow::from_hours(-24), None);
    }

    #[test]
    fn test_window_cutoff() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        let cutoff = TimeWindow::Hours24.cutoff(now);
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_window_display() {
        assert_eq!(format!("{}", TimeWindow::Hours1), "1 hour");
        assert_eq!(format!("{}", TimeWindow::Hours48), "48 hours");
    }

    #[test]
    fn test_window_default() {
        assert_eq!(TimeWindow::default(), TimeWindow::Hours24);
    }
}
