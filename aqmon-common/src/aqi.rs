//! AQI category classification
//!
//! Maps a numeric Air Quality Index value to a named severity band with a
//! display color and symbol. Breakpoints follow the EPA AQI scale; each
//! band is inclusive on its upper end.
//!
//! The classifier is pure and total: every value, NaN, or a missing
//! value produces a category. Note that stored readings also carry a
//! category label assigned by the ingestion pipeline; that label is a
//! separate observable and is never re-derived from these breakpoints.

use serde::{Deserialize, Serialize};

/// Named AQI severity bands
///
/// Ordered from least to most severe. `Unknown` covers missing or NaN
/// AQI values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AqiCategory {
    /// AQI value absent or NaN
    Unknown,

    /// AQI 0-50
    Good,

    /// AQI 51-100
    Moderate,

    /// AQI 101-150
    UnhealthySensitive,

    /// AQI 151-200
    Unhealthy,

    /// AQI 201-300
    VeryUnhealthy,

    /// AQI above 300
    Hazardous,
}

impl AqiCategory {
    /// Classify a (possibly missing) AQI value into a severity band
    ///
    /// Bands are inclusive on their upper boundary: 50.0 is Good,
    /// 50.01 is Moderate, 300.0 is VeryUnhealthy, 300.01 is Hazardous.
    /// Only a missing value or NaN maps to Unknown; infinities take the
    /// band their comparison lands in.
    pub fn classify(aqi: Option<f64>) -> Self {
        let value = match aqi {
            Some(v) if !v.is_nan() => v,
            _ => return AqiCategory::Unknown,
        };

        if value <= 50.0 {
            AqiCategory::Good
        } else if value <= 100.0 {
            AqiCategory::Moderate
        } else if value <= 150.0 {
            AqiCategory::UnhealthySensitive
        } else if value <= 200.0 {
            AqiCategory::Unhealthy
        } else if value <= 300.0 {
            AqiCategory::VeryUnhealthy
        } else {
            AqiCategory::Hazardous
        }
    }

    /// Human-readable category name
    pub fn display_name(&self) -> &'static str {
        match self {
            AqiCategory::Unknown => "Unknown",
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthySensitive => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }

    /// Display color (hex RGB) for maps and charts
    pub fn color(&self) -> &'static str {
        match self {
            AqiCategory::Unknown => "#808080",
            AqiCategory::Good => "#00E400",
            AqiCategory::Moderate => "#FFFF00",
            AqiCategory::UnhealthySensitive => "#FF7E00",
            AqiCategory::Unhealthy => "#FF0000",
            AqiCategory::VeryUnhealthy => "#8F3F97",
            AqiCategory::Hazardous => "#7E0023",
        }
    }

    /// Display symbol for compact text rendering
    pub fn symbol(&self) -> &'static str {
        match self {
            AqiCategory::Unknown => "⚪",
            AqiCategory::Good => "🟢",
            AqiCategory::Moderate => "🟡",
            AqiCategory::UnhealthySensitive => "🟠",
            AqiCategory::Unhealthy => "🔴",
            AqiCategory::VeryUnhealthy => "🟣",
            AqiCategory::Hazardous => "🟤",
        }
    }

    /// Severity rank, 0 (Unknown) through 6 (Hazardous)
    ///
    /// Monotonically non-decreasing in the classified AQI value.
    pub fn severity(&self) -> u8 {
        match self {
            AqiCategory::Unknown => 0,
            AqiCategory::Good => 1,
            AqiCategory::Moderate => 2,
            AqiCategory::UnhealthySensitive => 3,
            AqiCategory::Unhealthy => 4,
            AqiCategory::VeryUnhealthy => 5,
            AqiCategory::Hazardous => 6,
        }
    }

    /// Parse a category from its display name (as stored by the ingestion
    /// pipeline). Returns None for unrecognized labels.
    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "Unknown" => Some(AqiCategory::Unknown),
            "Good" => Some(AqiCategory::Good),
            "Moderate" => Some(AqiCategory::Moderate),
            "Unhealthy for Sensitive Groups" => Some(AqiCategory::UnhealthySensitive),
            "Unhealthy" => Some(AqiCategory::Unhealthy),
            "Very Unhealthy" => Some(AqiCategory::VeryUnhealthy),
            "Hazardous" => Some(AqiCategory::Hazardous),
            _ => None,
        }
    }

    /// All categories in ascending severity order
    ///
    /// Useful for UI legends and validation.
    pub fn all_variants() -> &'static [AqiCategory] {
        &[
            AqiCategory::Unknown,
            AqiCategory::Good,
            AqiCategory::Moderate,
            AqiCategory::UnhealthySensitive,
            AqiCategory::Unhealthy,
            AqiCategory::VeryUnhealthy,
            AqiCategory::Hazardous,
        ]
    }
}

impl std::fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
