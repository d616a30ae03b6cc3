//! In-memory equality filters over fetched readings
//!
//! The dashboard offers two independently toggleable filters (region and
//! pollutant). Each is either the "all" sentinel (no constraint) or an
//! exact-match predicate. Filters commute: applying both is the
//! intersection of their individual results, and input order is preserved.

use aqmon_common::Reading;
use serde::{Deserialize, Serialize};

/// A single filter dimension: everything, or one exact value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Selector {
    All,
    Only(String),
}

impl Selector {
    /// Parse from the wire/config representation; "all" (any case) is the
    /// no-constraint sentinel, anything else is an exact-match value
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("all") {
            Selector::All
        } else {
            Selector::Only(s.to_string())
        }
    }

    /// Whether a field value passes this selector
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Selector::All => true,
            Selector::Only(wanted) => wanted == value,
        }
    }

    /// Wire/config representation ("all" or the exact value)
    pub fn as_str(&self) -> &str {
        match self {
            Selector::All => "all",
            Selector::Only(value) => value,
        }
    }

    /// The selected value, if one is selected
    pub fn selected(&self) -> Option<&str> {
        match self {
            Selector::All => None,
            Selector::Only(value) => Some(value),
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::parse(&s)
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> String {
        selector.as_str().to_string()
    }
}

impl Default for Selector {
    fn default() -> Self {
        Selector::All
    }
}

/// The user's active (region, pollutant) filter pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub region: Selector,
    pub pollutant: Selector,
}

impl FilterSelection {
    /// Apply both filters, preserving input relative order
    ///
    /// An empty result is valid, not an error.
    pub fn apply(&self, readings: &[Reading]) -> Vec<Reading> {
        readings
            .iter()
            .filter(|r| self.region.matches(&r.region) && self.pollutant.matches(&r.pollutant))
            .cloned()
            .collect()
    }

    /// True when neither dimension constrains the data
    pub fn is_unfiltered(&self) -> bool {
        self.region == Selector::All && self.pollutant == Selector::All
    }
}
