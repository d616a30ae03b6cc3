//! # AQMon Common Library
//!
//! Shared code for the AQMon air-quality monitoring service:
//! - AQI category classifier (fixed EPA-style breakpoints)
//! - Typed measurement records and summary row shapes
//! - Time window enumeration
//! - Common error type
//! - Database path resolution

pub mod aqi;
pub mod config;
pub mod error;
pub mod types;

pub use aqi::AqiCategory;
pub use error::{Error, Result};
pub use types::{HourlyPoint, PollutantSummary, Reading, RegionSummary, TimeWindow};
