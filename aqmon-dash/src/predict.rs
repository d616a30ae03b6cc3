//! Prediction request shaping and two-model comparison
//!
//! User input is shaped into the exact feature schema each model expects:
//! model A takes the reduced five-field subset, model B additionally takes
//! the category (default "Good") and the timestamp (default now). The two
//! invocations are independent; one model's failure never blocks the
//! other's result.

use aqmon_common::{AqiCategory, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FeatureRow, ModelSet, RegressionModel};

/// Category assumed by model B when the user leaves it unspecified
pub const DEFAULT_CATEGORY: &str = "Good";

/// Agreement thresholds on the absolute difference between predictions
const HIGH_AGREEMENT_BELOW: f64 = 10.0;
const MEDIUM_AGREEMENT_BELOW: f64 = 20.0;

/// User input for one point prediction
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionRequest {
    pub city: String,
    pub region: String,
    pub pollutant: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Only consumed by model B; defaults to "Good"
    #[serde(default)]
    pub category: Option<String>,
    /// Only consumed by model B; defaults to the current time
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Per-model result: a prediction, that model's own error, or not loaded
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelOutcome {
    Predicted {
        aqi: f64,
        /// Classifier band of the predicted value, for display
        category: String,
    },
    Failed {
        error: String,
    },
    NotLoaded,
}

/// One model's labelled report
#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub model: String,
    #[serde(flatten)]
    pub outcome: ModelOutcome,
}

/// How closely the two predictions agree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Agreement {
    High,
    Medium,
    Low,
}

impl Agreement {
    /// Band the absolute difference between two predictions
    pub fn from_difference(difference: f64) -> Self {
        if difference < HIGH_AGREEMENT_BELOW {
            Agreement::High
        } else if difference < MEDIUM_AGREEMENT_BELOW {
            Agreement::Medium
        } else {
            Agreement::Low
        }
    }
}

impl std::fmt::Display for Agreement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Agreement::High => "High",
            Agreement::Medium => "Medium",
            Agreement::Low => "Low",
        };
        write!(f, "{}", label)
    }
}

/// Side-by-side comparison, present only when both models predicted
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub difference: f64,
    pub mean: f64,
    pub agreement: Agreement,
}

impl Comparison {
    pub fn of(a: f64, b: f64) -> Self {
        let difference = (a - b).abs();
        Comparison {
            difference,
            mean: (a + b) / 2.0,
            agreement: Agreement::from_difference(difference),
        }
    }
}

/// Full prediction response
#[derive(Debug, Clone, Serialize)]
pub struct PredictionOutcome {
    pub model_a: ModelReport,
    pub model_b: ModelReport,
    pub comparison: Option<Comparison>,
}

/// The reduced feature subset model A was trained on
fn reduced_features(request: &PredictionRequest) -> FeatureRow {
    FeatureRow::new()
        .text("city", &request.city)
        .text("region", &request.region)
        .text("pollutant", &request.pollutant)
        .number("latitude", request.latitude)
        .number("longitude", request.longitude)
}

/// The extended subset for model B: reduced fields plus category and time
fn extended_features(request: &PredictionRequest, now: DateTime<Utc>) -> FeatureRow {
    reduced_features(request)
        .text(
            "category",
            request.category.as_deref().unwrap_or(DEFAULT_CATEGORY),
        )
        .timestamp("recorded_at", request.recorded_at.unwrap_or(now))
}

fn invoke(model: Option<&RegressionModel>, row: &FeatureRow) -> ModelOutcome {
    let model = match model {
        Some(model) => model,
        None => return ModelOutcome::NotLoaded,
    };

    match model.predict(row) {
        Ok(aqi) => ModelOutcome::Predicted {
            aqi,
            category: AqiCategory::classify(Some(aqi)).display_name().to_string(),
        },
        Err(e) => ModelOutcome::Failed {
            error: e.to_string(),
        },
    }
}

fn report(model: Option<&RegressionModel>, fallback_name: &str, row: &FeatureRow) -> ModelReport {
    ModelReport {
        model: model
            .map(|m| m.name.clone())
            .unwrap_or_else(|| fallback_name.to_string()),
        outcome: invoke(model, row),
    }
}

/// Run both models against one shaped request
///
/// Errors only when no model is loaded at all; that is signaled before
/// any invocation is attempted. Otherwise each model reports its own
/// success or failure independently.
pub fn predict(models: &ModelSet, request: &PredictionRequest) -> Result<PredictionOutcome> {
    if !models.any_loaded() {
        return Err(Error::NotFound(
            "no prediction models are loaded".to_string(),
        ));
    }

    let now = Utc::now();
    let model_a = report(models.model_a.as_ref(), "Model A", &reduced_features(request));
    let model_b = report(
        models.model_b.as_ref(),
        "Model B",
        &extended_features(request, now),
    );

    let comparison = match (&model_a.outcome, &model_b.outcome) {
        (
            ModelOutcome::Predicted { aqi: a, .. },
            ModelOutcome::Predicted { aqi: b, .. },
        ) => Some(Comparison::of(*a, *b)),
        _ => None,
    };

    Ok(PredictionOutcome {
        model_a,
        model_b,
        comparison,
    })
}
