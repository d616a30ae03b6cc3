//! Pre-trained AQI regression models
//!
//! Models are trained offline and shipped as serialized JSON artifacts;
//! this module only loads them and runs their `predict` call. Each
//! artifact declares its own feature schema, so the two models can (and
//! do) expect different inputs. Validation and encoding failures are the
//! model's own: they surface as `ModelError` at call time and are
//! reported per model.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, Timelike, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

/// Artifact file names inside the models directory
pub const MODEL_A_FILE: &str = "model_a.json";
pub const MODEL_B_FILE: &str = "model_b.json";

/// Failure raised by a model's own validation/encoding logic
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("feature '{0}' missing from input")]
    MissingFeature(String),

    #[error("feature '{feature}' has the wrong type")]
    TypeMismatch { feature: String },

    #[error("unknown value '{value}' for feature '{feature}'")]
    UnknownLevel { feature: String, value: String },

    #[error("artifact is malformed: {0}")]
    Artifact(String),
}

/// A single input value for one feature
#[derive(Debug, Clone)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// One prediction input row, keyed by feature name
#[derive(Debug, Clone, Default)]
pub struct FeatureRow(BTreeMap<String, FeatureValue>);

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn number(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_string(), FeatureValue::Number(value));
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.0
            .insert(name.to_string(), FeatureValue::Text(value.to_string()));
        self
    }

    pub fn timestamp(mut self, name: &str, value: DateTime<Utc>) -> Self {
        self.0
            .insert(name.to_string(), FeatureValue::Timestamp(value));
        self
    }

    fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.0.get(name)
    }
}

/// One feature in a model's declared schema, with its learned encoding
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureSpec {
    /// Standardized numeric contribution: weight * (value - mean) / std_dev
    Numeric {
        name: String,
        mean: f64,
        std_dev: f64,
        weight: f64,
    },
    /// One-hot categorical contribution: learned weight per level,
    /// unknown levels are an encoding error
    Categorical {
        name: String,
        levels: HashMap<String, f64>,
    },
    /// Timestamp encoded by hour of day: 24 learned weights
    HourOfDay { name: String, weights: Vec<f64> },
}

impl FeatureSpec {
    fn name(&self) -> &str {
        match self {
            FeatureSpec::Numeric { name, .. } => name,
            FeatureSpec::Categorical { name, .. } => name,
            FeatureSpec::HourOfDay { name, .. } => name,
        }
    }

    fn contribution(&self, value: &FeatureValue) -> Result<f64, ModelError> {
        match self {
            FeatureSpec::Numeric {
                name,
                mean,
                std_dev,
                weight,
            } => {
                let v = match value {
                    FeatureValue::Number(v) => *v,
                    _ => {
                        return Err(ModelError::TypeMismatch {
                            feature: name.clone(),
                        })
                    }
                };
                let scale = if *std_dev > 0.0 { *std_dev } else { 1.0 };
                Ok(weight * (v - mean) / scale)
            }
            FeatureSpec::Categorical { name, levels } => {
                let v = match value {
                    FeatureValue::Text(v) => v,
                    _ => {
                        return Err(ModelError::TypeMismatch {
                            feature: name.clone(),
                        })
                    }
                };
                levels
                    .get(v)
                    .copied()
                    .ok_or_else(|| ModelError::UnknownLevel {
                        feature: name.clone(),
                        value: v.clone(),
                    })
            }
            FeatureSpec::HourOfDay { name, weights } => {
                let ts = match value {
                    FeatureValue::Timestamp(ts) => ts,
                    _ => {
                        return Err(ModelError::TypeMismatch {
                            feature: name.clone(),
                        })
                    }
                };
                weights
                    .get(ts.hour() as usize)
                    .copied()
                    .ok_or_else(|| {
                        ModelError::Artifact(format!(
                            "hour-of-day feature '{}' has {} weights, expected 24",
                            name,
                            weights.len()
                        ))
                    })
            }
        }
    }
}

/// A loaded regression model: intercept plus per-feature contributions
#[derive(Debug, Clone, Deserialize)]
pub struct RegressionModel {
    pub name: String,
    pub algorithm: String,
    pub intercept: f64,
    pub features: Vec<FeatureSpec>,
}

impl RegressionModel {
    /// Parse a model from its serialized artifact text
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        serde_json::from_str(json).map_err(|e| ModelError::Artifact(e.to_string()))
    }

    /// Run the model against one input row
    ///
    /// The row must carry every feature the schema declares; extra
    /// features are ignored.
    pub fn predict(&self, row: &FeatureRow) -> Result<f64, ModelError> {
        let mut prediction = self.intercept;
        for feature in &self.features {
            let value = row
                .get(feature.name())
                .ok_or_else(|| ModelError::MissingFeature(feature.name().to_string()))?;
            prediction += feature.contribution(value)?;
        }
        Ok(prediction)
    }
}

/// The two independently-trained models, either of which may be absent
#[derive(Debug, Default)]
pub struct ModelSet {
    pub model_a: Option<RegressionModel>,
    pub model_b: Option<RegressionModel>,
}

impl ModelSet {
    /// Load both model artifacts from a directory
    ///
    /// A missing or malformed artifact degrades that model to absent;
    /// it never fails the whole load.
    pub fn load(models_dir: &Path) -> Self {
        ModelSet {
            model_a: load_artifact(&models_dir.join(MODEL_A_FILE)),
            model_b: load_artifact(&models_dir.join(MODEL_B_FILE)),
        }
    }

    /// Whether at least one model is available
    pub fn any_loaded(&self) -> bool {
        self.model_a.is_some() || self.model_b.is_some()
    }
}

fn load_artifact(path: &Path) -> Option<RegressionModel> {
    if !path.exists() {
        info!("Model artifact not found: {} (predictions degraded)", path.display());
        return None;
    }

    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to read model artifact {}: {}", path.display(), e);
            return None;
        }
    };

    match RegressionModel::from_json(&json) {
        Ok(model) => {
            info!("✓ Loaded model '{}' ({})", model.name, model.algorithm);
            Some(model)
        }
        Err(e) => {
            error!("Failed to parse model artifact {}: {}", path.display(), e);
            None
        }
    }
}
