//! Prediction endpoints

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::predict::{self, PredictionOutcome, PredictionRequest};
use crate::AppState;

use super::ApiError;

/// GET /api/models
///
/// Per-model load status for the prediction screen sidebar.
pub async fn get_models(State(state): State<AppState>) -> Json<Value> {
    fn model_status(model: Option<&crate::models::RegressionModel>) -> Value {
        match model {
            Some(m) => json!({
                "loaded": true,
                "name": m.name,
                "algorithm": m.algorithm,
            }),
            None => json!({ "loaded": false }),
        }
    }

    Json(json!({
        "model_a": model_status(state.models.model_a.as_ref()),
        "model_b": model_status(state.models.model_b.as_ref()),
    }))
}

/// POST /api/predict
///
/// Shapes the request into each model's feature schema and invokes both
/// independently. 503 only when no model is loaded at all; a single
/// model's failure is reported inside a 200 response.
pub async fn post_predict(
    State(state): State<AppState>,
    Json(request): Json<PredictionRequest>,
) -> Result<Json<PredictionOutcome>, ApiError> {
    validate(&request)?;

    let outcome = predict::predict(&state.models, &request)
        .map_err(|e| ApiError::ModelsUnavailable(e.to_string()))?;
    Ok(Json(outcome))
}

fn validate(request: &PredictionRequest) -> Result<(), ApiError> {
    if request.city.trim().is_empty()
        || request.region.trim().is_empty()
        || request.pollutant.trim().is_empty()
    {
        return Err(ApiError::InvalidInput(
            "city, region, and pollutant are required".to_string(),
        ));
    }
    if !(-90.0..=90.0).contains(&request.latitude) {
        return Err(ApiError::InvalidInput(
            "latitude must be between -90 and 90".to_string(),
        ));
    }
    if !(-180.0..=180.0).contains(&request.longitude) {
        return Err(ApiError::InvalidInput(
            "longitude must be between -180 and 180".to_string(),
        ));
    }
    Ok(())
}
