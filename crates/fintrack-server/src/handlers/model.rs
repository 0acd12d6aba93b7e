//! Score model handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};

use crate::{get_user_email, read_json, AppError, AppState};
use fintrack_core::{ModelInfo, Prediction, PredictionRequest};

/// POST /api/model/predict - Score a full feature set with the resolved model
pub async fn predict_score(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Prediction>, AppError> {
    let user_email = get_user_email(request.headers());
    let body: PredictionRequest = read_json(request).await?;

    let prediction = state
        .scoring
        .predict(&body)
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &user_email,
        "predict",
        Some("model"),
        None,
        Some(&format!(
            "score={}, source={}",
            prediction.score, prediction.source
        )),
    )?;

    Ok(Json(prediction))
}

/// GET /api/model/info - Describe the resolved model
pub async fn model_info(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ModelInfo>, AppError> {
    let user_email = get_user_email(request.headers());

    let info = state
        .scoring
        .models()
        .info()
        .map_err(AppError::from_core)?;

    state
        .db
        .log_audit(&user_email, "get", Some("model"), None, Some(&info.version))?;

    Ok(Json(info))
}
