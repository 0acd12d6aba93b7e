//! Sentiment survey handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};
use serde::Deserialize;

use crate::{get_user_email, read_json, AppError, AppState};
use fintrack_core::sentiment::{SentimentDashboard, SentimentRecord, SentimentTrend};
use fintrack_core::RiskAssessment;

/// Request body for a survey response
#[derive(Debug, Deserialize)]
pub struct SentimentSubmission {
    pub response_text: String,
}

/// POST /api/sentiment - Classify and store a survey response
pub async fn submit_sentiment(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<SentimentRecord>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;
    let body: SentimentSubmission = read_json(request).await?;

    let record = state
        .sentiment
        .record(user.id, &body.response_text)
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &user_email,
        "create",
        Some("sentiment"),
        Some(record.response.id),
        Some(&format!("ordinal={}", record.response.ordinal_sentiment)),
    )?;

    Ok(Json(record))
}

/// GET /api/sentiment/dashboard - Current aggregate and recent responses
pub async fn sentiment_dashboard(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<SentimentDashboard>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;

    let dashboard = state.sentiment.dashboard(user.id)?;

    state
        .db
        .log_audit(&user_email, "get", Some("sentiment"), Some(user.id), None)?;

    Ok(Json(dashboard))
}

/// GET /api/sentiment/trend - Recent aggregate history
pub async fn sentiment_trend(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<SentimentTrend>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;

    let trend = state.sentiment.trend(user.id)?;

    state.db.log_audit(
        &user_email,
        "list",
        Some("sentiment"),
        Some(user.id),
        Some(&format!("count={}", trend.entries.len())),
    )?;

    Ok(Json(trend))
}

/// GET /api/sentiment/risk - Risk level from recent sentiment
pub async fn sentiment_risk(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<RiskAssessment>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;

    let risk = state.sentiment.risk(user.id).map_err(AppError::from_core)?;

    state.db.log_audit(
        &user_email,
        "assess",
        Some("sentiment"),
        Some(user.id),
        Some(risk.risk_level.as_str()),
    )?;

    Ok(Json(risk))
}
