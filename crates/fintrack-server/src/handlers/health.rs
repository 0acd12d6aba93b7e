//! Health check handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: String,
    pub model: &'static str,
}

/// GET /api/health - Always 200; reports database and model state
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = match state.db.ping() {
        Ok(()) => "connected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Json(HealthResponse {
        status: "ok",
        database,
        model: state.scoring.models().source_label(),
    })
}
