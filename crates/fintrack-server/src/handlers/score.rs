//! Credit score handlers
//!
//! Every response from the calculate and latest endpoints carries a
//! renderable score body; failures use the fallback payload with a status
//! matching the cause.

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{error, warn};

use crate::{get_user_email, AppError, AppState, MAX_BODY_SIZE};
use fintrack_core::models::ProfileUpdate;
use fintrack_core::scoring::DEFAULT_HISTORY_LIMIT;
use fintrack_core::{Error, ScoreHistory, ScoreResult};

pub type ScoreResponse = (StatusCode, Json<ScoreResult>);

/// Fallback body and status for a failed score request
fn score_failure(err: &Error) -> ScoreResponse {
    if err.is_validation() {
        (StatusCode::BAD_REQUEST, Json(ScoreResult::rejected(err.to_string())))
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, Json(ScoreResult::missing_profile()))
    } else {
        error!(error = %err, "Credit score request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(ScoreResult::fallback()))
    }
}

fn audit(state: &AppState, user_email: &str, action: &str, user_id: i64, details: &str) {
    if let Err(e) = state.db.log_audit(
        user_email,
        action,
        Some("credit_score"),
        Some(user_id),
        Some(details),
    ) {
        warn!("Failed to write audit entry: {}", e);
    }
}

/// POST /api/score - Update the profile from the body and calculate a score
pub async fn calculate_score(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> ScoreResponse {
    let user_email = get_user_email(request.headers());
    let user = match state.resolve_user(request.headers()) {
        Ok(user) => user,
        Err(e) => return score_failure(&e),
    };

    let update: ProfileUpdate = match axum::body::to_bytes(request.into_body(), MAX_BODY_SIZE)
        .await
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
    {
        Some(update) => update,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ScoreResult::rejected("Invalid JSON request body")),
            )
        }
    };

    match state.scoring.calculate(user.id, &update) {
        Ok(result) if result.fallback => {
            audit(&state, &user_email, "calculate_failed", user.id, "fallback");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(result))
        }
        Ok(result) => {
            audit(
                &state,
                &user_email,
                "calculate",
                user.id,
                &format!("score={}, category={}", result.score, result.category),
            );
            (StatusCode::OK, Json(result))
        }
        Err(e) => score_failure(&e),
    }
}

/// GET /api/score/latest - The newest recorded score
pub async fn latest_score(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> ScoreResponse {
    let user_email = get_user_email(request.headers());
    let user = match state.resolve_user(request.headers()) {
        Ok(user) => user,
        Err(e) => return score_failure(&e),
    };

    match state.scoring.latest(user.id) {
        Ok(result) => {
            audit(
                &state,
                &user_email,
                "get",
                user.id,
                &format!("score={}", result.score),
            );
            (StatusCode::OK, Json(result))
        }
        Err(e) => score_failure(&e),
    }
}

/// Query parameters for score history
#[derive(Debug, Deserialize)]
pub struct ScoreHistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    DEFAULT_HISTORY_LIMIT
}

/// GET /api/score/history - Recent snapshots with changes and a trend summary
pub async fn score_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScoreHistoryQuery>,
    request: Request,
) -> Result<Json<ScoreHistory>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;

    let history = state
        .scoring
        .history(user.id, params.limit)
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &user_email,
        "list",
        Some("credit_score"),
        Some(user.id),
        Some(&format!("count={}", history.entries.len())),
    )?;

    Ok(Json(history))
}
