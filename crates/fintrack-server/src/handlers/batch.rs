//! Batch report handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};
use serde::Deserialize;

use crate::{get_user_email, read_json, AppError, AppState};
use fintrack_core::{BatchSummary, CohortCriteria};

/// Request body for a batch run
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(default = "default_criteria")]
    pub criteria: String,
    #[serde(default)]
    pub email: bool,
    /// Overrides the due-loan window
    pub window_days: Option<i64>,
}

fn default_criteria() -> String {
    "active_loans".to_string()
}

/// POST /api/batch/reports - Generate reports for a cohort (admin)
pub async fn run_batch_reports(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<BatchSummary>, AppError> {
    state.require_admin(request.headers())?;
    let user_email = get_user_email(request.headers());
    let body: BatchRequest = read_json(request).await?;

    let mut criteria: CohortCriteria = body
        .criteria
        .parse()
        .map_err(|e: String| AppError::bad_request(&e))?;
    if let Some(days) = body.window_days {
        if days < 0 {
            return Err(AppError::bad_request("window_days must not be negative"));
        }
        criteria = criteria.with_window(days);
    }

    let summary = state
        .batch
        .run(criteria, body.email)
        .await
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &user_email,
        "batch",
        Some("report"),
        None,
        Some(&format!(
            "criteria={}, users={}, generated={}, emailed={}",
            summary.criteria, summary.users, summary.generated, summary.emailed
        )),
    )?;

    Ok(Json(summary))
}
