//! Financial profile handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};

use crate::{get_user_email, read_json, AppError, AppState};
use fintrack_core::models::{FinancialProfile, ProfileUpdate};

/// GET /api/profile - The caller's financial profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<FinancialProfile>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;

    let profile = state.db.get_profile(user.id)?.ok_or_else(|| {
        AppError::not_found("No financial profile yet. Complete your profile in the Dashboard.")
    })?;

    state
        .db
        .log_audit(&user_email, "get", Some("profile"), Some(user.id), None)?;

    Ok(Json(profile))
}

/// PUT /api/profile - Partially update the caller's financial profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<FinancialProfile>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;
    let update: ProfileUpdate = read_json(request).await?;

    update
        .validate_profile_edit()
        .map_err(AppError::from_core)?;

    let (profile, ()) = state
        .db
        .update_profile_with(user.id, |current| Ok((update.apply_to(current), ())))?;

    state.db.log_audit(
        &user_email,
        "update",
        Some("profile"),
        Some(user.id),
        None,
    )?;

    Ok(Json(profile))
}
