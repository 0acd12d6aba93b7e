//! User handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};

use crate::{get_user_email, read_json, AppError, AppState};
use fintrack_core::models::{NewUser, User};

/// GET /api/users - List all users (admin)
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Vec<User>>, AppError> {
    state.require_admin(request.headers())?;
    let user_email = get_user_email(request.headers());

    let users = state.db.list_users()?;

    state.db.log_audit(
        &user_email,
        "list",
        Some("user"),
        None,
        Some(&format!("count={}", users.len())),
    )?;

    Ok(Json(users))
}

/// POST /api/users - Register a user
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<User>, AppError> {
    let user_email = get_user_email(request.headers());
    let new_user: NewUser = read_json(request).await?;

    let user = state
        .db
        .create_user(&new_user)
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &user_email,
        "create",
        Some("user"),
        Some(user.id),
        Some(&format!("email={}", user.email)),
    )?;

    Ok(Json(user))
}

/// GET /api/users/me - The caller's user record
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<User>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;

    state
        .db
        .log_audit(&user_email, "get", Some("user"), Some(user.id), None)?;

    Ok(Json(user))
}
