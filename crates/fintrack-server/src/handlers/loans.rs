//! Loan account handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    Json,
};
use chrono::Local;
use serde::Deserialize;

use crate::{get_user_email, read_json, AppError, AppState, SuccessResponse};
use fintrack_core::config::due_window_days;
use fintrack_core::models::{LoanAccount, LoanUpdate, NewLoanAccount, User};

/// Request body for recording a payment
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: f64,
}

/// Query parameters for due loans
#[derive(Debug, Deserialize)]
pub struct DueLoansQuery {
    pub days: Option<i64>,
}

/// Fetch a loan owned by `user`; other users' loans look absent
fn owned_loan(state: &AppState, user: &User, id: i64) -> Result<LoanAccount, AppError> {
    state
        .db
        .get_loan(id)?
        .filter(|loan| loan.user_id == user.id)
        .ok_or_else(|| AppError::not_found(&format!("Loan {} not found", id)))
}

/// GET /api/loans - List the caller's loans
pub async fn list_loans(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Vec<LoanAccount>>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;

    let loans = state.db.list_loans(user.id)?;

    state.db.log_audit(
        &user_email,
        "list",
        Some("loan"),
        None,
        Some(&format!("count={}", loans.len())),
    )?;

    Ok(Json(loans))
}

/// POST /api/loans - Create a loan account
pub async fn create_loan(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<LoanAccount>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;
    let new_loan: NewLoanAccount = read_json(request).await?;

    let loan = state
        .db
        .create_loan(user.id, &new_loan)
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &user_email,
        "create",
        Some("loan"),
        Some(loan.id),
        Some(&format!(
            "account={}, lender={}",
            loan.account_number, loan.lender_name
        )),
    )?;

    Ok(Json(loan))
}

/// GET /api/loans/:id - Get a single loan
pub async fn get_loan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<LoanAccount>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;

    let loan = owned_loan(&state, &user, id)?;

    state
        .db
        .log_audit(&user_email, "get", Some("loan"), Some(id), None)?;

    Ok(Json(loan))
}

/// PUT /api/loans/:id - Partially update a loan
pub async fn update_loan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<LoanAccount>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;
    owned_loan(&state, &user, id)?;
    let update: LoanUpdate = read_json(request).await?;

    let loan = state
        .db
        .update_loan(id, &update)
        .map_err(AppError::from_core)?;

    state
        .db
        .log_audit(&user_email, "update", Some("loan"), Some(id), None)?;

    Ok(Json(loan))
}

/// DELETE /api/loans/:id - Delete a loan
pub async fn delete_loan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<SuccessResponse>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;
    owned_loan(&state, &user, id)?;

    let deleted = state.db.delete_loan(id)?;

    state
        .db
        .log_audit(&user_email, "delete", Some("loan"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: deleted }))
}

/// POST /api/loans/:id/payments - Record a repayment
pub async fn record_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<LoanAccount>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;
    owned_loan(&state, &user, id)?;
    let payment: PaymentRequest = read_json(request).await?;

    let loan = state
        .db
        .record_payment(id, payment.amount)
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &user_email,
        "payment",
        Some("loan"),
        Some(id),
        Some(&format!(
            "amount={:.2}, remaining={:.2}",
            payment.amount, loan.remaining_balance
        )),
    )?;

    Ok(Json(loan))
}

/// GET /api/loans/due - Active loans ending within the window
pub async fn list_due_loans(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DueLoansQuery>,
    request: Request,
) -> Result<Json<Vec<LoanAccount>>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;

    let days = params.days.unwrap_or_else(due_window_days);
    if days < 0 {
        return Err(AppError::bad_request("days must not be negative"));
    }

    let loans = state
        .db
        .list_due_loans(user.id, Local::now().date_naive(), days)?;

    state.db.log_audit(
        &user_email,
        "list_due",
        Some("loan"),
        None,
        Some(&format!("days={}, count={}", days, loans.len())),
    )?;

    Ok(Json(loans))
}
