//! Credit report handlers

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{get_user_email, read_json, AppError, AppState};
use fintrack_core::config::public_url;
use fintrack_core::models::{CreditReportRequest, User};
use fintrack_core::GeneratedReport;

/// A generated report and where to fetch it
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    #[serde(flatten)]
    pub report: GeneratedReport,
    pub download_url: String,
    /// Set when an email was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emailed: Option<bool>,
}

/// Request body for admin report generation
#[derive(Debug, Deserialize)]
pub struct GenerateReportRequest {
    pub user_email: String,
    #[serde(default)]
    pub send_email: bool,
}

pub fn download_url(report_id: i64) -> String {
    let path = format!("/api/reports/{}/download", report_id);
    match public_url() {
        Some(base) => format!("{}{}", base, path),
        None => path,
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    match file_name.rsplit('.').next() {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Render a report for `user`, optionally emailing it
async fn generate_for(
    state: &AppState,
    user: &User,
    send_email: bool,
) -> Result<ReportResponse, AppError> {
    let report = state
        .reports
        .generate(user.id)
        .map_err(AppError::from_core)?;

    let emailed = if send_email {
        match &state.dispatcher {
            Some(dispatcher) => match dispatcher.send_report(user, &report).await {
                Ok(()) => Some(true),
                Err(e) => {
                    warn!(user = %user.email, "Failed to email report: {}", e);
                    Some(false)
                }
            },
            None => {
                warn!("Report email requested but no mailer is configured");
                Some(false)
            }
        }
    } else {
        None
    };

    Ok(ReportResponse {
        download_url: download_url(report.request.id),
        report,
        emailed,
    })
}

/// POST /api/reports - Generate a report for the caller
pub async fn create_report(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ReportResponse>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;

    let response = generate_for(&state, &user, false).await?;

    state.db.log_audit(
        &user_email,
        "create",
        Some("report"),
        Some(response.report.request.id),
        Some(&response.report.request.file_name),
    )?;

    Ok(Json(response))
}

/// POST /api/reports/generate - Generate a report for any user (admin)
pub async fn generate_report_for_user(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ReportResponse>, AppError> {
    state.require_admin(request.headers())?;
    let user_email = get_user_email(request.headers());
    let body: GenerateReportRequest = read_json(request).await?;

    let user = state
        .db
        .get_user_by_email(&body.user_email)
        .map_err(AppError::from_core)?
        .ok_or_else(|| AppError::not_found(&format!("User {} not found", body.user_email)))?;

    let response = generate_for(&state, &user, body.send_email).await?;

    state.db.log_audit(
        &user_email,
        "generate",
        Some("report"),
        Some(response.report.request.id),
        Some(&format!(
            "user={}, emailed={}",
            user.email,
            response.emailed.unwrap_or(false)
        )),
    )?;

    Ok(Json(response))
}

/// GET /api/reports - The caller's reports, newest first
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Vec<CreditReportRequest>>, AppError> {
    let user_email = get_user_email(request.headers());
    let user = state.current_user(request.headers())?;

    let reports = state.db.list_report_requests(user.id)?;

    state.db.log_audit(
        &user_email,
        "list",
        Some("report"),
        None,
        Some(&format!("count={}", reports.len())),
    )?;

    Ok(Json(reports))
}

/// GET /api/reports/:id/download - Download a report document
///
/// Callers may download their own reports; admins may download any.
pub async fn download_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Response, AppError> {
    let user_email = get_user_email(request.headers());
    let owner = if state.is_admin(request.headers()) {
        None
    } else {
        Some(state.current_user(request.headers())?.id)
    };

    let report = state
        .db
        .get_report_request(id)?
        .filter(|r| owner.map_or(true, |user_id| r.user_id == user_id))
        .ok_or_else(|| AppError::not_found(&format!("Report {} not found", id)))?;

    let path = state.reports.locate(&report).map_err(AppError::from_core)?;
    let bytes = tokio::fs::read(&path).await?;

    state
        .db
        .log_audit(&user_email, "download", Some("report"), Some(id), None)?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&report.file_name))
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", report.file_name),
        )
        .body(Body::from(bytes))
        .map_err(|e| AppError::internal(&e.to_string()))
}
