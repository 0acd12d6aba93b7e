//! Fintrack Web Server
//!
//! Axum-based REST API for the Fintrack credit and loan management backend.
//!
//! Security features:
//! - Gateway header or API key authentication (secure by default, use --no-auth for local dev)
//! - Restrictive CORS policy
//! - Input validation (body size limits, pagination limits)
//! - Audit logging for every API access
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use fintrack_core::config::env_var;
use fintrack_core::models::User;
use fintrack_core::{
    BatchOrchestrator, Database, MailConfig, ModelProvider, NotificationDispatcher,
    ReportGenerator, ScoringService, SentimentService,
};

mod handlers;
mod scheduler;

pub use scheduler::{report_schedule_from_env, start_report_scheduler};

/// Maximum JSON request body size (64 KB)
pub const MAX_BODY_SIZE: usize = 64 * 1024;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Header set by the fronting auth gateway with the authenticated user's email
pub const USER_EMAIL_HEADER: &str = "x-authenticated-user-email";

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Identity used for user-scoped endpoints when authentication is disabled
pub const LOCAL_USER_EMAIL: &str = "local@fintrack.local";

/// Comma-separated bearer keys for service access
pub const API_KEYS_ENV: &str = "FINTRACK_API_KEYS";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only in production)
    pub allowed_origins: Vec<String>,
    /// API keys for service authentication
    /// Format: "Bearer <key>" in Authorization header. API key callers
    /// have admin access (batch runs, reports for other users, audit log).
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
        }
    }
}

impl ServerConfig {
    /// Secure defaults plus API keys from `FINTRACK_API_KEYS`
    pub fn from_env() -> Self {
        Self {
            api_keys: env_var(API_KEYS_ENV)
                .map(|keys| parse_api_keys(&keys))
                .unwrap_or_default(),
            ..Self::default()
        }
    }
}

/// Split a comma-separated key list, dropping blanks
pub fn parse_api_keys(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    pub scoring: ScoringService,
    pub reports: ReportGenerator,
    pub sentiment: SentimentService,
    pub batch: BatchOrchestrator,
    /// Mail delivery for on-demand report emails
    pub dispatcher: Option<NotificationDispatcher>,
}

impl AppState {
    pub fn new(
        db: Database,
        config: ServerConfig,
        models: Arc<ModelProvider>,
        reports: ReportGenerator,
        dispatcher: Option<NotificationDispatcher>,
    ) -> Self {
        let mut batch = BatchOrchestrator::new(db.clone(), reports.clone());
        if let Some(ref d) = dispatcher {
            batch = batch.with_dispatcher(d.clone());
        }

        Self {
            scoring: ScoringService::new(db.clone(), models),
            sentiment: SentimentService::with_lexicon(db.clone()),
            reports,
            batch,
            dispatcher,
            config,
            db,
        }
    }

    /// Services configured from the environment
    pub fn from_env(db: Database, config: ServerConfig) -> Self {
        let dispatcher = NotificationDispatcher::from_config(&MailConfig::from_env());
        info!("Report emails via {} mailer", dispatcher.mailer_name());

        Self::new(
            db.clone(),
            config,
            Arc::new(ModelProvider::from_env()),
            ReportGenerator::from_env(db),
            Some(dispatcher),
        )
    }

    /// Whether the request may use admin endpoints
    pub fn is_admin(&self, headers: &HeaderMap) -> bool {
        !self.config.require_auth || bearer_key_valid(headers, &self.config.api_keys)
    }

    /// Reject non-admin callers
    pub fn require_admin(&self, headers: &HeaderMap) -> Result<(), AppError> {
        if self.is_admin(headers) {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin access required"))
        }
    }

    /// The user a request acts as, created on first sight
    pub fn resolve_user(&self, headers: &HeaderMap) -> fintrack_core::Result<User> {
        match header_email(headers) {
            Some(email) => self.db.ensure_user(email),
            None if !self.config.require_auth => self.db.ensure_user(LOCAL_USER_EMAIL),
            None => Err(fintrack_core::Error::Validation(format!(
                "{} header is required for user endpoints",
                USER_EMAIL_HEADER
            ))),
        }
    }

    pub fn current_user(&self, headers: &HeaderMap) -> Result<User, AppError> {
        self.resolve_user(headers).map_err(AppError::from_core)
    }
}

/// Authentication middleware - validates the gateway user header or API keys
///
/// # Security Notes
///
/// **Gateway header**: `X-Authenticated-User-Email` is trusted as set by the
/// fronting auth gateway. It can be spoofed if the server is exposed directly.
///
/// **API keys**: Compared using constant-time comparison to prevent timing attacks.
///
/// `/api/health` is always reachable.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth || request.uri().path() == "/api/health" {
        return next.run(request).await;
    }

    if let Some(email) = header_email(request.headers()) {
        info!(user = %email, path = %request.uri().path(), "Authenticated via gateway header");
        return next.run(request).await;
    }

    if bearer_key_valid(request.headers(), &state.config.api_keys) {
        info!(user = "api-key", path = %request.uri().path(), "Authenticated via API key");
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

fn header_email(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_EMAIL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

fn bearer_key_valid(headers: &HeaderMap, valid_keys: &[String]) -> bool {
    headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key, valid_keys))
        .unwrap_or(false)
}

/// Validate an API key against the configured keys using constant-time comparison
/// to prevent timing attacks.
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    for key in valid_keys {
        let key_bytes = key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        if provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
        {
            return true;
        }
    }
    false
}

/// Extract user email from request headers (for audit logging)
/// Returns the gateway email, "api-key" for API key auth, or "local-dev" for unauthenticated
pub fn get_user_email(headers: &HeaderMap) -> String {
    if let Some(email) = header_email(headers) {
        return email.to_string();
    }

    if headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .is_some()
    {
        return "api-key".to_string();
    }

    "local-dev".to_string()
}

/// Read a JSON request body
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    request: Request,
) -> Result<T, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_SIZE)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::bad_request(&format!("Invalid JSON: {}", e)))
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router with services configured from the environment
pub fn create_router(db: Database, config: ServerConfig) -> Router {
    create_router_with_state(AppState::from_env(db, config))
}

/// Create the application router around prepared state (for testing)
pub fn create_router_with_state(state: AppState) -> Router {
    let cors = build_cors(&state.config.allowed_origins);
    let state = Arc::new(state);

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        // Users and audit
        .route("/users", get(handlers::list_users).post(handlers::create_user))
        .route("/users/me", get(handlers::get_current_user))
        .route("/audit", get(handlers::list_audit_log))
        // Financial profile
        .route(
            "/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        // Credit scores
        .route("/score", post(handlers::calculate_score))
        .route("/score/latest", get(handlers::latest_score))
        .route("/score/history", get(handlers::score_history))
        // Score model
        .route("/model/predict", post(handlers::predict_score))
        .route("/model/info", get(handlers::model_info))
        // Loan accounts
        .route("/loans", get(handlers::list_loans).post(handlers::create_loan))
        .route("/loans/due", get(handlers::list_due_loans))
        .route(
            "/loans/:id",
            get(handlers::get_loan)
                .put(handlers::update_loan)
                .delete(handlers::delete_loan),
        )
        .route("/loans/:id/payments", post(handlers::record_payment))
        // Credit reports
        .route(
            "/reports",
            get(handlers::list_reports).post(handlers::create_report),
        )
        .route("/reports/generate", post(handlers::generate_report_for_user))
        .route("/reports/:id/download", get(handlers::download_report))
        .route("/batch/reports", post(handlers::run_batch_reports))
        // Sentiment
        .route("/sentiment", post(handlers::submit_sentiment))
        .route("/sentiment/dashboard", get(handlers::sentiment_dashboard))
        .route("/sentiment/trend", get(handlers::sentiment_trend))
        .route("/sentiment/risk", get(handlers::sentiment_risk));

    Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        ))
}

fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static(USER_EMAIL_HEADER),
        ]);

    if allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        cors
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

/// Start the server
pub async fn serve(db: Database, host: &str, port: u16) -> anyhow::Result<()> {
    serve_with_config(db, host, port, ServerConfig::from_env()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("⚠️  Authentication disabled - do not expose to network!");
    }

    let state = AppState::from_env(db.clone(), config);
    info!(
        "Score model source: {}",
        state.scoring.models().source_label()
    );

    // Start the daily report scheduler if configured
    if let Some(schedule) = report_schedule_from_env() {
        start_report_scheduler(db, state.batch.clone(), schedule);
    }

    let app = create_router_with_state(state).into_make_service();
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn forbidden(msg: &str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// Map a core error by kind: input problems are 400, missing records 404
    pub fn from_core(err: fintrack_core::Error) -> Self {
        if err.is_validation() {
            Self::bad_request(&err.to_string())
        } else if err.is_not_found() {
            Self::not_found(&err.to_string())
        } else {
            Self::from(err)
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
