//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Local};
use fintrack_core::predictor::training::{generate_synthetic, train, TrainingConfig};
use fintrack_core::predictor::ModelCandidates;
use fintrack_core::{MemoryMailer, PdfRenderer};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    app: Router,
    db: Database,
    mailer: Arc<MemoryMailer>,
    _dir: TempDir,
}

fn setup_with(config: ServerConfig, models: ModelProvider, dir: TempDir) -> TestApp {
    let db = Database::in_memory().unwrap();
    let mailer = Arc::new(MemoryMailer::new());
    let reports = ReportGenerator::new(
        db.clone(),
        dir.path().join("reports"),
        Arc::new(PdfRenderer),
        "Fintrack Solutions",
    );
    let dispatcher =
        NotificationDispatcher::new(mailer.clone(), "reports@fintrack.local", "Fintrack Solutions");
    let state = AppState::new(
        db.clone(),
        config,
        Arc::new(models),
        reports,
        Some(dispatcher),
    );

    TestApp {
        app: create_router_with_state(state),
        db,
        mailer,
        _dir: dir,
    }
}

fn setup_test_app() -> TestApp {
    let config = ServerConfig {
        require_auth: false,
        allowed_origins: vec![],
        ..Default::default()
    };
    setup_with(config, ModelProvider::fallback_only(), TempDir::new().unwrap())
}

fn setup_auth_app() -> TestApp {
    let config = ServerConfig {
        require_auth: true,
        allowed_origins: vec![],
        api_keys: vec!["test-service-key".to_string()],
    };
    setup_with(config, ModelProvider::fallback_only(), TempDir::new().unwrap())
}

/// App whose models directory holds a freshly trained bundle
fn setup_trained_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let models_dir = dir.path().join("models");
    let bundle = train(
        &generate_synthetic(300, 11),
        &TrainingConfig {
            version: "test-1".to_string(),
            ..Default::default()
        },
    )
    .unwrap();
    bundle
        .save(&models_dir.join("credit_score_model.json"))
        .unwrap();

    let config = ServerConfig {
        require_auth: false,
        ..Default::default()
    };
    let models = ModelProvider::new(ModelCandidates::in_dir(&models_dir));
    setup_with(config, models, dir)
}

async fn get_body_json(response: axum::response::Response) -> Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_as(app, method, uri, body, None).await
}

async fn send_as(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    user: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(email) = user {
        builder = builder.header(USER_EMAIL_HEADER, email);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, get_body_json(response).await)
}

fn good_profile() -> Value {
    json!({
        "income": 80000.0,
        "age": 40,
        "employment_length": 8.0,
        "monthly_debt_payment": 10000.0,
        "debt_to_income": 0.2,
        "credit_utilization": 0.2,
        "payment_history": 0.95,
        "credit_mix": 0.7,
        "credit_history_length": 10.0,
        "public_records": 0,
        "total_accounts": 4,
        "delinquent_accounts": 0
    })
}

fn loan_body(account: &str, end_in_days: i64) -> Value {
    let today = Local::now().date_naive();
    json!({
        "account_number": account,
        "lender_name": "Equity Bank",
        "loan_type": "personal",
        "principal_amount": 120000.0,
        "interest_rate": 12.5,
        "term_months": 24,
        "start_date": (today - Duration::days(365)).to_string(),
        "end_date": (today + Duration::days(end_in_days)).to_string()
    })
}

fn prediction_body() -> Value {
    json!({
        "income": 60000.0,
        "age": 35,
        "employment_length": 5,
        "debt_to_income": 0.25,
        "credit_utilization": 0.3,
        "payment_history": 0.9,
        "credit_mix": 0.6,
        "new_credit": 0.2,
        "credit_history_length": 7,
        "public_records": 0
    })
}

// ========== Health ==========

#[tokio::test]
async fn test_health() {
    let t = setup_test_app();

    let (status, json) = send(&t.app, "GET", "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["database"], "connected");
    assert_eq!(json["model"], "fallback");
}

#[tokio::test]
async fn test_security_headers() {
    let t = setup_test_app();

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
}

// ========== Authentication ==========

#[tokio::test]
async fn test_auth_required() {
    let t = setup_auth_app();

    let (status, json) = send(&t.app, "GET", "/api/loans", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Authentication required");
}

#[tokio::test]
async fn test_health_skips_auth() {
    let t = setup_auth_app();

    let (status, _) = send(&t.app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_auth_with_header() {
    let t = setup_auth_app();

    let (status, json) = send_as(&t.app, "GET", "/api/users/me", None, Some("Jane@Example.com")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["email"], "jane@example.com");
}

#[tokio::test]
async fn test_admin_endpoints_need_api_key() {
    let t = setup_auth_app();

    let (status, _) = send_as(&t.app, "GET", "/api/audit", None, Some("jane@example.com")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/audit")
                .header("authorization", "Bearer test-service-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/audit")
                .header("authorization", "Bearer wrong-service-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_api_key_without_user_on_user_endpoint() {
    let t = setup_auth_app();

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/loans")
                .header("authorization", "Bearer test-service-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains(USER_EMAIL_HEADER));
}

#[test]
fn test_parse_api_keys() {
    assert_eq!(parse_api_keys(" a1 , ,b2,"), vec!["a1", "b2"]);
    assert!(parse_api_keys("").is_empty());
}

#[test]
fn test_validate_api_key() {
    let keys = vec!["secret-one".to_string(), "secret-two".to_string()];
    assert!(validate_api_key("secret-two", &keys));
    assert!(!validate_api_key("secret-thr", &keys));
    assert!(!validate_api_key("secret", &keys));
    assert!(!validate_api_key("secret-one", &[]));
}

#[test]
fn test_get_user_email() {
    let mut headers = HeaderMap::new();
    assert_eq!(get_user_email(&headers), "local-dev");

    headers.insert(AUTHORIZATION_HEADER, HeaderValue::from_static("Bearer k"));
    assert_eq!(get_user_email(&headers), "api-key");

    headers.insert(USER_EMAIL_HEADER, HeaderValue::from_static("ops@example.com"));
    assert_eq!(get_user_email(&headers), "ops@example.com");
}

// ========== Users ==========

#[tokio::test]
async fn test_create_user() {
    let t = setup_test_app();
    let body = json!({"email": "amina@example.com", "first_name": "Amina", "last_name": "Njeri"});

    let (status, json) = send(&t.app, "POST", "/api/users", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["first_name"], "Amina");

    let (status, _) = send(&t.app, "POST", "/api/users", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&t.app, "GET", "/api/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_user_header() {
    let t = setup_test_app();

    let (status, _) = send_as(&t.app, "GET", "/api/loans", None, Some("not-an-email")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ========== Credit score ==========

#[tokio::test]
async fn test_calculate_score() {
    let t = setup_test_app();

    let (status, json) = send(&t.app, "POST", "/api/score", Some(good_profile())).await;

    assert_eq!(status, StatusCode::OK);
    let score = json["score"].as_u64().unwrap();
    assert!((300..=850).contains(&score));
    assert_eq!(json["fallback"], false);
    assert!(!json["factors"].as_array().unwrap().is_empty());
    assert_eq!(json["financial_data"]["income"], 80000.0);

    let (status, latest) = send(&t.app, "GET", "/api/score/latest", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["score"], json["score"]);
    assert_eq!(latest["category"], json["category"]);
}

#[tokio::test]
async fn test_calculate_score_missing_fields() {
    let t = setup_test_app();

    let (status, json) = send(
        &t.app,
        "POST",
        "/api/score",
        Some(json!({"age": 30, "employment_length": 2})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["score"], 650);
    assert_eq!(json["fallback"], true);
    let error = json["error"].as_str().unwrap();
    assert!(error.contains("income"));
    assert!(error.contains("payment_history"));

    // Nothing was recorded
    let (status, _) = send(&t.app, "GET", "/api/score/latest", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_calculate_score_internal_failure_falls_back() {
    let t = setup_test_app();
    t.db.conn()
        .unwrap()
        .execute_batch("DROP TABLE financial_profiles")
        .unwrap();

    let (status, json) = send(&t.app, "POST", "/api/score", Some(good_profile())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["score"], 650);
    assert_eq!(json["category"], "Good");
    assert_eq!(json["fallback"], true);
    assert!(!json["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_calculate_score_invalid_json() {
    let t = setup_test_app();

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/score")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["score"], 650);
    assert_eq!(json["category"], "Good");
}

#[tokio::test]
async fn test_latest_score_without_history() {
    let t = setup_test_app();

    let (status, json) = send(&t.app, "GET", "/api/score/latest", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["score"], 650);
    assert_eq!(json["fallback"], true);
    assert_eq!(json["error"], "No credit score history found");
}

#[tokio::test]
async fn test_score_history_changes() {
    let t = setup_test_app();

    let (_, first) = send(&t.app, "POST", "/api/score", Some(good_profile())).await;
    let (_, second) = send(
        &t.app,
        "POST",
        "/api/score",
        Some(json!({
            "income": 80000.0,
            "age": 40,
            "employment_length": 8.0,
            "payment_history": 0.6,
            "credit_history_length": 10.0,
            "delinquent_accounts": 3
        })),
    )
    .await;

    let (status, json) = send(&t.app, "GET", "/api/score/history?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);

    let entries = json["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["score"], second["score"]);
    let change = second["score"].as_i64().unwrap() - first["score"].as_i64().unwrap();
    assert_eq!(entries[0]["change"], change);
    assert!(entries[1]["change"].is_null());
}

// ========== Profile ==========

#[tokio::test]
async fn test_profile_crud() {
    let t = setup_test_app();

    let (status, _) = send(&t.app, "GET", "/api/profile", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(
        &t.app,
        "PUT",
        "/api/profile",
        Some(json!({"income": 45000.0, "credit_utilization": 1.7})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["income"], 45000.0);
    assert_eq!(json["credit_utilization"], 1.0);
    // Untouched fields come from the placeholder profile
    assert_eq!(json["age"], 30);

    let (status, json) = send(&t.app, "PUT", "/api/profile", Some(json!({"income": 100.0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("income"));

    let (status, _) = send(&t.app, "PUT", "/api/profile", Some(json!({"age": 16}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&t.app, "GET", "/api/profile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["income"], 45000.0);
}

// ========== Model ==========

#[tokio::test]
async fn test_predict_without_model() {
    let t = setup_test_app();

    let (status, json) = send(&t.app, "POST", "/api/model/predict", Some(prediction_body())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("model"));

    let (status, _) = send(&t.app, "GET", "/api/model/info", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_predict_missing_field() {
    let t = setup_trained_app();
    let mut body = prediction_body();
    body.as_object_mut().unwrap().remove("new_credit");

    let (status, json) = send(&t.app, "POST", "/api/model/predict", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("new_credit"));
}

#[tokio::test]
async fn test_predict_with_trained_model() {
    let t = setup_trained_app();

    let (status, json) = send(&t.app, "POST", "/api/model/predict", Some(prediction_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["model_version"], "test-1");
    assert_eq!(json["source"], "tertiary");
    let score = json["score"].as_u64().unwrap();
    assert!((300..=850).contains(&score));

    let (status, info) = send(&t.app, "GET", "/api/model/info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["version"], "test-1");
    assert_eq!(info["feature_importance"].as_array().unwrap().len(), 15);

    let (_, health) = send(&t.app, "GET", "/api/health", None).await;
    assert_eq!(health["model"], "tertiary");
}

// ========== Loans ==========

#[tokio::test]
async fn test_loan_lifecycle() {
    let t = setup_test_app();

    let (status, loan) = send(&t.app, "POST", "/api/loans", Some(loan_body("EQ-001", 20))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loan["status"], "active");
    assert_eq!(loan["remaining_balance"], 120000.0);
    let id = loan["id"].as_i64().unwrap();

    // Profile aggregates follow the loan
    let (_, profile) = send(&t.app, "GET", "/api/profile", None).await;
    assert_eq!(profile["loan_amount"], 120000.0);
    assert_eq!(profile["total_accounts"], 1);

    let (status, json) = send(&t.app, "GET", "/api/loans", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);

    let (status, json) = send(
        &t.app,
        "PUT",
        &format!("/api/loans/{}", id),
        Some(json!({"interest_rate": 10.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["interest_rate"], 10.0);

    let (status, json) = send(&t.app, "GET", "/api/loans/due?days=30", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);

    let (status, json) = send(&t.app, "GET", "/api/loans/due?days=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.as_array().unwrap().is_empty());

    let (status, json) = send(
        &t.app,
        "POST",
        &format!("/api/loans/{}/payments", id),
        Some(json!({"amount": 20000.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["remaining_balance"], 100000.0);

    let (status, json) = send(
        &t.app,
        "POST",
        &format!("/api/loans/{}/payments", id),
        Some(json!({"amount": 100000.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "closed");

    let (status, _) = send(
        &t.app,
        "POST",
        &format!("/api/loans/{}/payments", id),
        Some(json!({"amount": 10.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&t.app, "DELETE", &format!("/api/loans/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (status, _) = send(&t.app, "GET", &format!("/api/loans/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_loan_validation() {
    let t = setup_test_app();
    let mut body = loan_body("EQ-002", 20);
    body["interest_rate"] = json!(45.0);

    let (status, _) = send(&t.app, "POST", "/api/loans", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = loan_body("EQ-003", 20);
    body["end_date"] = body["start_date"].clone();
    let (status, _) = send(&t.app, "POST", "/api/loans", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&t.app, "POST", "/api/loans", Some(loan_body("EQ-004", 20))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&t.app, "POST", "/api/loans", Some(loan_body("EQ-004", 20))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_loans_are_private() {
    let t = setup_test_app();

    let (_, loan) = send_as(
        &t.app,
        "POST",
        "/api/loans",
        Some(loan_body("KCB-1", 60)),
        Some("owner@example.com"),
    )
    .await;
    let uri = format!("/api/loans/{}", loan["id"]);

    let (status, _) = send_as(&t.app, "GET", &uri, None, Some("other@example.com")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_as(&t.app, "DELETE", &uri, None, Some("other@example.com")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_as(&t.app, "GET", &uri, None, Some("owner@example.com")).await;
    assert_eq!(status, StatusCode::OK);
}

// ========== Reports ==========

#[tokio::test]
async fn test_create_and_download_report() {
    let t = setup_test_app();
    send(&t.app, "POST", "/api/score", Some(good_profile())).await;
    send(&t.app, "POST", "/api/loans", Some(loan_body("EQ-100", 90))).await;

    let (status, report) = send(&t.app, "POST", "/api/reports", None).await;
    assert_eq!(status, StatusCode::OK);
    let id = report["id"].as_i64().unwrap();
    let file_name = report["file_name"].as_str().unwrap();
    assert!(file_name.starts_with("local@fintrack.local_Loan_Report_"));
    assert!(file_name.ends_with(".pdf"));
    assert_eq!(report["content_type"], "application/pdf");
    assert_eq!(
        report["download_url"],
        format!("/api/reports/{}/download", id)
    );

    let (status, list) = send(&t.app, "GET", "/api/reports", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/reports/{}/download", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/pdf"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(bytes.len() as i64, report["size_bytes"].as_i64().unwrap());
}

#[tokio::test]
async fn test_download_other_users_report() {
    let t = setup_auth_app();

    let (status, report) = send_as(&t.app, "POST", "/api/reports", None, Some("a@example.com")).await;
    assert_eq!(status, StatusCode::OK);
    let uri = format!("/api/reports/{}/download", report["id"]);

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(&uri)
                .header(USER_EMAIL_HEADER, "b@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(&uri)
                .header("authorization", "Bearer test-service-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_generate_report_with_email() {
    let t = setup_test_app();
    t.db.ensure_user("wanjiru@example.com").unwrap();

    let (status, json) = send(
        &t.app,
        "POST",
        "/api/reports/generate",
        Some(json!({"user_email": "wanjiru@example.com", "send_email": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["emailed"], true);

    let sent = t.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "wanjiru@example.com");
    assert_eq!(sent[0].subject, "Your Credit Report - Fintrack Solutions");

    let (status, _) = send(
        &t.app,
        "POST",
        "/api/reports/generate",
        Some(json!({"user_email": "nobody@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ========== Batch ==========

#[tokio::test]
async fn test_batch_reports() {
    let t = setup_test_app();
    send_as(&t.app, "POST", "/api/loans", Some(loan_body("B-1", 10)), Some("a@example.com")).await;
    send_as(&t.app, "POST", "/api/loans", Some(loan_body("B-2", 200)), Some("b@example.com")).await;
    t.db.ensure_user("c@example.com").unwrap();

    let (status, json) = send(
        &t.app,
        "POST",
        "/api/batch/reports",
        Some(json!({"criteria": "due_loans", "window_days": 30, "email": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["users"], 1);
    assert_eq!(json["generated"], 1);
    assert_eq!(json["emailed"], 1);
    assert_eq!(t.mailer.sent()[0].to, "a@example.com");

    let (status, json) = send(&t.app, "POST", "/api/batch/reports", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["criteria"], "active_loans");
    assert_eq!(json["users"], 2);
    assert_eq!(json["emailed"], 0);

    let (status, json) = send(
        &t.app,
        "POST",
        "/api/batch/reports",
        Some(json!({"criteria": "all"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["users"], 3);

    let (status, _) = send(
        &t.app,
        "POST",
        "/api/batch/reports",
        Some(json!({"criteria": "overdue"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ========== Sentiment ==========

#[tokio::test]
async fn test_sentiment_flow() {
    let t = setup_test_app();

    let (status, _) = send(&t.app, "GET", "/api/sentiment/risk", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(
        &t.app,
        "POST",
        "/api/sentiment",
        Some(json!({"response_text": "I am confident and my savings are growing"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["response"]["sentiment_score"].as_f64().unwrap() > 0.0);

    let (status, json) = send(&t.app, "GET", "/api/sentiment/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["recent_responses"].as_array().unwrap().len(), 1);

    let (status, json) = send(&t.app, "GET", "/api/sentiment/trend", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["entries"].as_array().unwrap().len(), 1);

    let (status, json) = send(&t.app, "GET", "/api/sentiment/risk", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["samples"], 1);

    let (status, _) = send(
        &t.app,
        "POST",
        "/api/sentiment",
        Some(json!({"response_text": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ========== Audit ==========

#[tokio::test]
async fn test_audit_log_records_access() {
    let t = setup_test_app();
    send(&t.app, "POST", "/api/score", Some(good_profile())).await;
    send(&t.app, "GET", "/api/loans", None).await;

    let (status, json) = send(&t.app, "GET", "/api/audit?limit=10", None).await;
    assert_eq!(status, StatusCode::OK);

    let actions: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert!(actions.contains(&"calculate"));
    assert!(actions.contains(&"list"));
}
