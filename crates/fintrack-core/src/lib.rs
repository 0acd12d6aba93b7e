//! Fintrack Core Library
//!
//! Shared functionality for the Fintrack credit and loan management backend:
//! - Database access and migrations (users, profiles, score ledger, loans)
//! - Rule-based credit scoring with factor breakdowns
//! - Pluggable score predictors with a fallback chain of trained models
//! - Credit report rendering (PDF and plain text)
//! - Report email delivery through pluggable mailers
//! - Batch report runs over user cohorts
//! - Sentiment-based risk assessment

pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod files;
pub mod models;
pub mod notify;
pub mod predictor;
pub mod report;
pub mod scoring;
pub mod sentiment;
pub mod trend;

pub use batch::{BatchOrchestrator, BatchSummary, CohortCriteria, ScheduleConfig};
pub use db::{normalize_email, AuditEntry, Database};
pub use error::{Error, Result};
pub use notify::{
    EmailMessage, HttpRelayMailer, MailConfig, Mailer, MemoryMailer, NotificationDispatcher,
    OutboxMailer,
};
pub use predictor::{
    FallbackPredictor, FeatureVector, ModelBundle, ModelInfo, ModelProvider, Prediction,
    PredictionRequest, Predictor,
};
pub use report::{
    GeneratedReport, PdfRenderer, ReportDocument, ReportGenerator, ReportRenderer, TextRenderer,
};
pub use scoring::{ScoreHistory, ScoreResult, ScoringService};
pub use sentiment::{
    LexiconClassifier, RiskAssessment, RiskLevel, SentimentClassifier, SentimentService,
};
pub use trend::TrendSummary;
