//! Error types for Fintrack

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Training error: {0}")]
    Training(String),
}

impl Error {
    /// Input problems the caller can fix (maps to 400 at the API boundary)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingFields(_) | Self::Validation(_) | Self::InvalidData(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
