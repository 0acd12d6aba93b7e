//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Fintrack - Credit scoring and loan management
#[derive(Parser)]
#[command(name = "fintrack")]
#[command(about = "Credit scoring, loan tracking and credit report backend", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "fintrack.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set FINTRACK_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires the gateway user header or an API key.
        #[arg(long)]
        no_auth: bool,
    },

    /// Calculate and inspect credit scores
    Score {
        #[command(subcommand)]
        action: ScoreAction,
    },

    /// Manage loan accounts
    Loans {
        #[command(subcommand)]
        action: LoansAction,
    },

    /// Generate and list credit reports
    Report {
        #[command(subcommand)]
        action: ReportAction,
    },

    /// Generate reports for a cohort of users
    Batch {
        /// Cohort: all, due (due_loans) or active (active_loans)
        #[arg(default_value = "active")]
        criteria: String,

        /// Email each generated report to its user
        #[arg(long)]
        email: bool,

        /// Due-loan window in days (defaults to FINTRACK_DUE_WINDOW_DAYS)
        #[arg(long)]
        window_days: Option<i64>,
    },

    /// Run the report batch daily at FINTRACK_REPORT_TIME
    Schedule {
        /// Run one batch immediately and exit
        #[arg(long)]
        once: bool,
    },

    /// Train and inspect score models
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },

    /// Record survey responses and assess sentiment risk
    Sentiment {
        #[command(subcommand)]
        action: SentimentAction,
    },
}

#[derive(Subcommand)]
pub enum ScoreAction {
    /// Update a user's profile and calculate a score
    Calc {
        /// User email
        #[arg(short, long)]
        user: String,

        /// Profile fields as JSON, e.g. '{"income": 50000, "age": 30, ...}'
        #[arg(short, long)]
        profile: String,
    },

    /// Show the latest score
    Latest {
        /// User email
        #[arg(short, long)]
        user: String,
    },

    /// Show score history with changes
    History {
        /// User email
        #[arg(short, long)]
        user: String,

        /// Maximum entries to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum LoansAction {
    /// List a user's loans
    List {
        /// User email
        #[arg(short, long)]
        user: String,
    },

    /// Add a loan from JSON
    Add {
        /// User email
        #[arg(short, long)]
        user: String,

        /// Loan fields as JSON (account_number, lender_name, principal_amount, ...)
        #[arg(short, long)]
        loan: String,
    },

    /// Record a payment against a loan
    Pay {
        /// Loan ID
        id: i64,

        /// Payment amount
        amount: f64,
    },

    /// Show a user's active loans due within a window
    Due {
        /// User email
        #[arg(short, long)]
        user: String,

        /// Window in days (defaults to FINTRACK_DUE_WINDOW_DAYS)
        #[arg(short, long)]
        days: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum ReportAction {
    /// Generate reports for a cohort, or for one user with --user
    Generate {
        /// Cohort: all, due (due_loans) or active (active_loans)
        #[arg(default_value = "active")]
        criteria: String,

        /// Generate for this user only
        #[arg(short, long)]
        user: Option<String>,

        /// Email each generated report to its user
        #[arg(long)]
        email: bool,

        /// Due-loan window in days (defaults to FINTRACK_DUE_WINDOW_DAYS)
        #[arg(long)]
        window_days: Option<i64>,
    },

    /// List a user's generated reports
    List {
        /// User email
        #[arg(short, long)]
        user: String,
    },
}

#[derive(Subcommand)]
pub enum ModelAction {
    /// Write a synthetic training dataset to CSV
    Data {
        /// Output CSV path
        #[arg(short, long, default_value = "credit_training_data.csv")]
        output: PathBuf,

        /// Number of rows
        #[arg(short, long, default_value = "5000")]
        rows: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Train a model and write its bundle
    Train {
        /// Training CSV (generates synthetic data when omitted)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Bundle output path (defaults to the primary model in FINTRACK_MODELS_DIR)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Synthetic rows when no CSV is given
        #[arg(short, long, default_value = "5000")]
        rows: usize,

        /// Random seed for synthetic data
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Ridge penalty
        #[arg(long, default_value = "1.0")]
        alpha: f64,

        /// Model version label
        #[arg(long)]
        model_version: Option<String>,
    },

    /// Show the resolved model and the candidate chain
    Info,
}

#[derive(Subcommand)]
pub enum SentimentAction {
    /// Record a survey response
    Add {
        /// User email
        #[arg(short, long)]
        user: String,

        /// Response text
        text: String,
    },

    /// Show a user's sentiment risk
    Risk {
        /// User email
        #[arg(short, long)]
        user: String,
    },
}
