//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `users` - User registration and lookup
//! - `profiles` - Financial profile upserts
//! - `history` - Score history ledger (append-only)
//! - `loans` - Loan accounts, payments, and profile aggregation
//! - `reports` - Credit report request records
//! - `sentiment` - Survey responses and sentiment history
//! - `audit` - Audit log

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod audit;
mod history;
mod loans;
mod profiles;
mod reports;
mod sentiment;
mod users;

pub use users::normalize_email;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "FINTRACK_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Fixed application salt - changing this would invalidate all existing encrypted databases
    const APP_SALT: &[u8; 16] = b"fintrack-salt-v1";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Format a timestamp the way SQLite's CURRENT_TIMESTAMP does, keeping
/// sub-second precision so ledger ordering is stable
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Parse a stored ISO date, surfacing bad rows as conversion errors
pub(crate) fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Whether an error is a UNIQUE/constraint violation
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `FINTRACK_DB_KEY` environment variable to be set.
    /// Returns an error if it is not set. Use `new_unencrypted()`
    /// for development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        let encryption_key = std::env::var(DB_KEY_ENV).ok();
        match encryption_key {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    ///
    /// WARNING: Only use for development or testing.
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            // Use with_init to set the key on every new connection
            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                Ok(())
            });

            Pool::builder().max_size(10).build(manager)?
        } else {
            let manager =
                manager.with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create an in-memory database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because SQLCipher
    /// has issues with in-memory databases in the connection pool.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "fintrack_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path.to_string_lossy())
    }

    /// Check if the database is encrypted
    pub fn is_encrypted(&self) -> Result<bool> {
        let conn = self.conn()?;
        // SQLCipher sets cipher_version if encryption is active
        let result: rusqlite::Result<String> =
            conn.query_row("PRAGMA cipher_version;", [], |row| row.get(0));
        Ok(result.is_ok() && std::env::var(DB_KEY_ENV).is_ok())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Cheap liveness probe for health checks
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- WAL mode: readers don't block the writer during batch runs
            PRAGMA journal_mode = WAL;
            PRAGMA cache_size = 2000;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Users (identity is supplied by the auth layer)
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                first_name TEXT,
                last_name TEXT,
                date_joined DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- One financial profile per user (upsert)
            CREATE TABLE IF NOT EXISTS financial_profiles (
                user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                income REAL NOT NULL,
                age INTEGER NOT NULL,
                employment_length REAL NOT NULL,
                monthly_debt_payment REAL NOT NULL DEFAULT 0,
                total_credit_limit REAL NOT NULL DEFAULT 0,
                current_credit_balance REAL NOT NULL DEFAULT 0,
                debt_to_income REAL NOT NULL,
                credit_utilization REAL NOT NULL,
                payment_history REAL NOT NULL,
                credit_mix REAL NOT NULL,
                new_credit REAL NOT NULL,
                credit_history_length REAL NOT NULL,
                public_records INTEGER NOT NULL DEFAULT 0,
                total_accounts INTEGER NOT NULL DEFAULT 0,
                delinquent_accounts INTEGER NOT NULL DEFAULT 0,
                loan_amount REAL NOT NULL DEFAULT 0,
                interest_rate REAL NOT NULL DEFAULT 0,
                monthly_payment REAL NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Score history ledger: append-only, never updated
            CREATE TABLE IF NOT EXISTS credit_score_history (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                score INTEGER NOT NULL CHECK (score BETWEEN 300 AND 850),
                category TEXT NOT NULL,
                calculated_at TEXT NOT NULL,
                income REAL NOT NULL,
                age INTEGER NOT NULL,
                employment_length REAL NOT NULL,
                monthly_debt_payment REAL NOT NULL,
                total_credit_limit REAL NOT NULL,
                current_credit_balance REAL NOT NULL,
                debt_to_income REAL NOT NULL,
                credit_utilization REAL NOT NULL,
                payment_history REAL NOT NULL,
                credit_mix REAL NOT NULL,
                new_credit REAL NOT NULL,
                credit_history_length REAL NOT NULL,
                public_records INTEGER NOT NULL,
                total_accounts INTEGER NOT NULL,
                delinquent_accounts INTEGER NOT NULL,
                loan_amount REAL NOT NULL,
                interest_rate REAL NOT NULL,
                monthly_payment REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_score_history_user ON credit_score_history(user_id, calculated_at DESC);

            -- Loan accounts
            CREATE TABLE IF NOT EXISTS loan_accounts (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                account_number TEXT NOT NULL UNIQUE,
                lender_name TEXT NOT NULL,
                loan_type TEXT NOT NULL DEFAULT 'personal',
                principal_amount REAL NOT NULL,
                remaining_balance REAL NOT NULL,
                interest_rate REAL NOT NULL,
                term_months INTEGER NOT NULL,
                monthly_payment REAL NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',   -- active, closed, defaulted
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_loans_user ON loan_accounts(user_id);
            CREATE INDEX IF NOT EXISTS idx_loans_status_end ON loan_accounts(status, end_date);

            -- Generated report documents
            CREATE TABLE IF NOT EXISTS credit_report_requests (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                file_name TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_reports_user ON credit_report_requests(user_id, created_at DESC);

            -- Sentiment survey responses
            CREATE TABLE IF NOT EXISTS sentiment_responses (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                response_text TEXT NOT NULL,
                sentiment_score REAL NOT NULL,
                ordinal_sentiment TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sentiment_responses_user ON sentiment_responses(user_id);

            -- Running sentiment aggregates
            CREATE TABLE IF NOT EXISTS sentiment_history (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                average_intensity_score REAL NOT NULL,
                average_ordinal_sentiment TEXT NOT NULL,
                personal_sentiment_score REAL NOT NULL,
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sentiment_history_user ON sentiment_history(user_id, recorded_at DESC);

            -- Audit log
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                user_email TEXT NOT NULL,
                action TEXT NOT NULL,
                entity_type TEXT,
                entity_id INTEGER,
                details TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_audit_log_user ON audit_log(user_email);
            CREATE INDEX IF NOT EXISTS idx_audit_log_timestamp ON audit_log(timestamp);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

/// Audit log entry
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub user_email: String,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub details: Option<String>,
}

#[cfg(test)]
mod tests;
