//! User operations

use std::sync::OnceLock;

use regex::Regex;
use rusqlite::{params, OptionalExtension, Row};

use super::{is_constraint_violation, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{NewUser, User};

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"))
}

/// Normalize and check an email address
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if !email_pattern().is_match(&email) {
        return Err(Error::Validation(format!("Invalid email address: {}", email)));
    }
    Ok(email)
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    let joined: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        date_joined: parse_datetime(&joined),
    })
}

const USER_COLUMNS: &str = "id, email, first_name, last_name, date_joined";

impl Database {
    /// Register a new user; fails if the email is taken
    pub fn create_user(&self, new_user: &NewUser) -> Result<User> {
        let email = normalize_email(&new_user.email)?;
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO users (email, first_name, last_name) VALUES (?, ?, ?)",
            params![email, new_user.first_name, new_user.last_name],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                Error::Validation(format!("User {} already exists", email))
            } else {
                Error::Database(e)
            }
        })?;

        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_user(id)?
            .ok_or_else(|| Error::NotFound(format!("user {}", id)))
    }

    /// Get the user for an email, creating a bare record on first sight
    pub fn ensure_user(&self, email: &str) -> Result<User> {
        let email = normalize_email(email)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO users (email) VALUES (?)",
            params![email],
        )?;
        drop(conn);
        self.get_user_by_email(&email)?
            .ok_or_else(|| Error::NotFound(format!("user {}", email)))
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
                params![id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS),
                params![email.trim().to_lowercase()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// List all users ordered by id
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }
}
