//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `find_user` - Look up an existing user by email
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{bail, Context, Result};
use fintrack_core::db::{Database, DB_KEY_ENV};
use fintrack_core::models::User;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// The user for an email; commands that only read never create users
pub fn find_user(db: &Database, email: &str) -> Result<User> {
    match db.get_user_by_email(email)? {
        Some(user) => Ok(user),
        None => bail!("User not found: {}", email),
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;
    db.ping().context("Database check failed")?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED ({})", DB_KEY_ENV);
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Train a score model: fintrack model train");
    println!("  2. Start the API: fintrack serve");

    Ok(())
}
