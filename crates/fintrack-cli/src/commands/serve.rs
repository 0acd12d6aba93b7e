//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use fintrack_server::{ServerConfig, API_KEYS_ENV};

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
) -> Result<()> {
    println!("🚀 Starting Fintrack web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);

    let mut config = ServerConfig::from_env();
    config.require_auth = !no_auth;

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else {
        println!(
            "   🔒 Authentication: {} header",
            fintrack_server::USER_EMAIL_HEADER
        );
        if !config.api_keys.is_empty() {
            println!(
                "   🔑 API keys: {} configured ({})",
                config.api_keys.len(),
                API_KEYS_ENV
            );
        }
    }
    println!();

    let db = open_db(db_path, no_encrypt)?;
    fintrack_server::serve_with_config(db, host, port, config)
        .await
        .context("Server error")?;

    Ok(())
}
