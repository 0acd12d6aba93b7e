//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, user lookup)
//! - `loans` - Loan account commands (list, add, pay, due)
//! - `model` - Score model commands (data, train, info)
//! - `reports` - Report generation, batch runs and the daily schedule
//! - `score` - Credit score commands (calc, latest, history)
//! - `sentiment` - Survey response and risk commands
//! - `serve` - Web server command

pub mod core;
pub mod loans;
pub mod model;
pub mod reports;
pub mod score;
pub mod sentiment;
pub mod serve;

// Re-export command functions for main.rs
pub use core::*;
pub use loans::*;
pub use model::*;
pub use reports::*;
pub use score::*;
pub use sentiment::*;
pub use serve::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
