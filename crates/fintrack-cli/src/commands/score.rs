//! Credit score command implementations

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use fintrack_core::db::Database;
use fintrack_core::models::ProfileUpdate;
use fintrack_core::{ModelProvider, ScoreResult, ScoringService};

use super::find_user;

fn scoring_service(db: &Database) -> ScoringService {
    ScoringService::new(db.clone(), Arc::new(ModelProvider::from_env()))
}

fn print_result(result: &ScoreResult) {
    println!("📈 Credit score: {} ({})", result.score, result.category);
    println!("   {}", result.message);

    if !result.breakdown.is_empty() {
        println!();
        println!("   {:<28} {:>8}", "Factor", "Points");
        println!("   {}", "-".repeat(37));
        for factor in &result.breakdown {
            println!("   {:<28} {:>8.1}", factor.label, factor.points);
        }
    }

    if !result.factors.is_empty() {
        println!();
        for factor in &result.factors {
            println!("   • {}", factor);
        }
    }
}

/// Merge profile JSON into the user's profile and score it
pub fn cmd_score_calc(db: &Database, user_email: &str, profile_json: &str) -> Result<ScoreResult> {
    let update: ProfileUpdate =
        serde_json::from_str(profile_json).context("Invalid profile JSON")?;
    let user = db.ensure_user(user_email)?;

    let result = scoring_service(db).calculate(user.id, &update)?;
    if result.fallback {
        bail!(
            "Score calculation failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }

    print_result(&result);
    Ok(result)
}

pub fn cmd_score_latest(db: &Database, user_email: &str) -> Result<()> {
    let user = find_user(db, user_email)?;
    let result = scoring_service(db).latest(user.id)?;

    print_result(&result);
    if let Some(at) = result.calculated_at {
        println!();
        println!("   Calculated: {}", at.format("%Y-%m-%d %H:%M UTC"));
    }
    Ok(())
}

pub fn cmd_score_history(db: &Database, user_email: &str, limit: i64) -> Result<()> {
    let user = find_user(db, user_email)?;
    let history = scoring_service(db).history(user.id, limit)?;

    if history.entries.is_empty() {
        println!("No score history for {}", user.email);
        return Ok(());
    }

    println!("📜 Score history for {}", user.email);
    println!();
    println!("{:<18} {:>6} {:<12} {:>7}", "Date", "Score", "Category", "Change");
    println!("{}", "-".repeat(46));

    for entry in &history.entries {
        let change = match entry.change {
            Some(c) => format!("{:+}", c),
            None => "-".to_string(),
        };
        println!(
            "{:<18} {:>6} {:<12} {:>7}",
            entry.snapshot.calculated_at.format("%Y-%m-%d %H:%M"),
            entry.snapshot.score,
            entry.snapshot.category.as_str(),
            change
        );
    }

    println!();
    println!(
        "Average {:.0}, volatility {:.1}, net change {:+.0} over {} entries",
        history.trend.mean, history.trend.volatility, history.trend.net_change, history.trend.count
    );
    Ok(())
}
