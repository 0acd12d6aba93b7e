//! Sentiment command implementations

use anyhow::Result;
use fintrack_core::db::Database;
use fintrack_core::sentiment::SentimentRecord;
use fintrack_core::SentimentService;

use super::find_user;

pub fn cmd_sentiment_add(db: &Database, user_email: &str, text: &str) -> Result<SentimentRecord> {
    let user = db.ensure_user(user_email)?;
    let record = SentimentService::with_lexicon(db.clone()).record(user.id, text)?;

    println!(
        "💬 Recorded response {}: {} (intensity {:+.2})",
        record.response.id, record.response.ordinal_sentiment, record.response.sentiment_score
    );
    println!(
        "   Personal sentiment score: {:.1} / 100",
        record.history.personal_sentiment_score
    );
    Ok(record)
}

pub fn cmd_sentiment_risk(db: &Database, user_email: &str) -> Result<()> {
    let user = find_user(db, user_email)?;
    let risk = SentimentService::with_lexicon(db.clone()).risk(user.id)?;

    println!("🧭 Sentiment risk for {}: {}", user.email, risk.risk_level.as_str());
    println!("   {}", risk.description);
    println!();
    println!("   Average score:  {:.1}", risk.average_score);
    println!("   Volatility:     {:.1}", risk.volatility);
    println!("   Recent change:  {:+.1}", risk.recent_change);
    println!("   Samples:        {}", risk.samples);
    Ok(())
}
