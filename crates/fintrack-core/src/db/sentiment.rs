//! Sentiment response and history operations

use chrono::Utc;
use rusqlite::{params, Row};

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{SentimentHistoryEntry, SentimentOrdinal, SentimentResponse};

fn row_to_response(row: &Row) -> rusqlite::Result<SentimentResponse> {
    let ordinal: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let score: f64 = row.get(3)?;
    Ok(SentimentResponse {
        id: row.get(0)?,
        user_id: row.get(1)?,
        response_text: row.get(2)?,
        sentiment_score: score,
        ordinal_sentiment: ordinal
            .parse()
            .unwrap_or_else(|_| SentimentOrdinal::from_intensity(score)),
        created_at: parse_datetime(&created_at),
    })
}

fn row_to_history(row: &Row) -> rusqlite::Result<SentimentHistoryEntry> {
    let ordinal: String = row.get(3)?;
    let recorded_at: String = row.get(5)?;
    let intensity: f64 = row.get(2)?;
    Ok(SentimentHistoryEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        average_intensity_score: intensity,
        average_ordinal_sentiment: ordinal
            .parse()
            .unwrap_or_else(|_| SentimentOrdinal::from_intensity(intensity)),
        personal_sentiment_score: row.get(4)?,
        recorded_at: parse_datetime(&recorded_at),
    })
}

impl Database {
    pub fn insert_sentiment_response(
        &self,
        user_id: i64,
        text: &str,
        intensity: f64,
        ordinal: SentimentOrdinal,
    ) -> Result<SentimentResponse> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO sentiment_responses (user_id, response_text, sentiment_score, ordinal_sentiment, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![user_id, text, intensity, ordinal.as_str(), format_datetime(&Utc::now())],
        )?;
        let id = conn.last_insert_rowid();
        let response = conn
            .query_row(
                "SELECT id, user_id, response_text, sentiment_score, ordinal_sentiment, created_at \
                 FROM sentiment_responses WHERE id = ?",
                params![id],
                row_to_response,
            )
            .map_err(|_| Error::NotFound(format!("sentiment response {}", id)))?;
        Ok(response)
    }

    /// A user's responses, newest first
    pub fn list_sentiment_responses(&self, user_id: i64, limit: i64) -> Result<Vec<SentimentResponse>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, response_text, sentiment_score, ordinal_sentiment, created_at \
             FROM sentiment_responses WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        )?;
        let responses = stmt
            .query_map(params![user_id, limit], row_to_response)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(responses)
    }

    /// Mean intensity over all of a user's responses
    pub fn average_sentiment_intensity(&self, user_id: i64) -> Result<Option<f64>> {
        let conn = self.conn()?;
        let avg: Option<f64> = conn.query_row(
            "SELECT AVG(sentiment_score) FROM sentiment_responses WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(avg)
    }

    pub fn append_sentiment_history(
        &self,
        user_id: i64,
        average_intensity: f64,
        ordinal: SentimentOrdinal,
        personal_score: f64,
    ) -> Result<SentimentHistoryEntry> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO sentiment_history (user_id, average_intensity_score, average_ordinal_sentiment,
                personal_sentiment_score, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                average_intensity,
                ordinal.as_str(),
                personal_score,
                format_datetime(&Utc::now())
            ],
        )?;
        let id = conn.last_insert_rowid();
        let entry = conn
            .query_row(
                "SELECT id, user_id, average_intensity_score, average_ordinal_sentiment, \
                 personal_sentiment_score, recorded_at FROM sentiment_history WHERE id = ?",
                params![id],
                row_to_history,
            )
            .map_err(|_| Error::NotFound(format!("sentiment history {}", id)))?;
        Ok(entry)
    }

    /// Most recent sentiment history rows, newest first
    pub fn sentiment_history(&self, user_id: i64, limit: i64) -> Result<Vec<SentimentHistoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, average_intensity_score, average_ordinal_sentiment, \
             personal_sentiment_score, recorded_at FROM sentiment_history \
             WHERE user_id = ? ORDER BY recorded_at DESC, id DESC LIMIT ?",
        )?;
        let entries = stmt
            .query_map(params![user_id, limit], row_to_history)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
