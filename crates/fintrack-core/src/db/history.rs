//! Score history ledger
//!
//! Append-only: rows are inserted by `append_snapshot` and never updated.
//! Reads return newest first.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row, ToSql};

use super::profiles::{feature_params, features_from_row, FEATURE_COLUMNS, FEATURE_COLUMN_COUNT};
use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{ProfileFeatures, ScoreCategory, ScoreSnapshot};

fn row_to_snapshot(row: &Row) -> rusqlite::Result<ScoreSnapshot> {
    let category: String = row.get(3)?;
    let calculated_at: String = row.get(4)?;
    let score: i64 = row.get(2)?;
    let score = u16::try_from(score).unwrap_or(300);
    Ok(ScoreSnapshot {
        id: row.get(0)?,
        user_id: row.get(1)?,
        score,
        category: category
            .parse()
            .unwrap_or_else(|_| ScoreCategory::from_score(score)),
        calculated_at: parse_datetime(&calculated_at),
        features: features_from_row(row, 5)?,
    })
}

impl Database {
    /// Append one snapshot to a user's score history
    pub fn append_snapshot(
        &self,
        user_id: i64,
        score: u16,
        category: ScoreCategory,
        calculated_at: DateTime<Utc>,
        features: &ProfileFeatures,
    ) -> Result<ScoreSnapshot> {
        if !(300..=850).contains(&score) {
            return Err(Error::InvalidData(format!(
                "score {} outside 300-850",
                score
            )));
        }

        let conn = self.conn()?;
        let placeholders = vec!["?"; FEATURE_COLUMN_COUNT].join(", ");
        let sql = format!(
            "INSERT INTO credit_score_history (user_id, score, category, calculated_at, {}) \
             VALUES (?, ?, ?, ?, {})",
            FEATURE_COLUMNS, placeholders
        );

        let score_value = score as i64;
        let category_value = category.as_str();
        let timestamp = format_datetime(&calculated_at);
        let mut values: Vec<&dyn ToSql> = vec![&user_id, &score_value, &category_value, &timestamp];
        values.extend(feature_params(features));
        conn.execute(&sql, values.as_slice())?;

        Ok(ScoreSnapshot {
            id: conn.last_insert_rowid(),
            user_id,
            score,
            category,
            calculated_at,
            features: *features,
        })
    }

    /// Most recent snapshots for a user, newest first
    pub fn score_history(&self, user_id: i64, limit: i64) -> Result<Vec<ScoreSnapshot>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, user_id, score, category, calculated_at, {} \
             FROM credit_score_history WHERE user_id = ? \
             ORDER BY calculated_at DESC, id DESC LIMIT ?",
            FEATURE_COLUMNS
        ))?;

        let snapshots = stmt
            .query_map(params![user_id, limit], row_to_snapshot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(snapshots)
    }

    /// The newest snapshot, if any
    pub fn latest_snapshot(&self, user_id: i64) -> Result<Option<ScoreSnapshot>> {
        Ok(self.score_history(user_id, 1)?.into_iter().next())
    }

    /// Number of snapshots recorded for a user
    pub fn count_snapshots(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM credit_score_history WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
