//! Credit report request records

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::CreditReportRequest;

fn row_to_request(row: &Row) -> rusqlite::Result<CreditReportRequest> {
    let created_at: String = row.get(5)?;
    Ok(CreditReportRequest {
        id: row.get(0)?,
        user_id: row.get(1)?,
        file_name: row.get(2)?,
        content_hash: row.get(3)?,
        size_bytes: row.get(4)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Record a generated report; rows are never updated afterwards
    pub fn insert_report_request(
        &self,
        user_id: i64,
        file_name: &str,
        content_hash: &str,
        size_bytes: i64,
    ) -> Result<CreditReportRequest> {
        let conn = self.conn()?;
        let now = Utc::now();
        conn.execute(
            r#"
            INSERT INTO credit_report_requests (user_id, file_name, content_hash, size_bytes, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![user_id, file_name, content_hash, size_bytes, format_datetime(&now)],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_report_request(id)?
            .ok_or_else(|| Error::NotFound(format!("report {}", id)))
    }

    pub fn get_report_request(&self, id: i64) -> Result<Option<CreditReportRequest>> {
        let conn = self.conn()?;
        let request = conn
            .query_row(
                "SELECT id, user_id, file_name, content_hash, size_bytes, created_at \
                 FROM credit_report_requests WHERE id = ?",
                params![id],
                row_to_request,
            )
            .optional()?;
        Ok(request)
    }

    /// A user's reports, newest first
    pub fn list_report_requests(&self, user_id: i64) -> Result<Vec<CreditReportRequest>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, file_name, content_hash, size_bytes, created_at \
             FROM credit_report_requests WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )?;
        let requests = stmt
            .query_map(params![user_id], row_to_request)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(requests)
    }
}
