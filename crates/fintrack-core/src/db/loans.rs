//! Loan account operations and profile aggregation

use chrono::{Duration, NaiveDate};
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::{is_constraint_violation, parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    round2, FinancialProfile, LoanAccount, LoanStatus, LoanUpdate, NewLoanAccount, User,
};

const LOAN_COLUMNS: &str = "id, user_id, account_number, lender_name, loan_type, principal_amount, \
     remaining_balance, interest_rate, term_months, monthly_payment, start_date, end_date, status, \
     created_at, updated_at";

fn row_to_loan(row: &Row) -> rusqlite::Result<LoanAccount> {
    let loan_type: String = row.get(4)?;
    let start: String = row.get(10)?;
    let end: String = row.get(11)?;
    let status: String = row.get(12)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;

    Ok(LoanAccount {
        id: row.get(0)?,
        user_id: row.get(1)?,
        account_number: row.get(2)?,
        lender_name: row.get(3)?,
        loan_type: loan_type.parse().unwrap_or_default(),
        principal_amount: row.get(5)?,
        remaining_balance: row.get(6)?,
        interest_rate: row.get(7)?,
        term_months: row.get(8)?,
        monthly_payment: row.get(9)?,
        start_date: parse_date(10, &start)?,
        end_date: parse_date(11, &end)?,
        status: status.parse().unwrap_or_default(),
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

fn map_duplicate(e: rusqlite::Error, account_number: &str) -> Error {
    if is_constraint_violation(&e) {
        Error::Validation(format!(
            "Loan account number {} already exists",
            account_number
        ))
    } else {
        Error::Database(e)
    }
}

impl Database {
    /// Create a loan and refresh the owner's profile aggregates
    pub fn create_loan(&self, user_id: i64, loan: &NewLoanAccount) -> Result<LoanAccount> {
        loan.validate()?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO loan_accounts (user_id, account_number, lender_name, loan_type,
                principal_amount, remaining_balance, interest_rate, term_months, monthly_payment,
                start_date, end_date, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                loan.account_number.trim(),
                loan.lender_name.trim(),
                loan.loan_type.as_str(),
                round2(loan.principal_amount),
                round2(loan.remaining_balance.unwrap_or(loan.principal_amount)),
                loan.interest_rate,
                loan.term_months,
                loan.resolved_monthly_payment(),
                loan.start_date.to_string(),
                loan.end_date.to_string(),
                loan.status.as_str(),
            ],
        )
        .map_err(|e| map_duplicate(e, &loan.account_number))?;

        let id = conn.last_insert_rowid();
        drop(conn);

        self.refresh_profile_aggregates(user_id)?;
        self.get_loan(id)?
            .ok_or_else(|| Error::NotFound(format!("loan {}", id)))
    }

    pub fn get_loan(&self, id: i64) -> Result<Option<LoanAccount>> {
        let conn = self.conn()?;
        let loan = conn
            .query_row(
                &format!("SELECT {} FROM loan_accounts WHERE id = ?", LOAN_COLUMNS),
                params![id],
                row_to_loan,
            )
            .optional()?;
        Ok(loan)
    }

    /// All loans for a user, most recent start first
    pub fn list_loans(&self, user_id: i64) -> Result<Vec<LoanAccount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM loan_accounts WHERE user_id = ? ORDER BY start_date DESC, id DESC",
            LOAN_COLUMNS
        ))?;
        let loans = stmt
            .query_map(params![user_id], row_to_loan)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(loans)
    }

    /// Apply a partial edit, re-validate, and refresh aggregates
    pub fn update_loan(&self, id: i64, update: &LoanUpdate) -> Result<LoanAccount> {
        let existing = self
            .get_loan(id)?
            .ok_or_else(|| Error::NotFound(format!("loan {}", id)))?;
        let updated = update.apply_to(&existing)?;
        self.write_loan(&updated)?;
        self.refresh_profile_aggregates(updated.user_id)?;
        self.get_loan(id)?
            .ok_or_else(|| Error::NotFound(format!("loan {}", id)))
    }

    fn write_loan(&self, loan: &LoanAccount) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE loan_accounts SET lender_name = ?, loan_type = ?, principal_amount = ?,
                remaining_balance = ?, interest_rate = ?, term_months = ?, monthly_payment = ?,
                start_date = ?, end_date = ?, status = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
            params![
                loan.lender_name,
                loan.loan_type.as_str(),
                loan.principal_amount,
                loan.remaining_balance,
                loan.interest_rate,
                loan.term_months,
                loan.monthly_payment,
                loan.start_date.to_string(),
                loan.end_date.to_string(),
                loan.status.as_str(),
                loan.id,
            ],
        )?;
        Ok(())
    }

    /// Delete a loan; returns false if it did not exist
    pub fn delete_loan(&self, id: i64) -> Result<bool> {
        let Some(loan) = self.get_loan(id)? else {
            return Ok(false);
        };
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM loan_accounts WHERE id = ?", params![id])?;
        drop(conn);
        self.refresh_profile_aggregates(loan.user_id)?;
        Ok(deleted > 0)
    }

    /// Record a payment against an active loan.
    ///
    /// The balance never goes below zero; a loan paid to zero is closed.
    pub fn record_payment(&self, id: i64, amount: f64) -> Result<LoanAccount> {
        if !(amount.is_finite() && amount > 0.0) {
            return Err(Error::Validation(
                "payment amount must be greater than 0".to_string(),
            ));
        }
        let mut loan = self
            .get_loan(id)?
            .ok_or_else(|| Error::NotFound(format!("loan {}", id)))?;
        if loan.status != LoanStatus::Active {
            return Err(Error::Validation(format!(
                "loan {} is {}, payments only apply to active loans",
                id, loan.status
            )));
        }

        loan.remaining_balance = round2((loan.remaining_balance - amount).max(0.0));
        if loan.remaining_balance == 0.0 {
            loan.status = LoanStatus::Closed;
        }
        self.write_loan(&loan)?;
        self.refresh_profile_aggregates(loan.user_id)?;
        debug!(loan_id = id, amount, "Recorded loan payment");

        self.get_loan(id)?
            .ok_or_else(|| Error::NotFound(format!("loan {}", id)))
    }

    /// Active loans ending within [today, today + window_days]
    pub fn list_due_loans(
        &self,
        user_id: i64,
        today: NaiveDate,
        window_days: i64,
    ) -> Result<Vec<LoanAccount>> {
        let until = today + Duration::days(window_days.max(0));
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM loan_accounts WHERE user_id = ? AND status = 'active' \
             AND end_date BETWEEN ? AND ? ORDER BY end_date",
            LOAN_COLUMNS
        ))?;
        let loans = stmt
            .query_map(
                params![user_id, today.to_string(), until.to_string()],
                row_to_loan,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(loans)
    }

    /// Users holding at least one active loan
    pub fn list_users_with_active_loans(&self) -> Result<Vec<User>> {
        let ids = self.user_ids_where(
            "SELECT DISTINCT user_id FROM loan_accounts WHERE status = 'active' ORDER BY user_id",
            &[],
        )?;
        self.users_by_ids(&ids)
    }

    /// Users with an active loan ending within the window
    pub fn list_users_with_due_loans(&self, today: NaiveDate, window_days: i64) -> Result<Vec<User>> {
        let until = today + Duration::days(window_days.max(0));
        let ids = self.user_ids_where(
            "SELECT DISTINCT user_id FROM loan_accounts WHERE status = 'active' \
             AND end_date BETWEEN ? AND ? ORDER BY user_id",
            &[today.to_string(), until.to_string()],
        )?;
        self.users_by_ids(&ids)
    }

    fn user_ids_where(&self, sql: &str, args: &[String]) -> Result<Vec<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let ids = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    fn users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = self.get_user(*id)? {
                users.push(user);
            }
        }
        Ok(users)
    }

    /// Recompute loan-derived profile fields.
    ///
    /// loan_amount and monthly_payment sum the active loans, total_accounts
    /// counts every loan, interest_rate is the balance-weighted average of
    /// active loans. Creates a placeholder profile if none exists. Only these
    /// four columns are written.
    pub fn refresh_profile_aggregates(&self, user_id: i64) -> Result<FinancialProfile> {
        self.get_or_create_profile(user_id)?;

        let conn = self.conn()?;
        let active = LoanStatus::Active.as_str();
        let changed = conn.execute(
            "UPDATE financial_profiles SET
                loan_amount = (
                    SELECT ROUND(COALESCE(SUM(remaining_balance), 0), 2)
                    FROM loan_accounts WHERE user_id = ?1 AND status = ?2),
                monthly_payment = (
                    SELECT ROUND(COALESCE(SUM(monthly_payment), 0), 2)
                    FROM loan_accounts WHERE user_id = ?1 AND status = ?2),
                interest_rate = (
                    SELECT CASE WHEN COALESCE(SUM(remaining_balance), 0) > 0
                        THEN ROUND(SUM(interest_rate * remaining_balance) / SUM(remaining_balance), 2)
                        ELSE 0 END
                    FROM loan_accounts WHERE user_id = ?1 AND status = ?2),
                total_accounts = (SELECT COUNT(*) FROM loan_accounts WHERE user_id = ?1),
                updated_at = CURRENT_TIMESTAMP
             WHERE user_id = ?1",
            params![user_id, active],
        )?;
        drop(conn);
        debug!(user_id, changed, "Refreshed loan aggregates");

        self.get_profile(user_id)?
            .ok_or_else(|| Error::NotFound(format!("profile for user {}", user_id)))
    }
}
