//! Financial profile operations

use rusqlite::{params, Connection, OptionalExtension, Row, ToSql, TransactionBehavior};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{FinancialProfile, ProfileFeatures};

/// Feature columns in a fixed order, shared with the score ledger
pub(super) const FEATURE_COLUMNS: &str = "income, age, employment_length, monthly_debt_payment, \
     total_credit_limit, current_credit_balance, debt_to_income, credit_utilization, \
     payment_history, credit_mix, new_credit, credit_history_length, public_records, \
     total_accounts, delinquent_accounts, loan_amount, interest_rate, monthly_payment";

pub(super) const FEATURE_COLUMN_COUNT: usize = 18;

/// Read the feature columns starting at `offset`
pub(super) fn features_from_row(row: &Row, offset: usize) -> rusqlite::Result<ProfileFeatures> {
    Ok(ProfileFeatures {
        income: row.get(offset)?,
        age: row.get(offset + 1)?,
        employment_length: row.get(offset + 2)?,
        monthly_debt_payment: row.get(offset + 3)?,
        total_credit_limit: row.get(offset + 4)?,
        current_credit_balance: row.get(offset + 5)?,
        debt_to_income: row.get(offset + 6)?,
        credit_utilization: row.get(offset + 7)?,
        payment_history: row.get(offset + 8)?,
        credit_mix: row.get(offset + 9)?,
        new_credit: row.get(offset + 10)?,
        credit_history_length: row.get(offset + 11)?,
        public_records: row.get(offset + 12)?,
        total_accounts: row.get(offset + 13)?,
        delinquent_accounts: row.get(offset + 14)?,
        loan_amount: row.get(offset + 15)?,
        interest_rate: row.get(offset + 16)?,
        monthly_payment: row.get(offset + 17)?,
    })
}

/// Bind values matching `FEATURE_COLUMNS`
pub(super) fn feature_params(f: &ProfileFeatures) -> [&dyn ToSql; FEATURE_COLUMN_COUNT] {
    [
        &f.income,
        &f.age,
        &f.employment_length,
        &f.monthly_debt_payment,
        &f.total_credit_limit,
        &f.current_credit_balance,
        &f.debt_to_income,
        &f.credit_utilization,
        &f.payment_history,
        &f.credit_mix,
        &f.new_credit,
        &f.credit_history_length,
        &f.public_records,
        &f.total_accounts,
        &f.delinquent_accounts,
        &f.loan_amount,
        &f.interest_rate,
        &f.monthly_payment,
    ]
}

fn select_profile(conn: &Connection, user_id: i64) -> Result<Option<FinancialProfile>> {
    let profile = conn
        .query_row(
            &format!(
                "SELECT user_id, updated_at, {} FROM financial_profiles WHERE user_id = ?",
                FEATURE_COLUMNS
            ),
            params![user_id],
            |row| {
                let updated_at: String = row.get(1)?;
                Ok(FinancialProfile {
                    user_id: row.get(0)?,
                    features: features_from_row(row, 2)?,
                    updated_at: parse_datetime(&updated_at),
                })
            },
        )
        .optional()?;
    Ok(profile)
}

fn select_existing(conn: &Connection, user_id: i64) -> Result<FinancialProfile> {
    select_profile(conn, user_id)?
        .ok_or_else(|| Error::NotFound(format!("profile for user {}", user_id)))
}

/// Write every feature column; `on_conflict` picks upsert or keep-existing
fn insert_profile(
    conn: &Connection,
    user_id: i64,
    features: &ProfileFeatures,
    on_conflict: &str,
) -> Result<()> {
    let features = features.sanitized();
    let placeholders = vec!["?"; FEATURE_COLUMN_COUNT].join(", ");
    let sql = format!(
        "INSERT INTO financial_profiles (user_id, {cols}) VALUES (?, {placeholders}) \
         ON CONFLICT(user_id) {on_conflict}",
        cols = FEATURE_COLUMNS,
    );

    let mut values: Vec<&dyn ToSql> = vec![&user_id];
    values.extend(feature_params(&features));
    conn.execute(&sql, values.as_slice())?;
    Ok(())
}

fn upsert_profile(conn: &Connection, user_id: i64, features: &ProfileFeatures) -> Result<()> {
    let updates = FEATURE_COLUMNS
        .split(',')
        .map(|c| format!("{0} = excluded.{0}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    insert_profile(
        conn,
        user_id,
        features,
        &format!("DO UPDATE SET {}, updated_at = CURRENT_TIMESTAMP", updates),
    )
}

impl Database {
    /// Get a user's financial profile
    pub fn get_profile(&self, user_id: i64) -> Result<Option<FinancialProfile>> {
        let conn = self.conn()?;
        select_profile(&conn, user_id)
    }

    /// Insert or replace a user's profile values.
    ///
    /// Values are sanitized (ratios clamped, amounts rounded) on the way in.
    pub fn save_profile(&self, user_id: i64, features: &ProfileFeatures) -> Result<FinancialProfile> {
        let conn = self.conn()?;
        upsert_profile(&conn, user_id, features)?;
        select_existing(&conn, user_id)
    }

    /// Get the profile, creating it with placeholder values if absent.
    /// An existing row is never overwritten.
    pub fn get_or_create_profile(&self, user_id: i64) -> Result<FinancialProfile> {
        let conn = self.conn()?;
        if let Some(profile) = select_profile(&conn, user_id)? {
            return Ok(profile);
        }
        insert_profile(&conn, user_id, &ProfileFeatures::placeholder(), "DO NOTHING")?;
        select_existing(&conn, user_id)
    }

    /// Read, rewrite and store a profile inside one IMMEDIATE transaction.
    ///
    /// `f` sees the stored features (placeholder values when the user has no
    /// profile yet) and returns the features to store plus a value passed
    /// back to the caller. An `Err` from `f` rolls back, leaving no row
    /// behind.
    pub fn update_profile_with<T, F>(&self, user_id: i64, f: F) -> Result<(FinancialProfile, T)>
    where
        F: FnOnce(&ProfileFeatures) -> Result<(ProfileFeatures, T)>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = select_profile(&tx, user_id)?
            .map(|p| p.features)
            .unwrap_or_else(ProfileFeatures::placeholder);
        let (features, out) = f(&current)?;
        upsert_profile(&tx, user_id, &features)?;
        let profile = select_existing(&tx, user_id)?;

        tx.commit()?;
        Ok((profile, out))
    }
}
