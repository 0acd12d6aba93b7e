//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_loan(account: &str) -> NewLoanAccount {
        NewLoanAccount {
            account_number: account.to_string(),
            lender_name: "Equity Bank".to_string(),
            loan_type: LoanType::Personal,
            principal_amount: 100_000.0,
            remaining_balance: None,
            interest_rate: 12.0,
            term_months: 12,
            monthly_payment: None,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
            status: LoanStatus::Active,
        }
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(db.list_users().unwrap().is_empty());
        db.ping().unwrap();
    }

    #[test]
    fn test_schema_tables_exist() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        for table in [
            "users",
            "financial_profiles",
            "credit_score_history",
            "loan_accounts",
            "credit_report_requests",
            "sentiment_responses",
            "sentiment_history",
            "audit_log",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    // ========== Users ==========

    #[test]
    fn test_create_user_normalizes_email() {
        let db = Database::in_memory().unwrap();
        let user = db
            .create_user(&NewUser {
                email: "  Jane@Example.COM ".to_string(),
                first_name: Some("Jane".to_string()),
                last_name: Some("Wanjiru".to_string()),
            })
            .unwrap();
        assert_eq!(user.email, "jane@example.com");
        assert_eq!(user.display_name(), "Jane Wanjiru");

        let dup = db.create_user(&NewUser {
            email: "jane@example.com".to_string(),
            first_name: None,
            last_name: None,
        });
        assert!(dup.unwrap_err().is_validation());
    }

    #[test]
    fn test_ensure_user_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let first = db.ensure_user("kip@example.com").unwrap();
        let second = db.ensure_user("KIP@example.com").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(db.list_users().unwrap().len(), 1);
        assert!(db.get_user_by_email("kip@example.com").unwrap().is_some());
        assert!(db.get_user(first.id + 100).unwrap().is_none());
    }

    #[test]
    fn test_invalid_email_rejected() {
        let db = Database::in_memory().unwrap();
        assert!(db.ensure_user("not-an-email").unwrap_err().is_validation());
        assert!(normalize_email("a@b").is_err());
        assert_eq!(normalize_email("A@B.co").unwrap(), "a@b.co");
    }

    // ========== Profiles ==========

    #[test]
    fn test_profile_upsert_and_sanitize() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();
        assert!(db.get_profile(user.id).unwrap().is_none());

        let mut features = ProfileFeatures::placeholder();
        features.credit_utilization = 1.5;
        features.income = 45_000.456;
        db.save_profile(user.id, &features).unwrap();

        let stored = db.get_profile(user.id).unwrap().unwrap();
        assert_eq!(stored.features.credit_utilization, 1.0);
        assert_eq!(stored.features.income, 45_000.46);

        features.age = 41;
        db.save_profile(user.id, &features).unwrap();
        assert_eq!(db.get_profile(user.id).unwrap().unwrap().features.age, 41);
    }

    #[test]
    fn test_get_or_create_profile_uses_placeholder() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();
        let profile = db.get_or_create_profile(user.id).unwrap();
        assert_eq!(profile.features, ProfileFeatures::placeholder().sanitized());
        assert!(db.get_profile(user.id).unwrap().is_some());
    }

    #[test]
    fn test_unreadable_profile_row_is_an_error() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();
        let mut features = ProfileFeatures::placeholder();
        features.credit_utilization = 0.37;
        db.save_profile(user.id, &features).unwrap();

        db.conn()
            .unwrap()
            .execute(
                "UPDATE financial_profiles SET age = 'thirty' WHERE user_id = ?",
                [user.id],
            )
            .unwrap();

        assert!(db.get_profile(user.id).is_err());
        assert!(db.get_or_create_profile(user.id).is_err());
        assert!(db.update_profile_with(user.id, |f| Ok((*f, ()))).is_err());

        // The stored values were not replaced by placeholders
        let (age, utilization): (String, f64) = db
            .conn()
            .unwrap()
            .query_row(
                "SELECT age, credit_utilization FROM financial_profiles WHERE user_id = ?",
                [user.id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(age, "thirty");
        assert_eq!(utilization, 0.37);
    }

    #[test]
    fn test_unreadable_rows_are_errors_not_missing() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();
        let loan = db.create_loan(user.id, &sample_loan("ACC-001")).unwrap();
        let request = db
            .insert_report_request(user.id, "report.pdf", "abc123", 10)
            .unwrap();

        let conn = db.conn().unwrap();
        conn.execute("UPDATE loan_accounts SET term_months = 'twelve'", [])
            .unwrap();
        conn.execute("UPDATE credit_report_requests SET size_bytes = 'ten'", [])
            .unwrap();
        conn.execute("UPDATE users SET first_name = X'00FF'", [])
            .unwrap();
        drop(conn);

        assert!(db.get_loan(loan.id).is_err());
        assert!(db.get_report_request(request.id).is_err());
        assert!(db.get_user(user.id).is_err());
        assert!(db.get_user_by_email("jane@example.com").is_err());

        // Absent rows are still Ok(None)
        assert!(db.get_loan(loan.id + 1).unwrap().is_none());
        assert!(db.get_user(user.id + 1).unwrap().is_none());
    }

    #[test]
    fn test_update_profile_with_rolls_back_on_error() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();

        let result: crate::error::Result<(FinancialProfile, ())> = db.update_profile_with(user.id, |_| {
            Err(crate::error::Error::Validation("rejected".to_string()))
        });
        assert!(result.unwrap_err().is_validation());
        assert!(db.get_profile(user.id).unwrap().is_none());

        let (profile, previous) = db
            .update_profile_with(user.id, |current| {
                let mut next = *current;
                next.income = 72_000.004;
                Ok((next, current.income))
            })
            .unwrap();
        assert_eq!(previous, ProfileFeatures::placeholder().income);
        assert_eq!(profile.features.income, 72_000.0);
    }

    // ========== Score history ==========

    #[test]
    fn test_history_newest_first() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();
        let features = ProfileFeatures::placeholder();
        let base = Utc::now() - Duration::days(3);

        for (i, score) in [610u16, 655, 700].iter().enumerate() {
            db.append_snapshot(
                user.id,
                *score,
                ScoreCategory::from_score(*score),
                base + Duration::days(i as i64),
                &features,
            )
            .unwrap();
        }

        let history = db.score_history(user.id, 10).unwrap();
        let scores: Vec<u16> = history.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![700, 655, 610]);
        assert_eq!(db.score_history(user.id, 2).unwrap().len(), 2);
        assert_eq!(db.latest_snapshot(user.id).unwrap().unwrap().score, 700);
        assert_eq!(db.count_snapshots(user.id).unwrap(), 3);
    }

    #[test]
    fn test_same_timestamp_orders_by_id() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();
        let at = Utc::now();
        let features = ProfileFeatures::placeholder();
        let first = db
            .append_snapshot(user.id, 600, ScoreCategory::Fair, at, &features)
            .unwrap();
        let second = db
            .append_snapshot(user.id, 600, ScoreCategory::Fair, at, &features)
            .unwrap();
        let history = db.score_history(user.id, 10).unwrap();
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);
    }

    #[test]
    fn test_snapshot_out_of_range_rejected() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();
        let result = db.append_snapshot(
            user.id,
            900,
            ScoreCategory::Exceptional,
            Utc::now(),
            &ProfileFeatures::placeholder(),
        );
        assert!(result.is_err());
        assert_eq!(db.count_snapshots(user.id).unwrap(), 0);
    }

    #[test]
    fn test_snapshot_preserves_features() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();
        let mut features = ProfileFeatures::placeholder();
        features.delinquent_accounts = 2;
        features.payment_history = 0.85;
        db.append_snapshot(user.id, 640, ScoreCategory::Fair, Utc::now(), &features)
            .unwrap();

        let latest = db.latest_snapshot(user.id).unwrap().unwrap();
        assert_eq!(latest.features.delinquent_accounts, 2);
        assert_eq!(latest.features.payment_history, 0.85);
        assert_eq!(latest.category, ScoreCategory::Fair);
    }

    // ========== Loans ==========

    #[test]
    fn test_loan_crud() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();

        let loan = db.create_loan(user.id, &sample_loan("ACC-001")).unwrap();
        assert_eq!(loan.remaining_balance, 100_000.0);
        assert_eq!(loan.monthly_payment, amortized_payment(100_000.0, 12.0, 12));
        assert_eq!(db.list_loans(user.id).unwrap().len(), 1);

        let updated = db
            .update_loan(
                loan.id,
                &LoanUpdate {
                    lender_name: Some("KCB".to_string()),
                    status: Some(LoanStatus::Defaulted),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.lender_name, "KCB");
        assert_eq!(updated.status, LoanStatus::Defaulted);
        assert_eq!(updated.account_number, "ACC-001");

        assert!(db.delete_loan(loan.id).unwrap());
        assert!(!db.delete_loan(loan.id).unwrap());
        assert!(db.get_loan(loan.id).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_account_number() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();
        db.create_loan(user.id, &sample_loan("ACC-001")).unwrap();
        let err = db.create_loan(user.id, &sample_loan("ACC-001")).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_invalid_loan_rejected() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();

        let mut backwards = sample_loan("ACC-001");
        backwards.end_date = backwards.start_date;
        assert!(db.create_loan(user.id, &backwards).unwrap_err().is_validation());

        let mut usurious = sample_loan("ACC-002");
        usurious.interest_rate = 31.0;
        assert!(db.create_loan(user.id, &usurious).unwrap_err().is_validation());

        assert!(db.list_loans(user.id).unwrap().is_empty());
    }

    #[test]
    fn test_update_missing_loan() {
        let db = Database::in_memory().unwrap();
        let err = db.update_loan(42, &LoanUpdate::default()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_payments_reduce_and_close() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();
        let loan = db.create_loan(user.id, &sample_loan("ACC-001")).unwrap();

        let paid = db.record_payment(loan.id, 40_000.0).unwrap();
        assert_eq!(paid.remaining_balance, 60_000.0);
        assert_eq!(paid.status, LoanStatus::Active);

        let closed = db.record_payment(loan.id, 75_000.0).unwrap();
        assert_eq!(closed.remaining_balance, 0.0);
        assert_eq!(closed.status, LoanStatus::Closed);

        assert!(db.record_payment(loan.id, 10.0).unwrap_err().is_validation());
        assert!(db.record_payment(loan.id, -5.0).unwrap_err().is_validation());
    }

    #[test]
    fn test_profile_aggregates_follow_loans() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();

        let first = db.create_loan(user.id, &sample_loan("ACC-001")).unwrap();
        let mut second = sample_loan("ACC-002");
        second.principal_amount = 50_000.0;
        second.interest_rate = 6.0;
        let second = db.create_loan(user.id, &second).unwrap();

        let profile = db.get_profile(user.id).unwrap().unwrap();
        assert_eq!(profile.features.loan_amount, 150_000.0);
        assert_eq!(profile.features.total_accounts, 2);
        assert_eq!(
            profile.features.monthly_payment,
            round2(first.monthly_payment + second.monthly_payment)
        );
        // Balance-weighted: (12 * 100k + 6 * 50k) / 150k
        assert_eq!(profile.features.interest_rate, 10.0);

        db.update_loan(
            first.id,
            &LoanUpdate {
                status: Some(LoanStatus::Closed),
                ..Default::default()
            },
        )
        .unwrap();
        let profile = db.get_profile(user.id).unwrap().unwrap();
        assert_eq!(profile.features.loan_amount, 50_000.0);
        assert_eq!(profile.features.total_accounts, 2);

        db.delete_loan(second.id).unwrap();
        let profile = db.get_profile(user.id).unwrap().unwrap();
        assert_eq!(profile.features.loan_amount, 0.0);
        assert_eq!(profile.features.monthly_payment, 0.0);
        assert_eq!(profile.features.total_accounts, 1);
    }

    #[test]
    fn test_aggregate_refresh_keeps_other_profile_fields() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();
        let mut features = ProfileFeatures::placeholder();
        features.income = 64_000.0;
        features.credit_utilization = 0.37;
        features.payment_history = 0.91;
        db.save_profile(user.id, &features).unwrap();

        db.create_loan(user.id, &sample_loan("ACC-001")).unwrap();

        let profile = db.get_profile(user.id).unwrap().unwrap();
        assert_eq!(profile.features.loan_amount, 100_000.0);
        assert_eq!(profile.features.interest_rate, 12.0);
        assert_eq!(profile.features.total_accounts, 1);
        assert_eq!(profile.features.income, 64_000.0);
        assert_eq!(profile.features.credit_utilization, 0.37);
        assert_eq!(profile.features.payment_history, 0.91);

        // A later profile rewrite starts from the refreshed aggregates
        let (profile, ()) = db
            .update_profile_with(user.id, |current| {
                let mut next = *current;
                next.credit_utilization = 0.2;
                Ok((next, ()))
            })
            .unwrap();
        assert_eq!(profile.features.loan_amount, 100_000.0);
        assert_eq!(profile.features.total_accounts, 1);
        assert_eq!(profile.features.credit_utilization, 0.2);
    }

    #[test]
    fn test_negative_monthly_payment_rejected() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();

        let mut negative = sample_loan("ACC-001");
        negative.monthly_payment = Some(-10.0);
        assert!(db.create_loan(user.id, &negative).unwrap_err().is_validation());
        assert!(db.list_loans(user.id).unwrap().is_empty());

        let loan = db.create_loan(user.id, &sample_loan("ACC-002")).unwrap();
        let err = db
            .update_loan(
                loan.id,
                &LoanUpdate {
                    monthly_payment: Some(-10.0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            db.get_loan(loan.id).unwrap().unwrap().monthly_payment,
            loan.monthly_payment
        );
    }

    #[test]
    fn test_due_loans_window() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();

        let mut soon = sample_loan("ACC-001");
        soon.start_date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        soon.end_date = today + Duration::days(30);
        db.create_loan(user.id, &soon).unwrap();

        let mut later = sample_loan("ACC-002");
        later.start_date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        later.end_date = today + Duration::days(31);
        db.create_loan(user.id, &later).unwrap();

        let mut past = sample_loan("ACC-003");
        past.start_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        past.end_date = today - Duration::days(1);
        db.create_loan(user.id, &past).unwrap();

        let due = db.list_due_loans(user.id, today, 30).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].account_number, "ACC-001");
        assert_eq!(db.list_users_with_due_loans(today, 30).unwrap().len(), 1);
        assert!(db.list_users_with_due_loans(today, 10).unwrap().is_empty());
    }

    // ========== Reports ==========

    #[test]
    fn test_report_requests() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();
        let first = db
            .insert_report_request(user.id, "a.pdf", "abc123", 1024)
            .unwrap();
        let second = db
            .insert_report_request(user.id, "b.pdf", "def456", 2048)
            .unwrap();

        let listed = db.list_report_requests(user.id).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(
            db.get_report_request(first.id).unwrap().unwrap().file_name,
            "a.pdf"
        );
        assert!(db.get_report_request(999).unwrap().is_none());
    }

    // ========== Sentiment ==========

    #[test]
    fn test_sentiment_storage() {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("jane@example.com").unwrap();
        assert!(db.average_sentiment_intensity(user.id).unwrap().is_none());

        db.insert_sentiment_response(user.id, "great", 0.8, SentimentOrdinal::VeryPositive)
            .unwrap();
        db.insert_sentiment_response(user.id, "bad", -0.4, SentimentOrdinal::Negative)
            .unwrap();

        let avg = db.average_sentiment_intensity(user.id).unwrap().unwrap();
        assert!((avg - 0.2).abs() < 1e-9);

        let responses = db.list_sentiment_responses(user.id, 10).unwrap();
        assert_eq!(responses[0].response_text, "bad");

        let entry = db
            .append_sentiment_history(user.id, avg, SentimentOrdinal::Positive, 60.0)
            .unwrap();
        assert_eq!(entry.personal_sentiment_score, 60.0);
        assert_eq!(db.sentiment_history(user.id, 20).unwrap().len(), 1);
    }

    // ========== Audit ==========

    #[test]
    fn test_audit_log() {
        let db = Database::in_memory().unwrap();
        db.log_audit("jane@example.com", "create", Some("loan"), Some(1), None)
            .unwrap();
        db.log_audit(
            "jane@example.com",
            "payment",
            Some("loan"),
            Some(1),
            Some("amount=500"),
        )
        .unwrap();

        let entries = db.list_audit_log(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "payment");
        assert_eq!(entries[0].details.as_deref(), Some("amount=500"));
        assert_eq!(db.list_audit_log(1).unwrap().len(), 1);
    }
}
