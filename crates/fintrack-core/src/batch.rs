//! Batch report runs over user cohorts
//!
//! A run selects a cohort, generates one report per user and optionally
//! emails it. Users are processed sequentially; a failure for one user is
//! counted and logged, and the run moves on.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{due_window_days, env_var};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::User;
use crate::notify::NotificationDispatcher;
use crate::report::ReportGenerator;

pub const REPORT_TIME_ENV: &str = "FINTRACK_REPORT_TIME";
pub const REPORT_CRITERIA_ENV: &str = "FINTRACK_REPORT_CRITERIA";
pub const REPORT_EMAIL_ENV: &str = "FINTRACK_REPORT_EMAIL";

/// Which users a run targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CohortCriteria {
    All,
    ActiveLoans,
    /// Active loans ending within `window_days` from today
    DueLoans { window_days: i64 },
}

impl CohortCriteria {
    pub fn due_loans() -> Self {
        Self::DueLoans {
            window_days: due_window_days(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::ActiveLoans => "active_loans",
            Self::DueLoans { .. } => "due_loans",
        }
    }

    /// Replace the due window; other criteria are unchanged
    pub fn with_window(self, window_days: i64) -> Self {
        match self {
            Self::DueLoans { .. } => Self::DueLoans {
                window_days: window_days.max(0),
            },
            other => other,
        }
    }
}

impl FromStr for CohortCriteria {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "all" => Ok(Self::All),
            "active" | "active_loans" => Ok(Self::ActiveLoans),
            "due" | "due_loans" => Ok(Self::due_loans()),
            _ => Err(format!(
                "Unknown criteria: {} (expected all, active_loans or due_loans)",
                s
            )),
        }
    }
}

impl fmt::Display for CohortCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DueLoans { window_days } => write!(f, "due_loans ({} days)", window_days),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub criteria: String,
    pub users: usize,
    pub generated: usize,
    pub generation_errors: usize,
    pub emailed: usize,
    pub email_errors: usize,
}

#[derive(Clone)]
pub struct BatchOrchestrator {
    db: Database,
    generator: ReportGenerator,
    dispatcher: Option<NotificationDispatcher>,
}

impl BatchOrchestrator {
    pub fn new(db: Database, generator: ReportGenerator) -> Self {
        Self {
            db,
            generator,
            dispatcher: None,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: NotificationDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn select_users(&self, criteria: CohortCriteria, today: NaiveDate) -> Result<Vec<User>> {
        match criteria {
            CohortCriteria::All => self.db.list_users(),
            CohortCriteria::ActiveLoans => self.db.list_users_with_active_loans(),
            CohortCriteria::DueLoans { window_days } => {
                self.db.list_users_with_due_loans(today, window_days)
            }
        }
    }

    /// Generate (and optionally email) reports for a cohort.
    ///
    /// Only cohort selection failures are returned as errors.
    pub async fn run(&self, criteria: CohortCriteria, email: bool) -> Result<BatchSummary> {
        let today = Local::now().date_naive();
        let users = self.select_users(criteria, today)?;
        let mut summary = BatchSummary {
            criteria: criteria.to_string(),
            users: users.len(),
            ..Default::default()
        };
        info!("Batch report run for {}: {} users", criteria, users.len());

        let dispatcher = match (email, &self.dispatcher) {
            (true, None) => {
                warn!("Email requested but no mailer is configured; reports will not be sent");
                None
            }
            (true, Some(d)) => Some(d),
            (false, _) => None,
        };

        for user in &users {
            let report = match self.generator.generate(user.id) {
                Ok(report) => {
                    summary.generated += 1;
                    debug!(user_id = user.id, "Generated {}", report.request.file_name);
                    report
                }
                Err(e) => {
                    summary.generation_errors += 1;
                    warn!(user_id = user.id, "Report generation failed: {}", e);
                    continue;
                }
            };

            if email {
                let Some(dispatcher) = dispatcher else {
                    summary.email_errors += 1;
                    continue;
                };
                match dispatcher.send_report(user, &report).await {
                    Ok(()) => summary.emailed += 1,
                    Err(e) => {
                        summary.email_errors += 1;
                        warn!(user_id = user.id, "Report email failed: {}", e);
                    }
                }
            }
        }

        info!(
            "Batch run finished: {} generated, {} generation errors, {} emailed, {} email errors",
            summary.generated, summary.generation_errors, summary.emailed, summary.email_errors
        );
        Ok(summary)
    }
}

// ========== Daily schedule ==========

/// Daily batch settings
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub time: NaiveTime,
    pub criteria: CohortCriteria,
    pub email: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time: NaiveTime::from_hms_opt(2, 0, 0).unwrap_or(NaiveTime::MIN),
            criteria: CohortCriteria::ActiveLoans,
            email: true,
        }
    }
}

pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M:%S"))
        .map_err(|_| Error::Validation(format!("Invalid time of day '{}', expected HH:MM", s)))
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl ScheduleConfig {
    /// Read `FINTRACK_REPORT_TIME`, `FINTRACK_REPORT_CRITERIA` and
    /// `FINTRACK_REPORT_EMAIL`; invalid values are rejected
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(time) = env_var(REPORT_TIME_ENV) {
            config.time = parse_time_of_day(&time)?;
        }
        if let Some(criteria) = env_var(REPORT_CRITERIA_ENV) {
            config.criteria = criteria.parse().map_err(Error::Validation)?;
        }
        if let Some(email) = env_var(REPORT_EMAIL_ENV) {
            config.email = parse_flag(&email).ok_or_else(|| {
                Error::Validation(format!("{} must be true or false", REPORT_EMAIL_ENV))
            })?;
        }
        Ok(config)
    }

    /// Next run strictly after `now`
    pub fn next_run_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let tz = now.timezone();
        let mut date = now.date_naive();
        loop {
            // Skips times that do not exist on DST transition days
            if let Some(candidate) = tz
                .from_local_datetime(&date.and_time(self.time))
                .earliest()
            {
                if candidate > *now {
                    return candidate;
                }
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => return now.clone(),
            }
        }
    }

    pub fn until_next_run<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> std::time::Duration {
        (self.next_run_after(now) - now.clone())
            .to_std()
            .unwrap_or_default()
    }
}
