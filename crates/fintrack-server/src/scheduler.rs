//! Background task scheduler for daily credit report runs
//!
//! Enabled when `FINTRACK_REPORT_TIME` is set (HH:MM, local time).
//! `FINTRACK_REPORT_CRITERIA` and `FINTRACK_REPORT_EMAIL` choose the cohort
//! and whether reports are emailed.

use chrono::Local;
use tracing::{error, info, warn};

use fintrack_core::batch::REPORT_TIME_ENV;
use fintrack_core::config::env_var;
use fintrack_core::{BatchOrchestrator, Database, ScheduleConfig};

/// Parse the daily schedule from the environment
///
/// Returns None if scheduling is not configured or the settings are invalid
pub fn report_schedule_from_env() -> Option<ScheduleConfig> {
    env_var(REPORT_TIME_ENV)?;

    match ScheduleConfig::from_env() {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Daily report schedule disabled: {}", e);
            None
        }
    }
}

/// Start the daily report scheduler as a background task
pub fn start_report_scheduler(db: Database, batch: BatchOrchestrator, config: ScheduleConfig) {
    info!(
        "Starting report scheduler: daily at {} for {} (email: {})",
        config.time.format("%H:%M"),
        config.criteria,
        config.email
    );

    tokio::spawn(async move {
        loop {
            let wait = config.until_next_run(&Local::now());
            tokio::time::sleep(wait).await;

            info!("Running scheduled report batch...");
            run_scheduled_batch(&db, &batch, &config).await;
        }
    });
}

/// Run one scheduled batch and record it in the audit log
async fn run_scheduled_batch(db: &Database, batch: &BatchOrchestrator, config: &ScheduleConfig) {
    match batch.run(config.criteria, config.email).await {
        Ok(summary) => {
            info!(
                "Scheduled batch completed: {} users, {} generated, {} emailed",
                summary.users, summary.generated, summary.emailed
            );

            // Log to audit (as "scheduler" user)
            if let Err(e) = db.log_audit(
                "scheduler",
                "batch_scheduled",
                Some("report"),
                None,
                Some(&format!(
                    "criteria={}, generated={}, generation_errors={}, emailed={}, email_errors={}",
                    summary.criteria,
                    summary.generated,
                    summary.generation_errors,
                    summary.emailed,
                    summary.email_errors
                )),
            ) {
                warn!("Failed to log scheduled batch to audit: {}", e);
            }
        }
        Err(e) => {
            error!("Scheduled batch failed: {}", e);
        }
    }
}
