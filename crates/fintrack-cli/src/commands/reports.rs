//! Report command implementations
//!
//! Single-user generation, cohort batches and the daily schedule.

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use fintrack_core::db::Database;
use fintrack_core::{
    BatchOrchestrator, BatchSummary, CohortCriteria, GeneratedReport, MailConfig,
    NotificationDispatcher, ReportGenerator, ScheduleConfig,
};

use super::find_user;

/// Batch orchestrator wired from the environment (reports dir, mail delivery)
pub fn batch_from_env(db: &Database) -> BatchOrchestrator {
    let generator = ReportGenerator::from_env(db.clone());
    let dispatcher = NotificationDispatcher::from_config(&MailConfig::from_env());
    BatchOrchestrator::new(db.clone(), generator).with_dispatcher(dispatcher)
}

/// Parse a cohort name, applying an explicit due window when given
pub fn parse_criteria(criteria: &str, window_days: Option<i64>) -> Result<CohortCriteria> {
    let parsed: CohortCriteria = criteria.parse().map_err(|e: String| anyhow!(e))?;
    match window_days {
        Some(days) if days < 0 => bail!("Window must be zero or more days"),
        Some(days) => Ok(parsed.with_window(days)),
        None => Ok(parsed),
    }
}

pub async fn cmd_report_user(db: &Database, user_email: &str, email: bool) -> Result<GeneratedReport> {
    let generator = ReportGenerator::from_env(db.clone());
    let dispatcher = if email {
        Some(NotificationDispatcher::from_config(&MailConfig::from_env()))
    } else {
        None
    };
    report_user(db, &generator, dispatcher.as_ref(), user_email).await
}

/// Generate one user's report and email it when a dispatcher is given
pub async fn report_user(
    db: &Database,
    generator: &ReportGenerator,
    dispatcher: Option<&NotificationDispatcher>,
    user_email: &str,
) -> Result<GeneratedReport> {
    let user = find_user(db, user_email)?;

    let report = generator
        .generate(user.id)
        .with_context(|| format!("Failed to generate report for {}", user.email))?;
    println!(
        "📄 Generated {} ({} bytes)",
        report.path.display(),
        report.request.size_bytes
    );

    if let Some(dispatcher) = dispatcher {
        dispatcher
            .send_report(&user, &report)
            .await
            .with_context(|| format!("Failed to email report to {}", user.email))?;
        println!("📧 Emailed to {} via {}", user.email, dispatcher.mailer_name());
    }

    Ok(report)
}

pub async fn cmd_batch(
    batch: &BatchOrchestrator,
    criteria: &str,
    email: bool,
    window_days: Option<i64>,
) -> Result<BatchSummary> {
    let criteria = parse_criteria(criteria, window_days)?;
    println!("📦 Generating reports for {}...", criteria);

    let summary = batch.run(criteria, email).await?;
    print_summary(&summary, email);
    Ok(summary)
}

fn print_summary(summary: &BatchSummary, email: bool) {
    println!();
    println!("✅ Batch complete ({})", summary.criteria);
    println!("   Users:             {}", summary.users);
    println!("   Reports generated: {}", summary.generated);
    if summary.generation_errors > 0 {
        println!("   ⚠️  Generation errors: {}", summary.generation_errors);
    }
    if email {
        println!("   Emails sent:       {}", summary.emailed);
        if summary.email_errors > 0 {
            println!("   ⚠️  Email errors: {}", summary.email_errors);
        }
    }
}

pub fn cmd_report_list(db: &Database, user_email: &str) -> Result<()> {
    let user = find_user(db, user_email)?;
    let reports = db.list_report_requests(user.id)?;

    if reports.is_empty() {
        println!("No reports for {}", user.email);
        return Ok(());
    }

    println!("📄 Reports for {} ({})", user.email, reports.len());
    println!();
    println!("{:>5} {:<18} {:>9} {}", "ID", "Created", "Bytes", "File");
    println!("{}", "-".repeat(80));
    for report in &reports {
        println!(
            "{:>5} {:<18} {:>9} {}",
            report.id,
            report.created_at.format("%Y-%m-%d %H:%M"),
            report.size_bytes,
            report.file_name
        );
    }
    Ok(())
}

/// Run the configured batch daily, or once with `--once`
pub async fn cmd_schedule(db: &Database, once: bool) -> Result<()> {
    let config = ScheduleConfig::from_env().context("Invalid report schedule")?;
    let batch = batch_from_env(db);

    if once {
        let summary = batch.run(config.criteria, config.email).await?;
        print_summary(&summary, config.email);
        return Ok(());
    }

    println!(
        "⏰ Generating reports daily at {} for {} (email: {})",
        config.time.format("%H:%M"),
        config.criteria,
        config.email
    );
    println!("   Press Ctrl+C to stop");

    loop {
        let now = Local::now();
        let next = config.next_run_after(&now);
        println!("   Next run: {}", next.format("%Y-%m-%d %H:%M"));
        tokio::time::sleep(config.until_next_run(&now)).await;

        match batch.run(config.criteria, config.email).await {
            Ok(summary) => {
                print_summary(&summary, config.email);
                if let Err(e) = db.log_audit(
                    "scheduler",
                    "batch_scheduled",
                    Some("report"),
                    None,
                    Some(&format!("criteria={}, generated={}", summary.criteria, summary.generated)),
                ) {
                    tracing::warn!("Failed to log scheduled batch to audit: {}", e);
                }
            }
            Err(e) => tracing::error!("Scheduled batch failed: {}", e),
        }
    }
}
