//! Fintrack CLI - Credit scoring and loan management
//!
//! Usage:
//!   fintrack init                            Initialize database
//!   fintrack score calc --user EMAIL -p JSON Calculate a credit score
//!   fintrack report generate due --email     Generate and email due-loan reports
//!   fintrack model train                     Train the score model
//!   fintrack serve --port 3000               Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            no_auth,
        } => commands::cmd_serve(&cli.db, &host, port, no_auth, cli.no_encrypt).await,
        Commands::Score { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                ScoreAction::Calc { user, profile } => {
                    commands::cmd_score_calc(&db, &user, &profile).map(|_| ())
                }
                ScoreAction::Latest { user } => commands::cmd_score_latest(&db, &user),
                ScoreAction::History { user, limit } => {
                    commands::cmd_score_history(&db, &user, limit)
                }
            }
        }
        Commands::Loans { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                LoansAction::List { user } => commands::cmd_loans_list(&db, &user),
                LoansAction::Add { user, loan } => {
                    commands::cmd_loans_add(&db, &user, &loan).map(|_| ())
                }
                LoansAction::Pay { id, amount } => {
                    commands::cmd_loans_pay(&db, id, amount).map(|_| ())
                }
                LoansAction::Due { user, days } => commands::cmd_loans_due(&db, &user, days),
            }
        }
        Commands::Report { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                ReportAction::Generate {
                    criteria,
                    user: Some(user),
                    email,
                    ..
                } => {
                    if criteria != "active" {
                        tracing::warn!("Ignoring criteria '{}' with --user", criteria);
                    }
                    commands::cmd_report_user(&db, &user, email)
                        .await
                        .map(|_| ())
                }
                ReportAction::Generate {
                    criteria,
                    user: None,
                    email,
                    window_days,
                } => {
                    let batch = commands::batch_from_env(&db);
                    commands::cmd_batch(&batch, &criteria, email, window_days)
                        .await
                        .map(|_| ())
                }
                ReportAction::List { user } => commands::cmd_report_list(&db, &user),
            }
        }
        Commands::Batch {
            criteria,
            email,
            window_days,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let batch = commands::batch_from_env(&db);
            commands::cmd_batch(&batch, &criteria, email, window_days)
                .await
                .map(|_| ())
        }
        Commands::Schedule { once } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_schedule(&db, once).await
        }
        Commands::Model { action } => match action {
            ModelAction::Data { output, rows, seed } => {
                commands::cmd_model_data(&output, rows, seed)
            }
            ModelAction::Train {
                data,
                output,
                rows,
                seed,
                alpha,
                model_version,
            } => commands::cmd_model_train(
                data.as_deref(),
                output.as_deref(),
                rows,
                seed,
                alpha,
                model_version,
            )
            .map(|_| ()),
            ModelAction::Info => {
                commands::cmd_model_info(&fintrack_core::ModelProvider::from_env())
            }
        },
        Commands::Sentiment { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                SentimentAction::Add { user, text } => {
                    commands::cmd_sentiment_add(&db, &user, &text).map(|_| ())
                }
                SentimentAction::Risk { user } => commands::cmd_sentiment_risk(&db, &user),
            }
        }
    }
}
