//! Credit report generation
//!
//! A report is assembled as a renderer-neutral [`ReportDocument`] from the
//! user, their score history and their loans, then rendered by a
//! [`ReportRenderer`] (PDF by default) into the reports directory. Every
//! generated file is recorded as a `CreditReportRequest`.

mod pdf;
mod text;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::files::write_atomic;
use crate::models::{CreditReportRequest, LoanAccount, ScoreSnapshot, User};
use crate::scoring::breakdown;
use crate::trend::deltas_newest_first;

pub use pdf::PdfRenderer;
pub use text::TextRenderer;

/// Snapshots shown in the report's delta table
pub const REPORT_HISTORY_LEN: i64 = 6;

pub const REPORT_FOOTER: &str = "This is a system-generated credit report.";
pub const NO_LOANS_TEXT: &str = "No loan accounts found.";

/// One layout element
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Large bold line; `accent` draws it in the brand color
    Title { text: String, accent: bool },
    Heading(String),
    Paragraph(String),
    /// Bold label followed by a value, one pair per line
    Fields(Vec<(String, String)>),
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Spacer,
    /// Italic closing line
    Footer(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub blocks: Vec<Block>,
}

impl ReportDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Block) -> &mut Self {
        self.blocks.push(block);
        self
    }
}

/// Turns a document into bytes
pub trait ReportRenderer: Send + Sync {
    fn render(&self, document: &ReportDocument) -> Result<Vec<u8>>;

    /// File extension without the dot
    fn extension(&self) -> &'static str;

    fn content_type(&self) -> &'static str;
}

/// Everything a report shows
#[derive(Debug, Clone)]
pub struct ReportData {
    pub user: User,
    /// Newest first, at most [`REPORT_HISTORY_LEN`]
    pub history: Vec<ScoreSnapshot>,
    pub loans: Vec<LoanAccount>,
    pub generated_at: DateTime<Utc>,
}

fn money(amount: f64) -> String {
    format!("Ksh {:.2}", amount)
}

/// Lay out the report content
pub fn build_document(data: &ReportData, company: &str) -> ReportDocument {
    let mut doc = ReportDocument::new("Credit Report");

    doc.push(Block::Spacer)
        .push(Block::Title {
            text: format!("{}: Digitalizing credit loan management.", company),
            accent: true,
        })
        .push(Block::Spacer)
        .push(Block::Title {
            text: "Credit Report".to_string(),
            accent: false,
        })
        .push(Block::Fields(vec![
            ("Email".to_string(), data.user.email.clone()),
            (
                "Joined on".to_string(),
                data.user.date_joined.format("%Y-%m-%d").to_string(),
            ),
            (
                "Report Generated".to_string(),
                data.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
        ]))
        .push(Block::Spacer);

    doc.push(Block::Heading("Credit Score".to_string()));
    match data.history.first() {
        Some(latest) => {
            doc.push(Block::Fields(vec![
                (
                    "Score".to_string(),
                    format!("{} ({})", latest.score, latest.category),
                ),
                (
                    "Calculated".to_string(),
                    latest.calculated_at.format("%Y-%m-%d %H:%M").to_string(),
                ),
            ]));
            doc.push(Block::Table {
                headers: ["Factor", "Value", "Points", "Max"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                rows: breakdown(&latest.features)
                    .into_iter()
                    .map(|f| {
                        vec![
                            f.label.to_string(),
                            format!("{:.2}", f.value),
                            format!("{:.1}", f.points),
                            format!("{:.1}", f.max_points),
                        ]
                    })
                    .collect(),
            });

            let scores: Vec<f64> = data.history.iter().map(|s| s.score as f64).collect();
            doc.push(Block::Heading("Score History".to_string()));
            doc.push(Block::Table {
                headers: ["Date", "Score", "Category", "Change"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                rows: data
                    .history
                    .iter()
                    .zip(deltas_newest_first(&scores))
                    .map(|(s, delta)| {
                        vec![
                            s.calculated_at.format("%Y-%m-%d").to_string(),
                            s.score.to_string(),
                            s.category.to_string(),
                            delta.map(|d| format!("{:+}", d as i64)).unwrap_or_else(|| "-".to_string()),
                        ]
                    })
                    .collect(),
            });
        }
        None => {
            doc.push(Block::Paragraph(
                "No credit score has been calculated yet.".to_string(),
            ));
        }
    }
    doc.push(Block::Spacer);

    doc.push(Block::Heading("Loan Accounts".to_string()));
    if data.loans.is_empty() {
        doc.push(Block::Paragraph(NO_LOANS_TEXT.to_string()));
    } else {
        doc.push(Block::Table {
            headers: [
                "#",
                "Lender",
                "Loan Type",
                "Amount",
                "Balance",
                "Interest (%)",
                "Start Date",
                "End Date",
                "Status",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            rows: data
                .loans
                .iter()
                .enumerate()
                .map(|(i, loan)| {
                    vec![
                        (i + 1).to_string(),
                        loan.lender_name.clone(),
                        loan.loan_type.label().to_string(),
                        money(loan.principal_amount),
                        money(loan.remaining_balance),
                        format!("{}%", loan.interest_rate),
                        loan.start_date.format("%Y-%m-%d").to_string(),
                        loan.end_date.format("%Y-%m-%d").to_string(),
                        capitalize(loan.status.as_str()),
                    ]
                })
                .collect(),
        });
    }

    doc.push(Block::Spacer)
        .push(Block::Footer(REPORT_FOOTER.to_string()));
    doc
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `{email}_Loan_Report_{YYYYmmdd_HHMMSS}.{ext}`
pub fn report_file_name(email: &str, at: &DateTime<Utc>, extension: &str) -> String {
    let safe_email: String = email
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-' | '+') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "{}_Loan_Report_{}.{}",
        safe_email,
        at.format("%Y%m%d_%H%M%S"),
        extension
    )
}

/// A stored report document
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedReport {
    #[serde(flatten)]
    pub request: CreditReportRequest,
    #[serde(skip)]
    pub path: PathBuf,
    pub content_type: &'static str,
}

/// Renders and stores reports for users
#[derive(Clone)]
pub struct ReportGenerator {
    db: Database,
    output_dir: PathBuf,
    renderer: Arc<dyn ReportRenderer>,
    company: String,
}

impl ReportGenerator {
    pub fn new(
        db: Database,
        output_dir: impl Into<PathBuf>,
        renderer: Arc<dyn ReportRenderer>,
        company: impl Into<String>,
    ) -> Self {
        Self {
            db,
            output_dir: output_dir.into(),
            renderer,
            company: company.into(),
        }
    }

    /// PDF reports in the configured reports directory
    pub fn from_env(db: Database) -> Self {
        Self::new(
            db,
            crate::config::reports_dir(),
            Arc::new(PdfRenderer::default()),
            crate::config::company_name(),
        )
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn content_type(&self) -> &'static str {
        self.renderer.content_type()
    }

    pub fn collect(&self, user_id: i64) -> Result<ReportData> {
        let user = self
            .db
            .get_user(user_id)?
            .ok_or_else(|| Error::NotFound(format!("User {} not found", user_id)))?;
        Ok(ReportData {
            user,
            history: self.db.score_history(user_id, REPORT_HISTORY_LEN)?,
            loans: self.db.list_loans(user_id)?,
            generated_at: Utc::now(),
        })
    }

    /// Render, store and record a report for one user
    pub fn generate(&self, user_id: i64) -> Result<GeneratedReport> {
        let data = self.collect(user_id)?;
        let document = build_document(&data, &self.company);
        let bytes = self
            .renderer
            .render(&document)
            .map_err(|e| Error::Report(format!("render failed for {}: {}", data.user.email, e)))?;

        let file_name = self.unique_file_name(&data.user.email, &data.generated_at);
        let path = self.output_dir.join(&file_name);
        write_atomic(&path, &bytes)?;

        let hash = hex::encode(Sha256::digest(&bytes));
        let request =
            self.db
                .insert_report_request(user_id, &file_name, &hash, bytes.len() as i64)?;

        info!(
            user_id,
            bytes = bytes.len(),
            "Generated credit report {}",
            file_name
        );
        Ok(GeneratedReport {
            request,
            path,
            content_type: self.renderer.content_type(),
        })
    }

    /// Same-second reports get a numeric suffix instead of overwriting
    fn unique_file_name(&self, email: &str, at: &DateTime<Utc>) -> String {
        let base = report_file_name(email, at, self.renderer.extension());
        if !self.output_dir.join(&base).exists() {
            return base;
        }
        let stem = base.trim_end_matches(&format!(".{}", self.renderer.extension()));
        (2..)
            .map(|n| format!("{}_{}.{}", stem, n, self.renderer.extension()))
            .find(|name| !self.output_dir.join(name).exists())
            .unwrap_or(base)
    }

    /// Location of a recorded report, if the file is still present
    pub fn locate(&self, request: &CreditReportRequest) -> Result<PathBuf> {
        // Stored names never contain separators; refuse anything that does
        if request.file_name.contains(['/', '\\']) || request.file_name.starts_with('.') {
            return Err(Error::Report(format!(
                "invalid report file name {}",
                request.file_name
            )));
        }
        let path = self.output_dir.join(&request.file_name);
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "Report file {} is no longer available",
                request.file_name
            )));
        }
        Ok(path)
    }
}
