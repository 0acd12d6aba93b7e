//! Report email delivery
//!
//! # Configuration
//!
//! Environment variables:
//! - `FINTRACK_MAIL_RELAY_URL`: HTTP relay endpoint (JSON POST). When unset,
//!   messages are written as `.eml` files to the outbox directory.
//! - `FINTRACK_MAIL_RELAY_TOKEN`: bearer token for the relay (optional)
//! - `FINTRACK_OUTBOX_DIR`: outbox directory (default: `<data dir>/fintrack/outbox`)
//! - `FINTRACK_SENDER_EMAIL`: From address (default: reports@fintrack.local)

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use chrono::{Datelike, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{company_name, default_data_dir, env_var};
use crate::error::{Error, Result};
use crate::files::write_atomic;
use crate::models::User;
use crate::report::GeneratedReport;

pub const RELAY_URL_ENV: &str = "FINTRACK_MAIL_RELAY_URL";
pub const RELAY_TOKEN_ENV: &str = "FINTRACK_MAIL_RELAY_TOKEN";
pub const OUTBOX_DIR_ENV: &str = "FINTRACK_OUTBOX_DIR";
pub const SENDER_ENV: &str = "FINTRACK_SENDER_EMAIL";
pub const DEFAULT_SENDER: &str = "reports@fintrack.local";

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
}

/// Delivers one message
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;

    fn name(&self) -> &'static str;
}

// ========== HTTP relay ==========

#[derive(Serialize)]
struct RelayAttachment<'a> {
    filename: &'a str,
    content_type: &'a str,
    /// Base64
    content: String,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
    attachments: Vec<RelayAttachment<'a>>,
}

/// Posts messages as JSON to a mail relay service
#[derive(Clone)]
pub struct HttpRelayMailer {
    http_client: Client,
    url: String,
    token: Option<String>,
}

impl HttpRelayMailer {
    pub fn new(url: &str, token: Option<String>) -> Self {
        Self {
            http_client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            token,
        }
    }
}

#[async_trait]
impl Mailer for HttpRelayMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let payload = RelayPayload {
            from: &message.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.text_body,
            html: &message.html_body,
            attachments: message
                .attachments
                .iter()
                .map(|a| RelayAttachment {
                    filename: &a.file_name,
                    content_type: &a.content_type,
                    content: base64::engine::general_purpose::STANDARD.encode(&a.data),
                })
                .collect(),
        };

        let mut req_builder = self.http_client.post(&self.url).json(&payload);
        if let Some(token) = &self.token {
            req_builder = req_builder.bearer_auth(token);
        }

        let response = req_builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Mail(format!(
                "relay returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }
        debug!(to = %message.to, "Relayed email");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "relay"
    }
}

// ========== File outbox ==========

/// Writes RFC 5322 `.eml` files for a separate forwarder to pick up
#[derive(Debug, Clone)]
pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn wrap_base64(data: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    encoded
        .as_bytes()
        .chunks(76)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join("\r\n")
}

/// Encode a header value when it is not plain ASCII
fn header_value(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!(
            "=?UTF-8?B?{}?=",
            base64::engine::general_purpose::STANDARD.encode(value.as_bytes())
        )
    }
}

/// Render a multipart MIME document
pub fn to_mime(message: &EmailMessage, boundary: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("From: {}\r\n", message.from));
    out.push_str(&format!("To: {}\r\n", message.to));
    out.push_str(&format!("Subject: {}\r\n", header_value(&message.subject)));
    out.push_str(&format!("Date: {}\r\n", Utc::now().to_rfc2822()));
    out.push_str("MIME-Version: 1.0\r\n");
    out.push_str(&format!(
        "Content-Type: multipart/mixed; boundary=\"{}\"\r\n\r\n",
        boundary
    ));

    let alt = format!("{}-alt", boundary);
    out.push_str(&format!("--{}\r\n", boundary));
    out.push_str(&format!(
        "Content-Type: multipart/alternative; boundary=\"{}\"\r\n\r\n",
        alt
    ));
    for (content_type, body) in [
        ("text/plain", &message.text_body),
        ("text/html", &message.html_body),
    ] {
        out.push_str(&format!("--{}\r\n", alt));
        out.push_str(&format!("Content-Type: {}; charset=utf-8\r\n", content_type));
        out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
        out.push_str(&wrap_base64(body.as_bytes()));
        out.push_str("\r\n");
    }
    out.push_str(&format!("--{}--\r\n", alt));

    for attachment in &message.attachments {
        out.push_str(&format!("--{}\r\n", boundary));
        out.push_str(&format!(
            "Content-Type: {}; name=\"{}\"\r\n",
            attachment.content_type, attachment.file_name
        ));
        out.push_str("Content-Transfer-Encoding: base64\r\n");
        out.push_str(&format!(
            "Content-Disposition: attachment; filename=\"{}\"\r\n\r\n",
            attachment.file_name
        ));
        out.push_str(&wrap_base64(&attachment.data));
        out.push_str("\r\n");
    }
    out.push_str(&format!("--{}--\r\n", boundary));
    out
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let now = Utc::now();
        let stamp = now.format("%Y%m%d_%H%M%S_%f").to_string();
        let recipient: String = message
            .to
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
            .collect();
        let boundary = format!("fintrack-{}", stamp);
        let path = self.dir.join(format!("{}_{}.eml", stamp, recipient));

        write_atomic(&path, to_mime(message, &boundary).as_bytes())
            .map_err(|e| Error::Mail(format!("outbox write failed: {}", e)))?;
        debug!(to = %message.to, path = %path.display(), "Queued email in outbox");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "outbox"
    }
}

// ========== In-memory ==========

/// Records messages instead of sending them
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<EmailMessage>>,
    /// Recipients whose delivery fails
    reject: Vec<String>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(recipients: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reject: recipients.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if self.reject.iter().any(|r| r == &message.to) {
            return Err(Error::Mail(format!("rejected recipient {}", message.to)));
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// ========== Configuration ==========

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub relay_url: Option<String>,
    pub relay_token: Option<String>,
    pub outbox_dir: PathBuf,
    pub sender: String,
    pub company: String,
}

impl MailConfig {
    pub fn from_env() -> Self {
        Self {
            relay_url: env_var(RELAY_URL_ENV),
            relay_token: env_var(RELAY_TOKEN_ENV),
            outbox_dir: env_var(OUTBOX_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| default_data_dir().join("outbox")),
            sender: env_var(SENDER_ENV).unwrap_or_else(|| DEFAULT_SENDER.to_string()),
            company: company_name(),
        }
    }
}

/// Relay when configured, otherwise the file outbox
pub fn build_mailer(config: &MailConfig) -> Arc<dyn Mailer> {
    match &config.relay_url {
        Some(url) => {
            info!("Mail delivery via relay at {}", url);
            Arc::new(HttpRelayMailer::new(url, config.relay_token.clone()))
        }
        None => {
            info!("Mail delivery via outbox at {}", config.outbox_dir.display());
            Arc::new(OutboxMailer::new(config.outbox_dir.clone()))
        }
    }
}

// ========== Dispatcher ==========

/// Builds and sends report emails
#[derive(Clone)]
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    sender: String,
    company: String,
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, sender: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            mailer,
            sender: sender.into(),
            company: company.into(),
        }
    }

    pub fn from_config(config: &MailConfig) -> Self {
        Self::new(build_mailer(config), config.sender.clone(), config.company.clone())
    }

    pub fn mailer_name(&self) -> &'static str {
        self.mailer.name()
    }

    pub fn subject(&self) -> String {
        format!("Your Credit Report - {}", self.company)
    }

    pub fn compose(&self, user: &User, report: &GeneratedReport, document: Vec<u8>) -> EmailMessage {
        let date = report.request.created_at.format("%B %d, %Y").to_string();
        let name = user.display_name();
        let year = Utc::now().year();

        let text_body = format!(
            "Dear {name},\n\n\
             Your Credit Report for {date} is now available.\n\
             Please find your detailed credit report attached to this email.\n\n\
             Thank you for choosing {company} for your credit management needs.\n\n\
             This is an automated email. Please do not reply to this message.\n\
             (c) {year} {company}. All rights reserved.\n",
            name = name,
            date = date,
            company = self.company,
            year = year,
        );

        let html_body = format!(
            r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #333333;">
  <div style="background-color: #003366; color: #ffffff; padding: 20px; text-align: center;">
    <h1>Credit Report</h1>
    <p>Your financial insights at a glance</p>
  </div>
  <div style="padding: 20px;">
    <p>Dear {name},</p>
    <p>Your Credit Report for <strong>{date}</strong> is now available.</p>
    <p>Please find your detailed credit report attached to this email.</p>
    <p>Thank you for choosing {company} for your credit management needs.</p>
  </div>
  <div style="font-size: 12px; color: #777777; text-align: center;">
    <p>This is an automated email. Please do not reply to this message.</p>
    <p>&copy; {year} {company}. All rights reserved.</p>
  </div>
</body>
</html>
"#,
            name = html_escape(&name),
            date = date,
            company = html_escape(&self.company),
            year = year,
        );

        EmailMessage {
            from: self.sender.clone(),
            to: user.email.clone(),
            subject: self.subject(),
            text_body,
            html_body,
            attachments: vec![Attachment {
                file_name: report.request.file_name.clone(),
                content_type: report.content_type.to_string(),
                data: document,
            }],
        }
    }

    /// Email a stored report to its owner
    pub async fn send_report(&self, user: &User, report: &GeneratedReport) -> Result<()> {
        let document = std::fs::read(&report.path).map_err(|e| {
            Error::Mail(format!(
                "could not read report {}: {}",
                report.path.display(),
                e
            ))
        })?;
        let message = self.compose(user, report, document);
        self.mailer.send(&message).await?;
        info!(user_id = user.id, mailer = self.mailer.name(), "Emailed credit report");
        Ok(())
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
