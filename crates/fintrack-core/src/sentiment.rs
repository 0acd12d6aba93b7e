//! Sentiment scoring of free-text survey answers and the risk signal
//! derived from a user's sentiment history
//!
//! A [`SentimentClassifier`] turns text into positive/neutral/negative
//! probabilities. Intensity is `positive - negative`; each response is
//! stored, and a running aggregate row is appended after every response.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{SentimentHistoryEntry, SentimentOrdinal, SentimentResponse};
use crate::trend::TrendSummary;

/// Personal scores considered by the trend and risk views
pub const RISK_WINDOW: usize = 20;

/// Longest accepted response text, in characters
pub const MAX_RESPONSE_CHARS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentimentProbabilities {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

impl SentimentProbabilities {
    pub fn neutral() -> Self {
        Self {
            positive: 0.0,
            neutral: 1.0,
            negative: 0.0,
        }
    }

    /// `positive - negative`, in [-1, 1]
    pub fn intensity(&self) -> f64 {
        (self.positive - self.negative).clamp(-1.0, 1.0)
    }
}

/// Opaque text classifier
pub trait SentimentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> SentimentProbabilities;

    fn name(&self) -> &str;
}

const POSITIVE_TERMS: &[&str] = &[
    "good", "great", "excellent", "happy", "confident", "stable", "secure", "comfortable",
    "improving", "improved", "growing", "saving", "savings", "save", "paid", "afford",
    "manageable", "optimistic", "positive", "relieved", "on-time", "ahead", "increase",
    "raise", "profit", "strong", "calm", "satisfied", "easy", "better", "best", "love",
];

const NEGATIVE_TERMS: &[&str] = &[
    "bad", "poor", "worried", "worry", "anxious", "stressed", "stress", "struggling",
    "struggle", "debt", "debts", "late", "overdue", "missed", "default", "defaulted",
    "broke", "unemployed", "laid", "fired", "behind", "collection", "collections",
    "bankruptcy", "loss", "lost", "afraid", "scared", "difficult", "hard", "worse",
    "worst", "negative", "unable", "cannot", "expensive", "tight", "hate",
];

const NEGATIONS: &[&str] = &["not", "no", "never", "without", "hardly", "don't", "can't", "isn't", "wasn't", "won't"];

/// How many tokens a negation reaches forward
const NEGATION_SCOPE: usize = 3;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[a-z]+(?:['-][a-z]+)*").expect("valid regex"))
}

/// Financial word-list classifier with simple negation handling
#[derive(Debug, Clone)]
pub struct LexiconClassifier {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negations: HashSet<&'static str>,
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self {
            positive: POSITIVE_TERMS.iter().copied().collect(),
            negative: NEGATIVE_TERMS.iter().copied().collect(),
            negations: NEGATIONS.iter().copied().collect(),
        }
    }
}

impl LexiconClassifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SentimentClassifier for LexiconClassifier {
    fn classify(&self, text: &str) -> SentimentProbabilities {
        let lower = text.to_lowercase();
        let mut positive = 0.0;
        let mut negative = 0.0;
        let mut negated_for = 0usize;

        for token in token_pattern().find_iter(&lower).map(|m| m.as_str()) {
            if self.negations.contains(token) {
                negated_for = NEGATION_SCOPE;
                continue;
            }
            let negated = negated_for > 0;
            negated_for = negated_for.saturating_sub(1);

            let (is_pos, is_neg) = (self.positive.contains(token), self.negative.contains(token));
            match (is_pos, is_neg, negated) {
                (true, _, false) | (_, true, true) => positive += 1.0,
                (true, _, true) | (_, true, false) => negative += 1.0,
                _ => {}
            }
        }

        let hits = positive + negative;
        if hits == 0.0 {
            return SentimentProbabilities::neutral();
        }
        // One unit of neutral mass keeps single-word answers moderate
        let total = hits + 1.0;
        SentimentProbabilities {
            positive: positive / total,
            neutral: 1.0 / total,
            negative: negative / total,
        }
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}

/// Intensity in [-1, 1] mapped onto 0-100
pub fn personal_score(intensity: f64) -> f64 {
    (intensity.clamp(-1.0, 1.0) + 1.0) / 2.0 * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    #[serde(rename = "Very High Risk")]
    VeryHigh,
    #[serde(rename = "High Risk")]
    High,
    #[serde(rename = "Moderate Risk")]
    Moderate,
    #[serde(rename = "Low Risk")]
    Low,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryHigh => "Very High Risk",
            Self::High => "High Risk",
            Self::Moderate => "Moderate Risk",
            Self::Low => "Low Risk",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::VeryHigh => "Sentiment is volatile and falling sharply.",
            Self::High => "Sentiment is unstable and trending down.",
            Self::Moderate => "Sentiment is consistently low.",
            Self::Low => "Sentiment is stable.",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub description: &'static str,
    pub average_score: f64,
    pub volatility: f64,
    pub recent_change: f64,
    pub samples: usize,
}

/// Classify risk from personal scores, newest first. None without data.
pub fn assess_risk(scores_newest_first: &[f64]) -> Option<RiskAssessment> {
    let trend = TrendSummary::from_newest_first(scores_newest_first, RISK_WINDOW);
    if trend.is_empty() {
        return None;
    }

    let level = if trend.volatility > 15.0 && trend.net_change < -10.0 {
        RiskLevel::VeryHigh
    } else if trend.volatility > 10.0 && trend.net_change < -5.0 {
        RiskLevel::High
    } else if trend.mean < 40.0 {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    };

    Some(RiskAssessment {
        risk_level: level,
        description: level.description(),
        average_score: trend.mean,
        volatility: trend.volatility,
        recent_change: trend.net_change,
        samples: trend.count,
    })
}

/// Result of recording one response
#[derive(Debug, Clone, Serialize)]
pub struct SentimentRecord {
    pub response: SentimentResponse,
    pub probabilities: SentimentProbabilities,
    pub history: SentimentHistoryEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentDashboard {
    pub current: Option<SentimentHistoryEntry>,
    pub recent_responses: Vec<SentimentResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentTrend {
    pub entries: Vec<SentimentHistoryEntry>,
    pub summary: TrendSummary,
}

/// Sentiment operations against the store
#[derive(Clone)]
pub struct SentimentService {
    db: Database,
    classifier: Arc<dyn SentimentClassifier>,
}

impl SentimentService {
    pub fn new(db: Database, classifier: Arc<dyn SentimentClassifier>) -> Self {
        Self { db, classifier }
    }

    /// Service with the built-in lexicon classifier
    pub fn with_lexicon(db: Database) -> Self {
        Self::new(db, Arc::new(LexiconClassifier::new()))
    }

    pub fn analyze(&self, text: &str) -> (SentimentProbabilities, SentimentOrdinal) {
        let probabilities = self.classifier.classify(text);
        let ordinal = SentimentOrdinal::from_intensity(probabilities.intensity());
        (probabilities, ordinal)
    }

    /// Store a response and append the updated running aggregate
    pub fn record(&self, user_id: i64, text: &str) -> Result<SentimentRecord> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("response_text is required".to_string()));
        }
        if text.chars().count() > MAX_RESPONSE_CHARS {
            return Err(Error::Validation(format!(
                "response_text must be at most {} characters",
                MAX_RESPONSE_CHARS
            )));
        }

        let (probabilities, ordinal) = self.analyze(text);
        let intensity = probabilities.intensity();
        let response = self
            .db
            .insert_sentiment_response(user_id, text, intensity, ordinal)?;

        let average = self
            .db
            .average_sentiment_intensity(user_id)?
            .unwrap_or(intensity);
        let history = self.db.append_sentiment_history(
            user_id,
            average,
            SentimentOrdinal::from_intensity(average),
            personal_score(average),
        )?;

        debug!(user_id, intensity, "Classified with {}", self.classifier.name());
        info!(user_id, ordinal = %ordinal, "Recorded sentiment response");
        Ok(SentimentRecord {
            response,
            probabilities,
            history,
        })
    }

    pub fn dashboard(&self, user_id: i64) -> Result<SentimentDashboard> {
        let current = self.db.sentiment_history(user_id, 1)?.into_iter().next();
        Ok(SentimentDashboard {
            current,
            recent_responses: self.db.list_sentiment_responses(user_id, 10)?,
        })
    }

    pub fn trend(&self, user_id: i64) -> Result<SentimentTrend> {
        let entries = self.db.sentiment_history(user_id, RISK_WINDOW as i64)?;
        let scores: Vec<f64> = entries.iter().map(|e| e.personal_sentiment_score).collect();
        Ok(SentimentTrend {
            summary: TrendSummary::from_newest_first(&scores, RISK_WINDOW),
            entries,
        })
    }

    pub fn risk(&self, user_id: i64) -> Result<RiskAssessment> {
        let scores: Vec<f64> = self
            .db
            .sentiment_history(user_id, RISK_WINDOW as i64)?
            .iter()
            .map(|e| e.personal_sentiment_score)
            .collect();
        assess_risk(&scores).ok_or_else(|| {
            Error::NotFound("No sentiment history yet. Submit a survey response first.".to_string())
        })
    }
}
