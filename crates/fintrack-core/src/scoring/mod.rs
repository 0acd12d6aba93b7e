//! Credit score engine
//!
//! Merges a partial profile update over the stored profile, scores the
//! result with the band tables, explains it, and appends a snapshot to the
//! score history ledger.
//!
//! Only validation errors escape [`ScoringService::calculate`]; every other
//! failure is converted into the fixed fallback result so callers always
//! have a renderable score.

mod bands;
mod explain;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tracing::{error, info, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{ProfileFeatures, ProfileUpdate, ScoreCategory, ScoreSnapshot};
use crate::predictor::{ModelProvider, Prediction, PredictionRequest};
use crate::trend::{deltas_newest_first, TrendSummary};

pub use bands::{
    breakdown, clamp_score, raw_total, BandTable, Factor, FactorScore, Otherwise, Threshold,
    BASE_SCORE, MAX_SCORE, MIN_SCORE, NO_INCOME_POINTS,
};
pub use explain::explain;

/// Score returned whenever a calculation cannot be completed
pub const FALLBACK_SCORE: u16 = 650;

/// Category reported with [`FALLBACK_SCORE`]; fixed, not derived from the bands
pub const FALLBACK_CATEGORY: ScoreCategory = ScoreCategory::Good;

pub const DEFAULT_HISTORY_LIMIT: i64 = 20;
pub const MAX_HISTORY_LIMIT: i64 = 100;

const FALLBACK_MESSAGE: &str =
    "Unable to calculate your credit score accurately. Using default score.";
const FALLBACK_FACTOR: &str = "Error in credit score calculation. Please try again later.";
const MISSING_PROFILE_MESSAGE: &str =
    "Unable to calculate your credit score. Please complete your financial profile in the Dashboard.";
const MISSING_PROFILE_FACTOR: &str = "Financial profile is incomplete or missing.";

fn features_or_empty<S: Serializer>(
    features: &Option<ProfileFeatures>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match features {
        Some(f) => f.serialize(serializer),
        None => serde_json::Map::new().serialize(serializer),
    }
}

/// Outcome of a score calculation, always renderable
#[derive(Debug, Clone, Serialize)]
pub struct ScoreResult {
    pub score: u16,
    pub category: ScoreCategory,
    pub message: String,
    pub factors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub breakdown: Vec<FactorScore>,
    #[serde(serialize_with = "features_or_empty")]
    pub financial_data: Option<ProfileFeatures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculated_at: Option<DateTime<Utc>>,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScoreResult {
    /// Score a merged profile with the band tables
    pub fn from_features(features: ProfileFeatures) -> Result<Self> {
        let total = raw_total(&features);
        let score = clamp_score(total)
            .ok_or_else(|| Error::Computation(format!("non-finite score total {}", total)))?;
        let category = ScoreCategory::from_score(score);

        Ok(Self {
            score,
            category,
            message: category.message().to_string(),
            factors: explain(&features),
            breakdown: breakdown(&features),
            financial_data: Some(features),
            snapshot_id: None,
            calculated_at: None,
            fallback: false,
            error: None,
        })
    }

    /// Rebuild the result a stored snapshot represents
    pub fn from_snapshot(snapshot: &ScoreSnapshot) -> Self {
        Self {
            score: snapshot.score,
            category: snapshot.category,
            message: snapshot.category.message().to_string(),
            factors: explain(&snapshot.features),
            breakdown: breakdown(&snapshot.features),
            financial_data: Some(snapshot.features),
            snapshot_id: Some(snapshot.id),
            calculated_at: Some(snapshot.calculated_at),
            fallback: false,
            error: None,
        }
    }

    fn placeholder(message: &str, factor: &str, error: Option<String>) -> Self {
        Self {
            score: FALLBACK_SCORE,
            category: FALLBACK_CATEGORY,
            message: message.to_string(),
            factors: vec![factor.to_string()],
            breakdown: Vec::new(),
            financial_data: None,
            snapshot_id: None,
            calculated_at: None,
            fallback: true,
            error,
        }
    }

    /// The fixed response for unexpected internal failures
    pub fn fallback() -> Self {
        Self::placeholder(
            FALLBACK_MESSAGE,
            FALLBACK_FACTOR,
            Some("An error occurred while calculating your credit score".to_string()),
        )
    }

    /// Response for reads when the user has no score yet
    pub fn missing_profile() -> Self {
        Self::placeholder(
            MISSING_PROFILE_MESSAGE,
            MISSING_PROFILE_FACTOR,
            Some("No credit score history found".to_string()),
        )
    }

    /// Fallback payload carrying a validation error
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::placeholder(MISSING_PROFILE_MESSAGE, MISSING_PROFILE_FACTOR, Some(reason.into()))
    }
}

/// Validate an update, merge it over `current` and score the result.
///
/// Pure: nothing is read or written.
pub fn compute_score(update: &ProfileUpdate, current: &ProfileFeatures) -> Result<ScoreResult> {
    let missing = update.missing_required();
    if !missing.is_empty() {
        return Err(Error::MissingFields(missing));
    }
    update.check_values()?;
    ScoreResult::from_features(update.apply_to(current))
}

/// One history entry with its change against the previous snapshot
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub snapshot: ScoreSnapshot,
    pub change: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreHistory {
    pub entries: Vec<HistoryEntry>,
    pub trend: TrendSummary,
}

/// Score operations against the store and the model provider
#[derive(Clone)]
pub struct ScoringService {
    db: Database,
    models: Arc<ModelProvider>,
}

impl ScoringService {
    pub fn new(db: Database, models: Arc<ModelProvider>) -> Self {
        Self { db, models }
    }

    pub fn models(&self) -> &Arc<ModelProvider> {
        &self.models
    }

    /// Update the user's profile from `update`, score it and record a snapshot.
    ///
    /// Returns `Err` only for validation failures, before anything is
    /// written. Internal failures yield `Ok` with the fallback result.
    pub fn calculate(&self, user_id: i64, update: &ProfileUpdate) -> Result<ScoreResult> {
        match self.calculate_inner(user_id, update) {
            Ok(result) => Ok(result),
            Err(e) if e.is_validation() => Err(e),
            Err(e) => {
                error!(user_id, "Credit score calculation failed: {}", e);
                Ok(ScoreResult::fallback())
            }
        }
    }

    fn calculate_inner(&self, user_id: i64, update: &ProfileUpdate) -> Result<ScoreResult> {
        // Scored at full precision; the stored row is rounded
        let (profile, mut result) = self.db.update_profile_with(user_id, |current| {
            let result = compute_score(update, current)?;
            Ok((update.apply_to(current), result))
        })?;
        result.financial_data = Some(profile.features);

        let calculated_at = Utc::now();
        result.calculated_at = Some(calculated_at);

        // The score stands even if the ledger write fails
        match self.db.append_snapshot(
            user_id,
            result.score,
            result.category,
            calculated_at,
            &profile.features,
        ) {
            Ok(snapshot) => result.snapshot_id = Some(snapshot.id),
            Err(e) => warn!(user_id, "Failed to record score snapshot: {}", e),
        }

        info!(
            user_id,
            score = result.score,
            category = %result.category,
            "Credit score calculated"
        );
        Ok(result)
    }

    /// The newest recorded score
    pub fn latest(&self, user_id: i64) -> Result<ScoreResult> {
        self.db
            .latest_snapshot(user_id)?
            .map(|snapshot| ScoreResult::from_snapshot(&snapshot))
            .ok_or_else(|| Error::NotFound(format!("No credit score history for user {}", user_id)))
    }

    /// Recent snapshots with per-entry change and a trend summary
    pub fn history(&self, user_id: i64, limit: i64) -> Result<ScoreHistory> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        // One extra row gives the oldest returned entry its change
        let mut snapshots = self.db.score_history(user_id, limit + 1)?;
        let scores: Vec<f64> = snapshots.iter().map(|s| s.score as f64).collect();
        let deltas = deltas_newest_first(&scores);
        snapshots.truncate(limit as usize);
        let shown = snapshots.len();

        let entries = snapshots
            .into_iter()
            .zip(deltas)
            .map(|(snapshot, change)| HistoryEntry {
                snapshot,
                change: change.map(|d| d as i32),
            })
            .collect();

        Ok(ScoreHistory {
            entries,
            trend: TrendSummary::from_newest_first(&scores[..shown], shown),
        })
    }

    /// Score a full feature vector with the resolved model
    pub fn predict(&self, request: &PredictionRequest) -> Result<Prediction> {
        self.models.predict(request)
    }
}
