//! Model resolution: primary → secondary → tertiary artifact → fallback
//!
//! ## Candidate resolution
//!
//! Artifacts are looked up in the models directory (`FINTRACK_MODELS_DIR`,
//! else `<data dir>/fintrack/models`). An optional `models.toml` there can
//! point any tier at a different file:
//!
//! ```toml
//! primary = "robust_credit_score_model.json"
//! secondary = "/opt/models/credit_v2.json"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    bound_score, BundlePredictor, FallbackPredictor, FeatureImportance, FeatureVector, ModelBundle,
    ModelInfo, Prediction, PredictionRequest, Predictor,
};
use crate::error::{Error, Result};
use crate::models::ScoreCategory;

/// Environment variable for the models directory
pub const MODELS_DIR_ENV: &str = "FINTRACK_MODELS_DIR";

const PRIMARY_FILE: &str = "robust_credit_score_model.json";
const SECONDARY_FILE: &str = "new_credit_score_model.json";
const TERTIARY_FILE: &str = "credit_score_model.json";
const OVERRIDES_FILE: &str = "models.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Primary,
    Secondary,
    Tertiary,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Tertiary => "tertiary",
        }
    }
}

/// Where the resolved predictor came from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSource {
    Artifact { tier: ModelTier, path: PathBuf },
    Fallback,
}

impl ModelSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Artifact { tier, .. } => tier.as_str(),
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum LoadOutcome {
    Missing,
    Failed(String),
    Loaded,
}

/// One step of the resolution chain
#[derive(Debug, Clone, Serialize)]
pub struct LoadAttempt {
    pub tier: ModelTier,
    pub path: PathBuf,
    pub outcome: LoadOutcome,
}

/// Result of walking the chain once
pub struct ResolvedModel {
    pub source: ModelSource,
    pub predictor: Arc<dyn Predictor>,
    pub attempts: Vec<LoadAttempt>,
    pub info: ModelInfo,
}

impl ResolvedModel {
    /// Whether any candidate file exists, loadable or not
    pub fn has_artifact(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| a.outcome != LoadOutcome::Missing)
    }

    pub fn is_fallback(&self) -> bool {
        self.source == ModelSource::Fallback
    }
}

impl std::fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("source", &self.source)
            .field("predictor", &self.predictor.name())
            .field("attempts", &self.attempts)
            .finish()
    }
}

/// Raw `models.toml`
#[derive(Debug, Default, Deserialize)]
struct RawOverrides {
    primary: Option<PathBuf>,
    secondary: Option<PathBuf>,
    tertiary: Option<PathBuf>,
}

/// Ordered artifact paths to try
#[derive(Debug, Clone, Default)]
pub struct ModelCandidates {
    entries: Vec<(ModelTier, PathBuf)>,
}

impl ModelCandidates {
    /// No artifacts: always resolves to the fallback predictor
    pub fn empty() -> Self {
        Self::default()
    }

    /// The default file names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            entries: vec![
                (ModelTier::Primary, dir.join(PRIMARY_FILE)),
                (ModelTier::Secondary, dir.join(SECONDARY_FILE)),
                (ModelTier::Tertiary, dir.join(TERTIARY_FILE)),
            ],
        }
    }

    /// Defaults for `dir`, with `models.toml` overrides applied when present
    pub fn load(dir: &Path) -> Result<Self> {
        let mut candidates = Self::in_dir(dir);
        let overrides_path = dir.join(OVERRIDES_FILE);
        if !overrides_path.exists() {
            return Ok(candidates);
        }

        let raw: RawOverrides = toml::from_str(&fs::read_to_string(&overrides_path)?)?;
        for (tier, path) in [
            (ModelTier::Primary, raw.primary),
            (ModelTier::Secondary, raw.secondary),
            (ModelTier::Tertiary, raw.tertiary),
        ] {
            if let Some(path) = path {
                candidates.set(tier, dir.join(path));
            }
        }
        debug!("Applied model overrides from {}", overrides_path.display());
        Ok(candidates)
    }

    /// Candidates for the configured models directory
    pub fn from_env() -> Self {
        let dir = models_dir();
        Self::load(&dir).unwrap_or_else(|e| {
            warn!("Ignoring invalid {}: {}", dir.join(OVERRIDES_FILE).display(), e);
            Self::in_dir(&dir)
        })
    }

    pub fn set(&mut self, tier: ModelTier, path: PathBuf) {
        match self.entries.iter_mut().find(|(t, _)| *t == tier) {
            Some(entry) => entry.1 = path,
            None => self.entries.push((tier, path)),
        }
    }

    /// Path for a tier, if configured
    pub fn path(&self, tier: ModelTier) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(t, _)| *t == tier)
            .map(|(_, p)| p.as_path())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ModelTier, PathBuf)> {
        self.entries.iter()
    }
}

/// The configured models directory
pub fn models_dir() -> PathBuf {
    std::env::var(MODELS_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| crate::config::default_data_dir().join("models"))
}

fn fallback_info() -> ModelInfo {
    // Maximum contribution of each input to the heuristic
    let weights = [
        ("payment_history", 100.0),
        ("credit_utilization", 80.0),
        ("credit_history_length", 50.0),
        ("income", 30.0),
    ];
    let total: f64 = weights.iter().map(|(_, w)| w).sum();
    ModelInfo {
        model_type: "heuristic".to_string(),
        version: "fallback".to_string(),
        trained_at: None,
        source: ModelSource::Fallback.label().to_string(),
        feature_importance: weights
            .iter()
            .map(|(name, w)| FeatureImportance {
                feature: name.to_string(),
                importance: w / total,
            })
            .collect(),
        metrics: Default::default(),
    }
}

/// Resolves and caches the predictor for this process.
///
/// Construct one and share it (`Arc<ModelProvider>`); there is no global
/// instance.
pub struct ModelProvider {
    candidates: ModelCandidates,
    cache: RwLock<Option<Arc<ResolvedModel>>>,
}

impl ModelProvider {
    pub fn new(candidates: ModelCandidates) -> Self {
        Self {
            candidates,
            cache: RwLock::new(None),
        }
    }

    pub fn from_env() -> Self {
        Self::new(ModelCandidates::from_env())
    }

    /// A provider with no artifacts to try
    pub fn fallback_only() -> Self {
        Self::new(ModelCandidates::empty())
    }

    pub fn candidates(&self) -> &ModelCandidates {
        &self.candidates
    }

    /// The cached model, resolving it on first use.
    ///
    /// Concurrent first callers may each walk the chain; only the first
    /// result is kept and every caller gets that one.
    pub fn get_model(&self) -> Arc<ResolvedModel> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(model) = cache.as_ref() {
                return Arc::clone(model);
            }
        }

        let resolved = Arc::new(self.resolve());
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(cache.get_or_insert(resolved))
    }

    /// Drop the cached model; the next use resolves again
    pub fn invalidate(&self) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        *cache = None;
        info!("Model cache invalidated");
    }

    /// Walk the candidate chain without touching the cache
    pub fn resolve(&self) -> ResolvedModel {
        let mut attempts = Vec::new();

        for (tier, path) in self.candidates.iter() {
            if !path.exists() {
                debug!("No {} model at {}", tier.as_str(), path.display());
                attempts.push(LoadAttempt {
                    tier: *tier,
                    path: path.clone(),
                    outcome: LoadOutcome::Missing,
                });
                continue;
            }

            match ModelBundle::load(path) {
                Ok(bundle) => {
                    info!(
                        "Loaded {} model {} from {}",
                        tier.as_str(),
                        bundle.version,
                        path.display()
                    );
                    attempts.push(LoadAttempt {
                        tier: *tier,
                        path: path.clone(),
                        outcome: LoadOutcome::Loaded,
                    });
                    let info = bundle.info(tier.as_str());
                    return ResolvedModel {
                        source: ModelSource::Artifact {
                            tier: *tier,
                            path: path.clone(),
                        },
                        predictor: Arc::new(BundlePredictor::new(bundle, tier.as_str())),
                        attempts,
                        info,
                    };
                }
                Err(e) => {
                    warn!(
                        "Failed to load {} model from {}: {}",
                        tier.as_str(),
                        path.display(),
                        e
                    );
                    attempts.push(LoadAttempt {
                        tier: *tier,
                        path: path.clone(),
                        outcome: LoadOutcome::Failed(e.to_string()),
                    });
                }
            }
        }

        warn!("No trained model available, using fallback predictor");
        ResolvedModel {
            source: ModelSource::Fallback,
            predictor: Arc::new(FallbackPredictor),
            attempts,
            info: fallback_info(),
        }
    }

    /// Score a vector with the resolved model, degrading to the fallback
    /// predictor if it errors
    pub fn score_vector(&self, features: &FeatureVector) -> Prediction {
        let model = self.get_model();
        let raw = model.predictor.predict(features.as_slice());

        match raw.ok().and_then(bound_score) {
            Some(score) => Prediction {
                score,
                category: ScoreCategory::from_score(score),
                model_version: model.predictor.version().to_string(),
                source: model.source.label().to_string(),
                fallback: model.is_fallback(),
            },
            None => {
                warn!(
                    "Model {} failed to score, using fallback predictor",
                    model.predictor.name()
                );
                let score = FallbackPredictor.score(features.as_slice());
                Prediction {
                    score,
                    category: ScoreCategory::from_score(score),
                    model_version: FallbackPredictor.version().to_string(),
                    source: ModelSource::Fallback.label().to_string(),
                    fallback: true,
                }
            }
        }
    }

    /// Validate a request and score it.
    ///
    /// NotFound when no artifact file exists at all.
    pub fn predict(&self, request: &PredictionRequest) -> Result<Prediction> {
        let features = FeatureVector::from_request(request)?;
        if !self.get_model().has_artifact() {
            return Err(Error::NotFound(
                "No trained credit score model found. Train one with `fintrack model train`."
                    .to_string(),
            ));
        }
        Ok(self.score_vector(&features))
    }

    /// Description of the resolved model; NotFound without any artifact
    pub fn info(&self) -> Result<ModelInfo> {
        let model = self.get_model();
        if !model.has_artifact() {
            return Err(Error::NotFound("No trained credit score model found".to_string()));
        }
        Ok(model.info.clone())
    }

    /// Short label of the resolved source, for health checks
    pub fn source_label(&self) -> &'static str {
        self.get_model().source.label()
    }
}
