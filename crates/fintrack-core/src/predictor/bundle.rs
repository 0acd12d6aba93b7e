//! Trained model artifact: a linear model and its feature scaler, stored
//! together as one JSON bundle

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Predictor, FEATURE_COUNT, FEATURE_NAMES};
use crate::error::{Error, Result};
use crate::files::write_atomic;

/// Format tag written into every bundle
pub const BUNDLE_FORMAT: &str = "fintrack-linear-v1";

/// Per-feature standardization fitted on the training set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn transform(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn predict(&self, scaled: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(scaled)
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format: String,
    pub version: String,
    pub model_type: String,
    pub trained_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub model: LinearModel,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

/// Share of total absolute weight carried by one feature
#[derive(Debug, Clone, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Description of the resolved model for display
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub version: String,
    pub trained_at: Option<DateTime<Utc>>,
    pub source: String,
    pub feature_importance: Vec<FeatureImportance>,
    pub metrics: BTreeMap<String, f64>,
}

impl ModelBundle {
    /// Read and validate a bundle
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let bundle: Self = serde_json::from_str(&content)?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// Reject bundles whose schema doesn't match the fixed feature order
    pub fn validate(&self) -> Result<()> {
        if self.format != BUNDLE_FORMAT {
            return Err(Error::Model(format!(
                "unsupported bundle format '{}', expected '{}'",
                self.format, BUNDLE_FORMAT
            )));
        }
        if self.feature_names.len() != FEATURE_COUNT
            || self
                .feature_names
                .iter()
                .zip(FEATURE_NAMES)
                .any(|(a, b)| a != b)
        {
            return Err(Error::Model(
                "feature names do not match the expected model input order".to_string(),
            ));
        }
        if self.scaler.mean.len() != FEATURE_COUNT
            || self.scaler.scale.len() != FEATURE_COUNT
            || self.model.coefficients.len() != FEATURE_COUNT
        {
            return Err(Error::Model(format!(
                "scaler and model must have {} entries",
                FEATURE_COUNT
            )));
        }
        if self
            .scaler
            .scale
            .iter()
            .any(|s| !s.is_finite() || *s == 0.0)
        {
            return Err(Error::Model("scaler has a zero or non-finite scale".to_string()));
        }
        if !self.model.intercept.is_finite()
            || self.model.coefficients.iter().any(|c| !c.is_finite())
            || self.scaler.mean.iter().any(|m| !m.is_finite())
        {
            return Err(Error::Model("model has non-finite parameters".to_string()));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json)
    }

    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != FEATURE_COUNT {
            return Err(Error::Model(format!(
                "expected {} features, got {}",
                FEATURE_COUNT,
                features.len()
            )));
        }
        let value = self.model.predict(&self.scaler.transform(features));
        if !value.is_finite() {
            return Err(Error::Model("prediction is not finite".to_string()));
        }
        Ok(value)
    }

    /// Absolute standardized coefficients, normalized and sorted descending
    pub fn feature_importance(&self) -> Vec<FeatureImportance> {
        let total: f64 = self.model.coefficients.iter().map(|c| c.abs()).sum();
        let mut importance: Vec<FeatureImportance> = self
            .feature_names
            .iter()
            .zip(&self.model.coefficients)
            .map(|(name, c)| FeatureImportance {
                feature: name.clone(),
                importance: if total > 0.0 { c.abs() / total } else { 0.0 },
            })
            .collect();
        importance.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        importance
    }

    pub fn info(&self, source: &str) -> ModelInfo {
        ModelInfo {
            model_type: self.model_type.clone(),
            version: self.version.clone(),
            trained_at: Some(self.trained_at),
            source: source.to_string(),
            feature_importance: self.feature_importance(),
            metrics: self.metrics.clone(),
        }
    }
}

/// A loaded bundle behind the [`Predictor`] seam
pub struct BundlePredictor {
    bundle: ModelBundle,
    name: String,
}

impl BundlePredictor {
    pub fn new(bundle: ModelBundle, name: impl Into<String>) -> Self {
        Self {
            bundle,
            name: name.into(),
        }
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }
}

impl Predictor for BundlePredictor {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        self.bundle.predict(features)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.bundle.version
    }
}

#[cfg(test)]
pub(crate) fn sample_bundle() -> ModelBundle {
    let mut coefficients = vec![0.0; FEATURE_COUNT];
    coefficients[5] = 60.0;
    coefficients[4] = -30.0;
    coefficients[0] = 10.0;
    ModelBundle {
        format: BUNDLE_FORMAT.to_string(),
        version: "test-1".to_string(),
        model_type: "ridge_regression".to_string(),
        trained_at: Utc::now(),
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        scaler: StandardScaler {
            mean: vec![0.0; FEATURE_COUNT],
            scale: vec![1.0; FEATURE_COUNT],
        },
        model: LinearModel {
            intercept: 600.0,
            coefficients,
        },
        metrics: BTreeMap::from([("rmse".to_string(), 12.5)]),
    }
}
