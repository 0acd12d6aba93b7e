//! Score model provider
//!
//! Resolves a [`Predictor`] for 15-feature vectors: a trained bundle from
//! the first loadable candidate artifact, else the built-in
//! [`FallbackPredictor`]. Resolution is cached per provider.

mod bundle;
mod fallback;
mod provider;
pub mod training;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{ProfileFeatures, ScoreCategory};

pub use bundle::{
    BundlePredictor, FeatureImportance, LinearModel, ModelBundle, ModelInfo, StandardScaler,
    BUNDLE_FORMAT,
};
pub use fallback::FallbackPredictor;
pub use provider::{
    LoadAttempt, LoadOutcome, ModelCandidates, ModelProvider, ModelSource, ModelTier,
    ResolvedModel, models_dir, MODELS_DIR_ENV,
};

/// Number of model input features
pub const FEATURE_COUNT: usize = 15;

/// Model input order; artifacts must list exactly these names
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "income",
    "age",
    "employment_length",
    "debt_to_income",
    "credit_utilization",
    "payment_history",
    "credit_mix",
    "new_credit",
    "credit_history_length",
    "public_records",
    "loan_amount",
    "interest_rate",
    "monthly_payment",
    "total_accounts",
    "delinquent_accounts",
];

/// A scorer over the fixed feature order
pub trait Predictor: Send + Sync {
    /// Raw prediction; callers clamp to the score range
    fn predict(&self, features: &[f64]) -> Result<f64>;

    fn name(&self) -> &str;

    fn version(&self) -> &str;
}

/// Features in model order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn from_features(f: &ProfileFeatures) -> Self {
        Self([
            f.income,
            f.age as f64,
            f.employment_length,
            f.debt_to_income,
            f.credit_utilization,
            f.payment_history,
            f.credit_mix,
            f.new_credit,
            f.credit_history_length,
            f.public_records as f64,
            f.loan_amount,
            f.interest_rate,
            f.monthly_payment,
            f.total_accounts as f64,
            f.delinquent_accounts as f64,
        ])
    }

    /// Build from a request, naming every missing required field
    pub fn from_request(req: &PredictionRequest) -> Result<Self> {
        let required = [
            ("income", req.income),
            ("age", req.age),
            ("employment_length", req.employment_length),
            ("debt_to_income", req.debt_to_income),
            ("credit_utilization", req.credit_utilization),
            ("payment_history", req.payment_history),
            ("credit_mix", req.credit_mix),
            ("new_credit", req.new_credit),
            ("credit_history_length", req.credit_history_length),
            ("public_records", req.public_records),
        ];
        let missing: Vec<String> = required
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingFields(missing));
        }

        let mut values = [0.0; FEATURE_COUNT];
        for (slot, (_, value)) in values.iter_mut().zip(required) {
            *slot = value.unwrap_or_default();
        }
        values[10] = req.loan_amount.unwrap_or(0.0);
        values[11] = req.interest_rate.unwrap_or(0.0);
        values[12] = req.monthly_payment.unwrap_or(0.0);
        values[13] = req.total_accounts.unwrap_or(0.0);
        values[14] = req.delinquent_accounts.unwrap_or(0.0);

        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::Validation(format!(
                "{} must be a finite number",
                FEATURE_NAMES[i]
            )));
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// The model prediction payload; the first ten fields are required
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub income: Option<f64>,
    pub age: Option<f64>,
    pub employment_length: Option<f64>,
    pub debt_to_income: Option<f64>,
    pub credit_utilization: Option<f64>,
    pub payment_history: Option<f64>,
    pub credit_mix: Option<f64>,
    pub new_credit: Option<f64>,
    pub credit_history_length: Option<f64>,
    pub public_records: Option<f64>,
    pub loan_amount: Option<f64>,
    pub interest_rate: Option<f64>,
    pub monthly_payment: Option<f64>,
    pub total_accounts: Option<f64>,
    pub delinquent_accounts: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub score: u16,
    pub category: ScoreCategory,
    pub model_version: String,
    /// Which artifact (or the fallback) produced the score
    pub source: String,
    pub fallback: bool,
}

/// Truncate and clamp a raw prediction into the score range
pub(crate) fn bound_score(raw: f64) -> Option<u16> {
    crate::scoring::clamp_score(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_request() -> PredictionRequest {
        PredictionRequest {
            income: Some(85_000.0),
            age: Some(41.0),
            employment_length: Some(9.0),
            debt_to_income: Some(0.22),
            credit_utilization: Some(0.18),
            payment_history: Some(0.97),
            credit_mix: Some(0.7),
            new_credit: Some(0.2),
            credit_history_length: Some(14.0),
            public_records: Some(0.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_optional_features_default_to_zero() {
        let v = FeatureVector::from_request(&full_request()).unwrap();
        assert_eq!(v.0[0], 85_000.0);
        assert_eq!(v.0[5], 0.97);
        assert_eq!(v.0[9], 0.0);
        assert_eq!(&v.0[10..], &[0.0; 5]);
    }

    #[test]
    fn test_missing_required_features_named() {
        let mut req = full_request();
        req.new_credit = None;
        req.age = None;
        match FeatureVector::from_request(&req).unwrap_err() {
            Error::MissingFields(fields) => assert_eq!(fields, vec!["age", "new_credit"]),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_profile_vector_order() {
        let mut f = ProfileFeatures::placeholder();
        f.delinquent_accounts = 2;
        f.credit_utilization = 0.44;
        let v = FeatureVector::from_features(&f);
        assert_eq!(v.0[FEATURE_NAMES.iter().position(|n| *n == "credit_utilization").unwrap()], 0.44);
        assert_eq!(v.0[14], 2.0);
        assert_eq!(v.as_slice().len(), FEATURE_COUNT);
    }
}
