//! Dependency-free heuristic used when no trained model loads

use super::{Predictor, FEATURE_COUNT};
use crate::error::Result;
use crate::scoring::FALLBACK_SCORE;

const INCOME_IDX: usize = 0;
const UTILIZATION_IDX: usize = 4;
const PAYMENT_HISTORY_IDX: usize = 5;
const HISTORY_LENGTH_IDX: usize = 8;

/// Reduced band logic over payment history, utilization, history length
/// and income. Never fails; malformed input scores [`FALLBACK_SCORE`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackPredictor;

impl FallbackPredictor {
    pub fn score(&self, features: &[f64]) -> u16 {
        if features.len() < FEATURE_COUNT || features.iter().any(|v| !v.is_finite()) {
            return FALLBACK_SCORE;
        }

        let payment = features[PAYMENT_HISTORY_IDX] * 100.0;
        let utilization = (1.0 - features[UTILIZATION_IDX]) * 80.0;
        let history = (features[HISTORY_LENGTH_IDX] * 10.0).min(50.0);
        let income = (features[INCOME_IDX] / 10_000.0).min(30.0);

        let raw = 500.0 + payment + utilization + history + income;
        super::bound_score(raw).unwrap_or(FALLBACK_SCORE)
    }
}

impl Predictor for FallbackPredictor {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        Ok(self.score(features) as f64)
    }

    fn name(&self) -> &str {
        "fallback"
    }

    fn version(&self) -> &str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(income: f64, util: f64, ph: f64, history: f64) -> Vec<f64> {
        let mut v = vec![0.0; FEATURE_COUNT];
        v[INCOME_IDX] = income;
        v[UTILIZATION_IDX] = util;
        v[PAYMENT_HISTORY_IDX] = ph;
        v[HISTORY_LENGTH_IDX] = history;
        v
    }

    #[test]
    fn test_empty_vector_scores_default() {
        assert_eq!(FallbackPredictor.score(&[]), 650);
        assert_eq!(FallbackPredictor.predict(&[]).unwrap(), 650.0);
    }

    #[test]
    fn test_malformed_vectors_score_default() {
        assert_eq!(FallbackPredictor.score(&[0.9, 0.1]), 650);
        let mut v = vector(50_000.0, 0.2, 0.9, 5.0);
        v[3] = f64::NAN;
        assert_eq!(FallbackPredictor.score(&v), 650);
    }

    #[test]
    fn test_formula() {
        // 500 + 90 + 64 + 50 + 5
        assert_eq!(FallbackPredictor.score(&vector(50_000.0, 0.2, 0.9, 5.0)), 709);
        // caps: history at 50, income at 30
        assert_eq!(FallbackPredictor.score(&vector(1_000_000.0, 0.0, 1.0, 40.0)), 760);
    }

    #[test]
    fn test_clamped_to_range() {
        assert_eq!(FallbackPredictor.score(&vector(0.0, 8.0, 0.0, 0.0)), 300);
        assert_eq!(FallbackPredictor.score(&vector(0.0, 0.0, 5.0, 0.0)), 850);
    }
}
