//! Numeric trend over a bounded, newest-first history
//!
//! Shared by the score history (deltas and volatility of credit scores) and
//! the sentiment risk assessment (volatility and recent change of personal
//! sentiment scores).

use serde::Serialize;

/// Summary statistics over the most recent values
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendSummary {
    /// Number of values considered
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation
    pub volatility: f64,
    /// Newest minus oldest within the window
    pub net_change: f64,
    pub newest: Option<f64>,
    pub oldest: Option<f64>,
}

impl TrendSummary {
    /// Summarize up to `window` values from a newest-first slice
    pub fn from_newest_first(values: &[f64], window: usize) -> Self {
        let values = &values[..values.len().min(window)];
        let count = values.len();
        if count == 0 {
            return Self {
                count: 0,
                mean: 0.0,
                volatility: 0.0,
                net_change: 0.0,
                newest: None,
                oldest: None,
            };
        }

        let mean = values.iter().sum::<f64>() / count as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        let newest = values[0];
        let oldest = values[count - 1];

        Self {
            count,
            mean,
            volatility: variance.sqrt(),
            net_change: newest - oldest,
            newest: Some(newest),
            oldest: Some(oldest),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Change of each value against the next older one; the oldest has none
pub fn deltas_newest_first(values: &[f64]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| values.get(i + 1).map(|older| values[i] - older))
        .collect()
}
