//! Synthetic training data and ridge regression fitting
//!
//! Synthetic profiles are drawn over realistic ranges and labelled with the
//! band engine plus noise, so a trained bundle approximates the rule-based
//! score. Fitting standardizes the features, solves the ridge normal
//! equations, and reports holdout metrics.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use chrono::Utc;
use csv::{ReaderBuilder, WriterBuilder};
use tracing::info;

use super::{
    FeatureVector, LinearModel, ModelBundle, StandardScaler, BUNDLE_FORMAT, FEATURE_COUNT,
    FEATURE_NAMES,
};
use crate::error::{Error, Result};
use crate::models::{amortized_payment, round2, ProfileFeatures};
use crate::scoring::{clamp_score, raw_total};

/// Label column in training CSVs
pub const LABEL_COLUMN: &str = "credit_score";

/// Fewest rows `train` accepts
pub const MIN_TRAINING_ROWS: usize = 20;

/// One labelled example
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub features: [f64; FEATURE_COUNT],
    pub credit_score: f64,
}

/// Small deterministic generator (SplitMix64)
#[derive(Debug, Clone)]
pub struct SplitMix64(u64);

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    pub fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Standard normal via Box-Muller
    pub fn normal(&mut self) -> f64 {
        let u1 = self.next_f64().max(f64::MIN_POSITIVE);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Weighted pick of an index
    fn weighted(&mut self, weights: &[f64]) -> usize {
        let total: f64 = weights.iter().sum();
        let mut roll = self.range(0.0, total);
        for (i, w) in weights.iter().enumerate() {
            if roll < *w {
                return i;
            }
            roll -= w;
        }
        weights.len() - 1
    }
}

fn synthetic_profile(rng: &mut SplitMix64) -> ProfileFeatures {
    let age = rng.range(18.0, 75.0).floor();
    let working_years = (age - 18.0).max(0.0);
    let income = round2(rng.range(15_000.0, 200_000.0));
    let debt_to_income = round2(rng.range(0.0, 0.8));
    let loan_amount = round2(rng.range(0.0, 300_000.0));
    let interest_rate = round2(rng.range(2.0, 25.0));

    ProfileFeatures {
        income,
        age: age as i64,
        employment_length: round2(rng.range(0.0, working_years.min(40.0))),
        monthly_debt_payment: round2(income * debt_to_income / 12.0),
        total_credit_limit: 0.0,
        current_credit_balance: 0.0,
        debt_to_income,
        credit_utilization: round2(rng.next_f64()),
        payment_history: round2(rng.range(0.5, 1.0)),
        credit_mix: round2(rng.next_f64()),
        new_credit: round2(rng.next_f64()),
        credit_history_length: round2(rng.range(0.0, working_years.min(40.0))),
        public_records: rng.weighted(&[0.75, 0.15, 0.07, 0.03]) as i64,
        total_accounts: rng.range(0.0, 16.0).floor() as i64,
        delinquent_accounts: rng.weighted(&[0.6, 0.2, 0.1, 0.06, 0.04]) as i64,
        loan_amount,
        interest_rate,
        monthly_payment: amortized_payment(loan_amount, interest_rate, 60),
    }
}

/// Deterministic synthetic dataset labelled by the band engine
pub fn generate_synthetic(n: usize, seed: u64) -> Vec<TrainingRow> {
    let mut rng = SplitMix64::new(seed);
    (0..n)
        .map(|_| {
            let profile = synthetic_profile(&mut rng);
            let noisy = raw_total(&profile) + rng.normal() * 15.0;
            let label = clamp_score(noisy).unwrap_or(300) as f64;
            TrainingRow {
                features: FeatureVector::from_features(&profile).0,
                credit_score: label,
            }
        })
        .collect()
}

/// Write rows as CSV with a header row
pub fn write_csv<W: Write>(writer: W, rows: &[TrainingRow]) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);

    let mut header: Vec<&str> = FEATURE_NAMES.to_vec();
    header.push(LABEL_COLUMN);
    wtr.write_record(&header)?;

    for row in rows {
        let mut record: Vec<String> = row.features.iter().map(|v| v.to_string()).collect();
        record.push(row.credit_score.to_string());
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read a training CSV; columns are matched by header name
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<TrainingRow>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| Error::Training(format!("missing column '{}'", name)))
    };
    let feature_columns = FEATURE_NAMES
        .iter()
        .map(|name| column(name))
        .collect::<Result<Vec<_>>>()?;
    let label_column = column(LABEL_COLUMN)?;

    let parse = |record: &csv::StringRecord, idx: usize, line: usize| -> Result<f64> {
        let raw = record.get(idx).unwrap_or("").trim();
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| Error::Training(format!("line {}: invalid number '{}'", line, raw)))
    };

    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let line = i + 2;
        let mut features = [0.0; FEATURE_COUNT];
        for (slot, idx) in features.iter_mut().zip(&feature_columns) {
            *slot = parse(&record, *idx, line)?;
        }
        rows.push(TrainingRow {
            features,
            credit_score: parse(&record, label_column, line)?,
        });
    }
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// L2 penalty on standardized coefficients
    pub ridge_alpha: f64,
    /// Fraction of rows held out for metrics
    pub holdout: f64,
    pub version: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            ridge_alpha: 1.0,
            holdout: 0.2,
            version: format!("ridge-{}", Utc::now().format("%Y%m%d%H%M%S")),
        }
    }
}

fn fit_scaler(rows: &[TrainingRow]) -> StandardScaler {
    let n = rows.len() as f64;
    let mut mean = vec![0.0; FEATURE_COUNT];
    for row in rows {
        for (m, x) in mean.iter_mut().zip(&row.features) {
            *m += x / n;
        }
    }
    let scale = (0..FEATURE_COUNT)
        .map(|j| {
            let var = rows
                .iter()
                .map(|r| (r.features[j] - mean[j]).powi(2))
                .sum::<f64>()
                / n;
            let std = var.sqrt();
            // Constant columns pass through centered
            if std > 1e-12 {
                std
            } else {
                1.0
            }
        })
        .collect();
    StandardScaler { mean, scale }
}

/// Solve `a x = b` by Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(Error::Training("singular system".to_string()));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

fn fit_ridge(rows: &[TrainingRow], scaler: &StandardScaler, alpha: f64) -> Result<LinearModel> {
    let y_mean = rows.iter().map(|r| r.credit_score).sum::<f64>() / rows.len() as f64;

    let mut xtx = vec![vec![0.0; FEATURE_COUNT]; FEATURE_COUNT];
    let mut xty = vec![0.0; FEATURE_COUNT];
    for row in rows {
        let x = scaler.transform(&row.features);
        let y = row.credit_score - y_mean;
        for i in 0..FEATURE_COUNT {
            xty[i] += x[i] * y;
            for j in 0..FEATURE_COUNT {
                xtx[i][j] += x[i] * x[j];
            }
        }
    }
    for (i, row) in xtx.iter_mut().enumerate() {
        row[i] += alpha;
    }

    Ok(LinearModel {
        intercept: y_mean,
        coefficients: solve(xtx, xty)?,
    })
}

fn evaluate(bundle: &ModelBundle, rows: &[TrainingRow]) -> Result<BTreeMap<String, f64>> {
    let n = rows.len() as f64;
    let mean = rows.iter().map(|r| r.credit_score).sum::<f64>() / n;

    let (mut sse, mut sae, mut sst) = (0.0, 0.0, 0.0);
    for row in rows {
        let err = bundle.predict(&row.features)? - row.credit_score;
        sse += err * err;
        sae += err.abs();
        sst += (row.credit_score - mean).powi(2);
    }

    Ok(BTreeMap::from([
        ("rmse".to_string(), (sse / n).sqrt()),
        ("mae".to_string(), sae / n),
        ("r2".to_string(), if sst > 0.0 { 1.0 - sse / sst } else { 0.0 }),
    ]))
}

/// Fit a bundle on `rows`, holding out the tail for metrics
pub fn train(rows: &[TrainingRow], config: &TrainingConfig) -> Result<ModelBundle> {
    if rows.len() < MIN_TRAINING_ROWS {
        return Err(Error::Training(format!(
            "need at least {} rows, got {}",
            MIN_TRAINING_ROWS,
            rows.len()
        )));
    }
    let holdout = ((rows.len() as f64 * config.holdout.clamp(0.0, 0.5)).round() as usize).max(1);
    let (fit_rows, test_rows) = rows.split_at(rows.len() - holdout);

    let scaler = fit_scaler(fit_rows);
    let model = fit_ridge(fit_rows, &scaler, config.ridge_alpha)?;

    let mut bundle = ModelBundle {
        format: BUNDLE_FORMAT.to_string(),
        version: config.version.clone(),
        model_type: "ridge_regression".to_string(),
        trained_at: Utc::now(),
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        scaler,
        model,
        metrics: BTreeMap::new(),
    };
    bundle.validate()?;

    let mut metrics = evaluate(&bundle, test_rows)?;
    metrics.insert("train_rows".to_string(), fit_rows.len() as f64);
    metrics.insert("test_rows".to_string(), test_rows.len() as f64);
    bundle.metrics = metrics;

    info!(
        rows = rows.len(),
        rmse = bundle.metrics.get("rmse").copied().unwrap_or_default(),
        "Trained credit score model {}",
        bundle.version
    );
    Ok(bundle)
}
