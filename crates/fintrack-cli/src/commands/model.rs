//! Score model command implementations

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fintrack_core::predictor::training::{generate_synthetic, read_csv, train, write_csv, TrainingConfig};
use fintrack_core::predictor::{LoadOutcome, ModelCandidates, ModelSource, ModelTier};
use fintrack_core::{ModelBundle, ModelProvider};

/// Write a synthetic training dataset
pub fn cmd_model_data(output: &Path, rows: usize, seed: u64) -> Result<()> {
    let data = generate_synthetic(rows, seed);
    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    write_csv(BufWriter::new(file), &data)?;

    println!("📊 Wrote {} rows to {} (seed {})", data.len(), output.display(), seed);
    Ok(())
}

fn primary_model_path() -> Result<PathBuf> {
    ModelCandidates::from_env()
        .path(ModelTier::Primary)
        .map(Path::to_path_buf)
        .context("No primary model path configured")
}

/// Train a bundle from a CSV (or synthetic rows) and save it
pub fn cmd_model_train(
    data: Option<&Path>,
    output: Option<&Path>,
    rows: usize,
    seed: u64,
    alpha: f64,
    version: Option<String>,
) -> Result<ModelBundle> {
    let training_rows = match data {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            let rows = read_csv(file)?;
            println!("📊 Loaded {} rows from {}", rows.len(), path.display());
            rows
        }
        None => {
            println!("📊 Generating {} synthetic rows (seed {})", rows, seed);
            generate_synthetic(rows, seed)
        }
    };

    let mut config = TrainingConfig {
        ridge_alpha: alpha,
        ..TrainingConfig::default()
    };
    if let Some(version) = version {
        config.version = version;
    }

    println!("🧠 Training ridge model (alpha {})...", config.ridge_alpha);
    let bundle = train(&training_rows, &config)?;

    let path = match output {
        Some(path) => path.to_path_buf(),
        None => primary_model_path()?,
    };
    bundle
        .save(&path)
        .with_context(|| format!("Failed to save model to {}", path.display()))?;

    println!("✅ Saved model {} to {}", bundle.version, path.display());
    for (name, value) in &bundle.metrics {
        println!("   {:<6} {:.3}", name, value);
    }
    Ok(bundle)
}

/// Show which artifact is in use and why the others were skipped
pub fn cmd_model_info(provider: &ModelProvider) -> Result<()> {
    let resolved = provider.get_model();

    println!("🧠 Score model");
    println!();
    for attempt in &resolved.attempts {
        let outcome = match &attempt.outcome {
            LoadOutcome::Missing => "missing".to_string(),
            LoadOutcome::Failed(e) => format!("failed: {}", e),
            LoadOutcome::Loaded => "loaded".to_string(),
        };
        println!(
            "   {:<10} {} ({})",
            attempt.tier.as_str(),
            attempt.path.display(),
            outcome
        );
    }
    println!();

    match &resolved.source {
        ModelSource::Artifact { tier, path } => {
            println!("   In use: {} model at {}", tier.as_str(), path.display())
        }
        ModelSource::Fallback => println!("   In use: fallback heuristic (no loadable artifact)"),
    }

    let info = &resolved.info;
    println!("   Type:    {}", info.model_type);
    println!("   Version: {}", info.version);
    if let Some(at) = info.trained_at {
        println!("   Trained: {}", at.format("%Y-%m-%d %H:%M UTC"));
    }
    for (name, value) in &info.metrics {
        println!("   {:<8} {:.3}", name, value);
    }

    if !info.feature_importance.is_empty() {
        println!();
        println!("   Feature importance:");
        for item in info.feature_importance.iter().take(10) {
            println!("     {:<26} {:>6.1}%", item.feature, item.importance * 100.0);
        }
    }
    Ok(())
}
