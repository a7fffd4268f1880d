//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::scoring::ScoreWeights;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Transaction feed (JSON array or newline-delimited JSON)
    #[serde(default = "default_input_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default = "default_features_file")]
    pub features_file: String,
    #[serde(default = "default_scores_file")]
    pub scores_file: String,
    #[serde(default = "default_state_file")]
    pub state_file: String,
    /// JSON run report (counters and score distribution)
    #[serde(default = "default_report_file")]
    pub report_file: String,
    /// Replace existing output files
    #[serde(default = "default_true")]
    pub overwrite: bool,
    /// Wallets listed in the run summary
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: ScoreWeights,
    /// Clamp scores that fall outside [0, 1000] instead of failing the run
    #[serde(default = "default_true")]
    pub clamp_scores: bool,
    /// Allowed deviation of the weight sum from 1.0
    #[serde(default = "default_weight_tolerance")]
    pub weight_tolerance: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: default_input_path(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            features_file: default_features_file(),
            scores_file: default_scores_file(),
            state_file: default_state_file(),
            report_file: default_report_file(),
            overwrite: true,
            top_n: default_top_n(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            clamp_scores: true,
            weight_tolerance: default_weight_tolerance(),
        }
    }
}

fn default_input_path() -> String {
    "user-wallet-transactions.json".to_string()
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_features_file() -> String {
    "wallet_features.csv".to_string()
}

fn default_scores_file() -> String {
    "wallet_scores.csv".to_string()
}

fn default_state_file() -> String {
    "normalization_state.json".to_string()
}

fn default_report_file() -> String {
    "run_report.json".to_string()
}

fn default_top_n() -> usize {
    10
}

fn default_weight_tolerance() -> f64 {
    1e-6
}

fn default_true() -> bool {
    true
}

impl OutputConfig {
    pub fn features_path(&self) -> PathBuf {
        Path::new(&self.dir).join(&self.features_file)
    }

    pub fn scores_path(&self) -> PathBuf {
        Path::new(&self.dir).join(&self.scores_file)
    }

    pub fn state_path(&self) -> PathBuf {
        Path::new(&self.dir).join(&self.state_file)
    }

    pub fn report_path(&self) -> PathBuf {
        Path::new(&self.dir).join(&self.report_file)
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("input.path", default_input_path())?
            .set_default("output.dir", default_output_dir())?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix WALLET_SCORE_)
            .add_source(
                config::Environment::with_prefix("WALLET_SCORE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.input.path.trim().is_empty() {
            anyhow::bail!("input.path must not be empty");
        }

        if self.scoring.weight_tolerance < 0.0 || !self.scoring.weight_tolerance.is_finite() {
            anyhow::bail!("scoring.weight_tolerance must be a non-negative number");
        }

        self.scoring
            .weights
            .validate(self.scoring.weight_tolerance)
            .context("Invalid scoring.weights")?;

        let files = [
            &self.output.features_file,
            &self.output.scores_file,
            &self.output.state_file,
            &self.output.report_file,
        ];
        for (i, a) in files.iter().enumerate() {
            if a.trim().is_empty() {
                anyhow::bail!("output file names must not be empty");
            }
            if files[i + 1..].contains(a) {
                anyhow::bail!("output file name {} is used twice", a);
            }
        }

        if !self.scoring.clamp_scores {
            tracing::warn!(
                "scoring.clamp_scores is off - a score outside [0, 1000] will fail the run"
            );
        }

        Ok(())
    }

    /// Get configuration for display
    pub fn summary(&self) -> String {
        let w = &self.scoring.weights;
        format!(
            r#"Configuration:
  Input:
    path: {}
  Output:
    dir: {}
    features: {}
    scores: {}
    state: {}
    report: {}
    overwrite: {}
    top_n: {}
  Scoring:
    clamp_scores: {}
    weights:
      repay_ratio: {}
      1 - redeem_deposit_ratio: {}
      1 - borrow_deposit_ratio: {}
      tx_per_day: {}
      num_transactions: {}
      active_days: {}
      num_unique_assets: {}
"#,
            self.input.path,
            self.output.dir,
            self.output.features_file,
            self.output.scores_file,
            self.output.state_file,
            self.output.report_file,
            self.output.overwrite,
            self.output.top_n,
            self.scoring.clamp_scores,
            w.repay_ratio,
            w.redeem_deposit_ratio,
            w.borrow_deposit_ratio,
            w.tx_per_day,
            w.num_transactions,
            w.active_days,
            w.num_unique_assets,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.input.path, "user-wallet-transactions.json");
        assert_eq!(config.output.scores_path(), Path::new("output").join("wallet_scores.csv"));
        assert_eq!(config.output.report_path(), Path::new("output").join("run_report.json"));
        assert!(config.scoring.clamp_scores);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallet-score.toml");
        std::fs::write(
            &path,
            r#"
[input]
path = "feed.ndjson"

[output]
dir = "out"
top_n = 3

[scoring.weights]
repay_ratio = 0.25
tx_per_day = 0.15
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.input.path, "feed.ndjson");
        assert_eq!(config.output.dir, "out");
        assert_eq!(config.output.top_n, 3);
        assert_eq!(config.output.features_file, "wallet_features.csv");
        assert_eq!(config.scoring.weights.repay_ratio, 0.25);
        assert_eq!(config.scoring.weights.num_transactions, 0.1);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.output.dir, "output");
    }

    #[test]
    fn test_rejects_bad_weights() {
        let mut config = Config::default();
        config.scoring.weights.repay_ratio = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_output_names() {
        let mut config = Config::default();
        config.output.state_file = config.output.scores_file.clone();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.report_file = config.output.state_file.clone();
        assert!(config.validate().is_err());
    }
}
