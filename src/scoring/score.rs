//! Score Computer
//!
//! Weighted combination of normalized features, scaled to an integer in `[0, 1000]`:
//! - Repay ratio (30%)
//! - Inverted redeem/deposit ratio (20%)
//! - Inverted borrow/deposit ratio (20%)
//! - Transactions per day (10%), transaction count (10%)
//! - Active days (5%), unique assets (5%)

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::scoring::normalizer::NormalizedFeatures;

/// Upper bound of the score scale
pub const MAX_SCORE: u32 = 1000;

/// Component weights (must sum to 1.0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_weight_repay_ratio")]
    pub repay_ratio: f64,
    /// Applied to `1 - redeem_deposit_ratio`
    #[serde(default = "default_weight_redeem_deposit")]
    pub redeem_deposit_ratio: f64,
    /// Applied to `1 - borrow_deposit_ratio`
    #[serde(default = "default_weight_borrow_deposit")]
    pub borrow_deposit_ratio: f64,
    #[serde(default = "default_weight_tx_per_day")]
    pub tx_per_day: f64,
    #[serde(default = "default_weight_num_transactions")]
    pub num_transactions: f64,
    #[serde(default = "default_weight_active_days")]
    pub active_days: f64,
    #[serde(default = "default_weight_unique_assets")]
    pub num_unique_assets: f64,
}

fn default_weight_repay_ratio() -> f64 { 0.3 }
fn default_weight_redeem_deposit() -> f64 { 0.2 }
fn default_weight_borrow_deposit() -> f64 { 0.2 }
fn default_weight_tx_per_day() -> f64 { 0.1 }
fn default_weight_num_transactions() -> f64 { 0.1 }
fn default_weight_active_days() -> f64 { 0.05 }
fn default_weight_unique_assets() -> f64 { 0.05 }

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            repay_ratio: default_weight_repay_ratio(),
            redeem_deposit_ratio: default_weight_redeem_deposit(),
            borrow_deposit_ratio: default_weight_borrow_deposit(),
            tx_per_day: default_weight_tx_per_day(),
            num_transactions: default_weight_num_transactions(),
            active_days: default_weight_active_days(),
            num_unique_assets: default_weight_unique_assets(),
        }
    }
}

impl ScoreWeights {
    fn as_array(&self) -> [(&'static str, f64); 7] {
        [
            ("repay_ratio", self.repay_ratio),
            ("redeem_deposit_ratio", self.redeem_deposit_ratio),
            ("borrow_deposit_ratio", self.borrow_deposit_ratio),
            ("tx_per_day", self.tx_per_day),
            ("num_transactions", self.num_transactions),
            ("active_days", self.active_days),
            ("num_unique_assets", self.num_unique_assets),
        ]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().map(|(_, w)| w).sum()
    }

    /// Weights must be finite, non-negative and sum to 1.0 within `tolerance`
    pub fn validate(&self, tolerance: f64) -> Result<()> {
        for (name, weight) in self.as_array() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidWeights(format!(
                    "{} must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > tolerance {
            return Err(Error::InvalidWeights(format!(
                "weights sum to {:.6}, expected 1.0",
                sum
            )));
        }
        Ok(())
    }
}

/// Computes integer scores from normalized features
#[derive(Debug, Clone)]
pub struct ScoreComputer {
    weights: ScoreWeights,
    clamp: bool,
}

impl Default for ScoreComputer {
    fn default() -> Self {
        Self::new(ScoreWeights::default(), true)
    }
}

impl ScoreComputer {
    pub fn new(weights: ScoreWeights, clamp: bool) -> Self {
        Self { weights, clamp }
    }

    /// Weighted sum before scaling, nominally in `[0, 1]`
    pub fn raw(&self, n: &NormalizedFeatures) -> f64 {
        let w = &self.weights;
        w.repay_ratio * n.repay_ratio
            + w.redeem_deposit_ratio * (1.0 - n.redeem_deposit_ratio)
            + w.borrow_deposit_ratio * (1.0 - n.borrow_deposit_ratio)
            + w.tx_per_day * n.tx_per_day
            + w.num_transactions * n.num_transactions
            + w.active_days * n.active_days
            + w.num_unique_assets * n.num_unique_assets
    }

    /// Score one wallet. Halves round to the nearest even integer. Out-of-range
    /// results are clamped when clamping is on, otherwise reported as an error.
    pub fn score(&self, wallet: &str, normalized: &NormalizedFeatures) -> Result<u32> {
        let raw = self.raw(normalized);
        let scaled = if raw.is_finite() {
            (raw * MAX_SCORE as f64).round_ties_even() as i64
        } else {
            0
        };

        if (0..=MAX_SCORE as i64).contains(&scaled) {
            return Ok(scaled as u32);
        }

        if !self.clamp {
            return Err(Error::ScoreOutOfBounds {
                wallet: wallet.to_string(),
                score: scaled,
            });
        }

        warn!(wallet = %wallet, score = scaled, "Score outside [0, {}], clamping", MAX_SCORE);
        Ok(scaled.clamp(0, MAX_SCORE as i64) as u32)
    }
}
