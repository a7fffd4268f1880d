//! Range Normalizer
//!
//! Fits a per-feature `[min, max]` over a wallet population and maps raw features into
//! `[0, 1]`. A fitted [`NormalizationState`] is an immutable value: it can be persisted and
//! later applied to a different population without re-fitting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::features::WalletFeatureVector;

/// Current persisted state format
pub const STATE_VERSION: u32 = 1;

/// Features that take part in scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureName {
    RepayRatio,
    BorrowDepositRatio,
    RedeemDepositRatio,
    TxPerDay,
    NumTransactions,
    NumUniqueAssets,
    ActiveDays,
}

impl FeatureName {
    pub const ALL: [FeatureName; 7] = [
        FeatureName::RepayRatio,
        FeatureName::BorrowDepositRatio,
        FeatureName::RedeemDepositRatio,
        FeatureName::TxPerDay,
        FeatureName::NumTransactions,
        FeatureName::NumUniqueAssets,
        FeatureName::ActiveDays,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RepayRatio => "repay_ratio",
            Self::BorrowDepositRatio => "borrow_deposit_ratio",
            Self::RedeemDepositRatio => "redeem_deposit_ratio",
            Self::TxPerDay => "tx_per_day",
            Self::NumTransactions => "num_transactions",
            Self::NumUniqueAssets => "num_unique_assets",
            Self::ActiveDays => "active_days",
        }
    }

    /// Raw value of this feature
    pub fn value_of(&self, features: &WalletFeatureVector) -> f64 {
        match self {
            Self::RepayRatio => features.repay_ratio,
            Self::BorrowDepositRatio => features.borrow_deposit_ratio,
            Self::RedeemDepositRatio => features.redeem_deposit_ratio,
            Self::TxPerDay => features.tx_per_day,
            Self::NumTransactions => features.num_transactions as f64,
            Self::NumUniqueAssets => features.num_unique_assets as f64,
            Self::ActiveDays => features.active_days as f64,
        }
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed bounds of one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    pub min: f64,
    pub max: f64,
}

impl FeatureRange {
    /// Map a raw value into `[0, 1]`. A degenerate range maps everything to 0.
    pub fn scale(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span.is_nan() || span <= 0.0 || !value.is_finite() {
            return 0.0;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }

    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }
}

/// Normalized feature values for one wallet, all in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NormalizedFeatures {
    pub repay_ratio: f64,
    pub borrow_deposit_ratio: f64,
    pub redeem_deposit_ratio: f64,
    pub tx_per_day: f64,
    pub num_transactions: f64,
    pub num_unique_assets: f64,
    pub active_days: f64,
}

impl NormalizedFeatures {
    pub fn get(&self, name: FeatureName) -> f64 {
        match name {
            FeatureName::RepayRatio => self.repay_ratio,
            FeatureName::BorrowDepositRatio => self.borrow_deposit_ratio,
            FeatureName::RedeemDepositRatio => self.redeem_deposit_ratio,
            FeatureName::TxPerDay => self.tx_per_day,
            FeatureName::NumTransactions => self.num_transactions,
            FeatureName::NumUniqueAssets => self.num_unique_assets,
            FeatureName::ActiveDays => self.active_days,
        }
    }

    fn set(&mut self, name: FeatureName, value: f64) {
        let slot = match name {
            FeatureName::RepayRatio => &mut self.repay_ratio,
            FeatureName::BorrowDepositRatio => &mut self.borrow_deposit_ratio,
            FeatureName::RedeemDepositRatio => &mut self.redeem_deposit_ratio,
            FeatureName::TxPerDay => &mut self.tx_per_day,
            FeatureName::NumTransactions => &mut self.num_transactions,
            FeatureName::NumUniqueAssets => &mut self.num_unique_assets,
            FeatureName::ActiveDays => &mut self.active_days,
        };
        *slot = value;
    }
}

/// Fitted per-feature bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationState {
    pub version: u32,
    pub fitted_at: DateTime<Utc>,
    /// Number of wallets the bounds were fitted on
    pub population: usize,
    /// Digest of the feed the population came from, if known
    #[serde(default)]
    pub source_digest: Option<String>,
    pub ranges: BTreeMap<FeatureName, FeatureRange>,
}

impl NormalizationState {
    /// Fit bounds over a wallet population. An empty population yields `[0, 0]` ranges.
    pub fn fit(population: &BTreeMap<String, WalletFeatureVector>) -> Self {
        let ranges = FeatureName::ALL
            .iter()
            .map(|name| {
                let mut values = population.values().map(|f| name.value_of(f));
                let range = match values.next() {
                    Some(first) => values.fold(FeatureRange { min: first, max: first }, |r, v| {
                        FeatureRange {
                            min: r.min.min(v),
                            max: r.max.max(v),
                        }
                    }),
                    None => FeatureRange { min: 0.0, max: 0.0 },
                };
                debug!(feature = %name, min = range.min, max = range.max, "Fitted range");
                (*name, range)
            })
            .collect();

        Self {
            version: STATE_VERSION,
            fitted_at: Utc::now(),
            population: population.len(),
            source_digest: None,
            ranges,
        }
    }

    /// Attach the digest of the feed this state was fitted on
    pub fn with_source_digest(mut self, digest: impl Into<String>) -> Self {
        self.source_digest = Some(digest.into());
        self
    }

    pub fn range(&self, name: FeatureName) -> FeatureRange {
        self.ranges
            .get(&name)
            .copied()
            .unwrap_or(FeatureRange { min: 0.0, max: 0.0 })
    }

    /// Normalize one wallet's features
    pub fn normalize(&self, features: &WalletFeatureVector) -> NormalizedFeatures {
        let mut normalized = NormalizedFeatures::default();
        for name in FeatureName::ALL {
            normalized.set(name, self.range(name).scale(name.value_of(features)));
        }
        normalized
    }

    /// Normalize a whole population into a parallel table
    pub fn apply(
        &self,
        population: &BTreeMap<String, WalletFeatureVector>,
    ) -> BTreeMap<String, NormalizedFeatures> {
        population
            .iter()
            .map(|(wallet, features)| (wallet.clone(), self.normalize(features)))
            .collect()
    }

    /// Check bounds are complete and well formed
    pub fn validate(&self) -> Result<()> {
        if self.version != STATE_VERSION {
            return Err(Error::UnsupportedStateVersion {
                found: self.version,
                expected: STATE_VERSION,
            });
        }

        for name in FeatureName::ALL {
            let range = self
                .ranges
                .get(&name)
                .ok_or_else(|| Error::NormalizationState(format!("missing feature {}", name)))?;

            if !range.min.is_finite() || !range.max.is_finite() {
                return Err(Error::NormalizationState(format!(
                    "non-finite bounds for {}",
                    name
                )));
            }
            if range.min > range.max {
                return Err(Error::NormalizationState(format!(
                    "min {} > max {} for {}",
                    range.min, range.max, name
                )));
            }
        }

        Ok(())
    }

    /// Load and validate a persisted state
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::NormalizationState(format!("{}: {}", path.display(), e)))?;

        let state: Self = serde_json::from_str(&data)
            .map_err(|e| Error::NormalizationState(format!("{}: {}", path.display(), e)))?;
        state.validate()?;

        info!(
            path = %path.display(),
            population = state.population,
            fitted_at = %state.fitted_at,
            "Loaded normalization state"
        );
        Ok(state)
    }

    /// Persist this state as JSON
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let data = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, data).await?;

        debug!(path = %path.display(), "Saved normalization state");
        Ok(())
    }
}
