//! Wallet scoring
//!
//! This module turns raw feature vectors into integer scores:
//! - Range normalization fitted over the wallet population (or reused from disk)
//! - Weighted linear score over the normalized features

pub mod normalizer;
pub mod score;

pub use normalizer::{FeatureName, FeatureRange, NormalizationState, NormalizedFeatures};
pub use score::{ScoreComputer, ScoreWeights, MAX_SCORE};
