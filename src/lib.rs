//! Wallet Credit Score Library
//!
//! Deterministic reputation scores for lending-protocol wallets, computed from
//! historical deposit, borrow, repay, redeem and liquidation activity.

pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod scoring;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use features::WalletFeatureVector;
pub use pipeline::{NormalizationMode, Pipeline, PipelineOutput, PipelineReport};
pub use scoring::{NormalizationState, ScoreComputer, ScoreWeights};
