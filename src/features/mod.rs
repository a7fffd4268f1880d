//! Wallet feature extraction

pub mod aggregator;

pub use aggregator::{aggregate, WalletAggregator, WalletFeatureVector};
