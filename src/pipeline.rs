//! Scoring pipeline
//!
//! Runs the stages strictly forward over an in-memory batch:
//! raw records -> transactions -> feature vectors -> normalized features -> scores.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::ScoringConfig;
use crate::error::Result;
use crate::features::{aggregate, WalletFeatureVector};
use crate::ingest::{normalize_records, IngestReport};
use crate::scoring::{NormalizationState, NormalizedFeatures, ScoreComputer, MAX_SCORE};

/// Number of equal-width score bands in the summary histogram
pub const SCORE_BANDS: usize = 10;

/// Where normalization bounds come from
#[derive(Debug, Clone)]
pub enum NormalizationMode {
    /// Fit bounds on the current population
    Fit,
    /// Reuse previously fitted bounds
    Reuse(NormalizationState),
}

/// Distribution of scores across the population
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub min: u32,
    pub max: u32,
    pub mean: f64,
    /// Wallet counts per 100-point band; 1000 falls in the last band
    pub bands: [usize; SCORE_BANDS],
}

impl ScoreSummary {
    pub fn from_scores<'a, I>(scores: I) -> Self
    where
        I: IntoIterator<Item = &'a u32>,
    {
        let mut summary = Self {
            min: u32::MAX,
            ..Default::default()
        };
        let mut count = 0usize;
        let mut total = 0u64;

        for &score in scores {
            summary.min = summary.min.min(score);
            summary.max = summary.max.max(score);
            let band = (score as usize * SCORE_BANDS / MAX_SCORE as usize).min(SCORE_BANDS - 1);
            summary.bands[band] += 1;
            total += score as u64;
            count += 1;
        }

        if count == 0 {
            return Self::default();
        }
        summary.mean = total as f64 / count as f64;
        summary
    }
}

/// Counters describing one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub ingest: IngestReport,
    pub wallets_scored: usize,
    /// Whether the normalization bounds were fitted in this run
    pub fitted: bool,
    pub summary: ScoreSummary,
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub features: BTreeMap<String, WalletFeatureVector>,
    pub normalized: BTreeMap<String, NormalizedFeatures>,
    pub state: NormalizationState,
    pub scores: BTreeMap<String, u32>,
    pub report: PipelineReport,
}

impl PipelineOutput {
    /// Highest-scoring wallets, ties broken by wallet id
    pub fn top_wallets(&self, n: usize) -> Vec<(&str, u32)> {
        let mut ranked: Vec<(&str, u32)> = self
            .scores
            .iter()
            .map(|(wallet, score)| (wallet.as_str(), *score))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(n);
        ranked
    }
}

/// Batch scoring pipeline
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    computer: ScoreComputer,
}

impl Pipeline {
    pub fn new(computer: ScoreComputer) -> Self {
        Self { computer }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(ScoreComputer::new(config.weights.clone(), config.clamp_scores))
    }

    /// Run every stage over a batch of raw records
    pub fn run(&self, records: &[Value], mode: NormalizationMode) -> Result<PipelineOutput> {
        let (transactions, ingest) = normalize_records(records);
        info!(
            read = ingest.records_read,
            accepted = ingest.accepted,
            skipped = ingest.skipped_total(),
            "Normalized transactions"
        );

        let features = aggregate(&transactions);
        info!(wallets = features.len(), "Aggregated wallet features");

        let (state, fitted) = match mode {
            NormalizationMode::Fit => (NormalizationState::fit(&features), true),
            NormalizationMode::Reuse(state) => (state, false),
        };
        let normalized = state.apply(&features);

        let mut scores = BTreeMap::new();
        for (wallet, n) in &normalized {
            let score = self.computer.score(wallet, n)?;
            debug!(wallet = %wallet, score, "Scored wallet");
            scores.insert(wallet.clone(), score);
        }

        if scores.is_empty() {
            warn!("No valid transactions - zero wallets scored");
        }

        let report = PipelineReport {
            ingest,
            wallets_scored: scores.len(),
            fitted,
            summary: ScoreSummary::from_scores(scores.values()),
        };

        info!(
            wallets = report.wallets_scored,
            min = report.summary.min,
            max = report.summary.max,
            mean = %format!("{:.1}", report.summary.mean),
            "Scoring complete"
        );

        Ok(PipelineOutput {
            features,
            normalized,
            state,
            scores,
            report,
        })
    }
}
