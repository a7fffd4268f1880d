//! Transaction ingestion
//!
//! Loads the raw feed and turns each record into a typed [`Transaction`], counting
//! rejected records by reason instead of failing the run.

pub mod feed;
pub mod transaction;

pub use feed::Feed;
pub use transaction::{ActionKind, RecordError, Transaction};

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Outcome of normalizing a batch of raw records
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub records_read: usize,
    pub accepted: usize,
    pub skipped: BTreeMap<RecordError, usize>,
}

impl IngestReport {
    /// Total number of rejected records
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// Normalize every raw record, keeping the valid ones
pub fn normalize_records(records: &[Value]) -> (Vec<Transaction>, IngestReport) {
    let mut report = IngestReport {
        records_read: records.len(),
        ..Default::default()
    };
    let mut transactions = Vec::with_capacity(records.len());

    for (idx, record) in records.iter().enumerate() {
        match Transaction::from_record(record) {
            Ok(tx) => transactions.push(tx),
            Err(reason) => {
                debug!(index = idx, reason = %reason, "Skipping record");
                *report.skipped.entry(reason).or_insert(0) += 1;
            }
        }
    }
    report.accepted = transactions.len();

    if report.skipped_total() > 0 {
        warn!(
            skipped = report.skipped_total(),
            accepted = report.accepted,
            "Skipped malformed records"
        );
    }

    (transactions, report)
}
