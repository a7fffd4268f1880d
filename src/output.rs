//! Flat-file outputs
//!
//! Writes the wallet feature table and the wallet score table as CSV, one row per wallet
//! in wallet order, and the run report as JSON.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};
use crate::features::WalletFeatureVector;
use crate::pipeline::PipelineReport;

const FEATURE_COLUMNS: [&str; 16] = [
    "wallet",
    "num_transactions",
    "num_deposits",
    "num_redeems",
    "num_borrows",
    "num_repays",
    "num_liquidations",
    "total_deposited_usd",
    "total_borrowed_usd",
    "total_repaid_usd",
    "num_unique_assets",
    "active_days",
    "repay_ratio",
    "borrow_deposit_ratio",
    "redeem_deposit_ratio",
    "tx_per_day",
];

/// Render the feature table
pub fn render_feature_table(features: &BTreeMap<String, WalletFeatureVector>) -> String {
    let mut out = FEATURE_COLUMNS.join(",");
    out.push('\n');

    for (wallet, f) in features {
        // Writing into a String cannot fail
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            csv_field(wallet),
            f.num_transactions,
            f.num_deposits,
            f.num_redeems,
            f.num_borrows,
            f.num_repays,
            f.num_liquidations,
            f.total_deposited_usd,
            f.total_borrowed_usd,
            f.total_repaid_usd,
            f.num_unique_assets,
            f.active_days,
            f.repay_ratio,
            f.borrow_deposit_ratio,
            f.redeem_deposit_ratio,
            f.tx_per_day,
        );
    }
    out
}

/// Render the score table
pub fn render_score_table(scores: &BTreeMap<String, u32>) -> String {
    let mut out = String::from("wallet,score\n");
    for (wallet, score) in scores {
        let _ = writeln!(out, "{},{}", csv_field(wallet), score);
    }
    out
}

/// Fail if `path` exists and overwriting is off
pub fn ensure_writable(path: &Path, overwrite: bool) -> Result<()> {
    if !overwrite && path.exists() {
        return Err(Error::OutputExists(path.display().to_string()));
    }
    Ok(())
}

/// Write the feature table to `path`
pub async fn write_feature_table(
    path: &Path,
    features: &BTreeMap<String, WalletFeatureVector>,
) -> Result<()> {
    write_file(path, render_feature_table(features)).await?;
    info!(path = %path.display(), rows = features.len(), "Wrote wallet features");
    Ok(())
}

/// Write the score table to `path`
pub async fn write_score_table(path: &Path, scores: &BTreeMap<String, u32>) -> Result<()> {
    write_file(path, render_score_table(scores)).await?;
    info!(path = %path.display(), rows = scores.len(), "Wrote wallet scores");
    Ok(())
}

/// Write the run report to `path` as pretty JSON
pub async fn write_run_report(path: &Path, report: &PipelineReport) -> Result<()> {
    let data = serde_json::to_string_pretty(report)?;
    write_file(path, data).await?;
    info!(path = %path.display(), "Wrote run report");
    Ok(())
}

async fn write_file(path: &Path, contents: String) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}

/// Quote a field that contains a separator, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
