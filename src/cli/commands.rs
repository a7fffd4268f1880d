//! CLI command implementations

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::ingest::Feed;
use crate::output;
use crate::pipeline::{NormalizationMode, Pipeline, PipelineOutput, SCORE_BANDS};
use crate::scoring::{FeatureName, NormalizationState};

/// Fit normalization on the feed and write features, state, scores and the run report
pub async fn run(config: &Config) -> Result<()> {
    info!("Scoring wallets from {}", config.input.path);

    let features_path = config.output.features_path();
    let scores_path = config.output.scores_path();
    let state_path = config.output.state_path();
    let report_path = config.output.report_path();
    for path in [&features_path, &scores_path, &state_path, &report_path] {
        output::ensure_writable(path, config.output.overwrite)?;
    }

    let feed = Feed::load(&config.input.path)
        .await
        .with_context(|| format!("Failed to load feed {}", config.input.path))?;

    let pipeline = Pipeline::from_config(&config.scoring);
    let mut result = pipeline.run(&feed.records, NormalizationMode::Fit)?;
    result.state = result.state.with_source_digest(feed.digest.clone());

    output::write_feature_table(&features_path, &result.features).await?;
    result.state.save(&state_path).await?;
    info!(path = %state_path.display(), "Wrote normalization state");
    output::write_score_table(&scores_path, &result.scores).await?;
    output::write_run_report(&report_path, &result.report).await?;

    print_summary(&result, config.output.top_n);
    Ok(())
}

/// Score the feed against a previously fitted normalization state
pub async fn rescore(config: &Config, state_path: &Path) -> Result<()> {
    info!(
        "Rescoring wallets from {} with state {}",
        config.input.path,
        state_path.display()
    );

    let features_path = config.output.features_path();
    let scores_path = config.output.scores_path();
    let report_path = config.output.report_path();
    for path in [&features_path, &scores_path, &report_path] {
        output::ensure_writable(path, config.output.overwrite)?;
    }

    let state = NormalizationState::load(state_path).await?;
    let feed = Feed::load(&config.input.path)
        .await
        .with_context(|| format!("Failed to load feed {}", config.input.path))?;

    if state.source_digest.as_deref() == Some(feed.digest.as_str()) {
        info!("Feed is identical to the one the state was fitted on");
    }

    let pipeline = Pipeline::from_config(&config.scoring);
    let result = pipeline.run(&feed.records, NormalizationMode::Reuse(state))?;

    output::write_feature_table(&features_path, &result.features).await?;
    output::write_score_table(&scores_path, &result.scores).await?;
    output::write_run_report(&report_path, &result.report).await?;

    print_summary(&result, config.output.top_n);
    Ok(())
}

/// Print a persisted normalization state
pub async fn inspect_state(path: &Path) -> Result<()> {
    let state = NormalizationState::load(path).await?;

    println!("\n=== NORMALIZATION STATE ===\n");
    println!("Version:    {}", state.version);
    println!("Fitted at:  {}", state.fitted_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Population: {} wallets", state.population);
    println!(
        "Source:     {}",
        state.source_digest.as_deref().unwrap_or("(unknown)")
    );
    println!();
    println!("{:<22} {:>16} {:>16}", "Feature", "Min", "Max");
    for name in FeatureName::ALL {
        let range = state.range(name);
        let marker = if range.is_degenerate() { "  (degenerate)" } else { "" };
        println!(
            "{:<22} {:>16.6} {:>16.6}{}",
            name.as_str(),
            range.min,
            range.max,
            marker
        );
    }

    Ok(())
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.summary());
    Ok(())
}

fn print_summary(result: &PipelineOutput, top_n: usize) {
    let report = &result.report;

    println!("\n=== WALLET SCORING SUMMARY ===\n");
    println!("Records read:     {}", report.ingest.records_read);
    println!("Transactions:     {}", report.ingest.accepted);
    println!("Skipped records:  {}", report.ingest.skipped_total());
    for (reason, count) in &report.ingest.skipped {
        println!("  {:<40} {}", reason.to_string(), count);
    }
    println!(
        "Normalization:    {}",
        if report.fitted { "fitted on this feed" } else { "reused" }
    );
    println!("Wallets scored:   {}", report.wallets_scored);

    if report.wallets_scored == 0 {
        warn!("Zero wallets scored");
        return;
    }

    let summary = &report.summary;
    println!(
        "Scores:           min {}, max {}, mean {:.1}",
        summary.min, summary.max, summary.mean
    );

    println!("\nDistribution:");
    let band_width = 1000 / SCORE_BANDS;
    for (i, count) in summary.bands.iter().enumerate() {
        let lo = i * band_width;
        let hi = if i == SCORE_BANDS - 1 { 1000 } else { lo + band_width - 1 };
        println!("  {:>4}-{:<4} {:>8}", lo, hi, count);
    }

    if top_n > 0 {
        println!("\nTop {} wallets:", top_n);
        for (rank, (wallet, score)) in result.top_wallets(top_n).iter().enumerate() {
            println!("  {:>3}. {:<44} {:>5}", rank + 1, wallet, score);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn feed_json() -> &'static str {
        r#"[
            {"userWallet": "a", "timestamp": 1629178166, "action": "deposit",
             "actionData": {"amount": "100", "assetPriceUSD": "1", "assetSymbol": "USDC"}},
            {"userWallet": "a", "timestamp": 1629178200, "action": "borrow",
             "actionData": {"amount": "50", "assetPriceUSD": "1", "assetSymbol": "USDC"}},
            {"userWallet": "b", "timestamp": 1629278166, "action": "repay",
             "actionData": {"amount": "10", "assetPriceUSD": "1", "assetSymbol": "DAI"}},
            {"action": "deposit", "timestamp": 1629178166}
        ]"#
    }

    fn config_for(dir: &Path) -> Config {
        let mut config = Config::default();
        config.input.path = dir.join("feed.json").display().to_string();
        config.output.dir = dir.join("out").display().to_string();
        config
    }

    #[tokio::test]
    async fn test_run_writes_all_outputs() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("feed.json"), feed_json()).unwrap();
        let config = config_for(dir.path());

        run(&config).await.unwrap();

        let scores = std::fs::read_to_string(config.output.scores_path()).unwrap();
        assert!(scores.starts_with("wallet,score\n"));
        assert_eq!(scores.lines().count(), 3);

        let features = std::fs::read_to_string(config.output.features_path()).unwrap();
        assert_eq!(features.lines().count(), 3);

        let state = NormalizationState::load(config.output.state_path()).await.unwrap();
        assert_eq!(state.population, 2);
        assert!(state.source_digest.is_some());

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(config.output.report_path()).unwrap())
                .unwrap();
        assert_eq!(report["wallets_scored"], 2);
        assert_eq!(report["fitted"], true);
        assert_eq!(report["ingest"]["records_read"], 4);
        assert_eq!(report["ingest"]["skipped"]["missing_wallet"], 1);
    }

    #[tokio::test]
    async fn test_rescore_reuses_state() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("feed.json"), feed_json()).unwrap();
        let config = config_for(dir.path());
        run(&config).await.unwrap();

        let before = std::fs::read_to_string(config.output.scores_path()).unwrap();
        let state_path = dir.path().join("state.json");
        std::fs::copy(config.output.state_path(), &state_path).unwrap();

        rescore(&config, &state_path).await.unwrap();
        let after = std::fs::read_to_string(config.output.scores_path()).unwrap();
        assert_eq!(before, after);

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(config.output.report_path()).unwrap())
                .unwrap();
        assert_eq!(report["fitted"], false);
    }

    #[tokio::test]
    async fn test_run_refuses_overwrite() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("feed.json"), feed_json()).unwrap();
        let mut config = config_for(dir.path());
        run(&config).await.unwrap();

        config.output.overwrite = false;
        assert!(run(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_run_empty_feed() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("feed.json"), "[]").unwrap();
        let config = config_for(dir.path());

        run(&config).await.unwrap();
        let scores = std::fs::read_to_string(config.output.scores_path()).unwrap();
        assert_eq!(scores, "wallet,score\n");
    }
}
