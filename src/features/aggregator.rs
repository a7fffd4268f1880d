//! Wallet Aggregator - per-wallet feature extraction
//!
//! Groups transactions by wallet and reduces each group into a [`WalletFeatureVector`]:
//! - Action counts (deposit, redeem, borrow, repay, liquidation)
//! - USD totals for deposits, borrows and repayments
//! - Asset diversity and active days
//! - Derived ratios, zero when their denominator is empty

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::ingest::{ActionKind, Transaction};

/// Feature vector for one wallet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletFeatureVector {
    // Counts
    pub num_transactions: u64,
    pub num_deposits: u64,
    pub num_redeems: u64,
    pub num_borrows: u64,
    pub num_repays: u64,
    pub num_liquidations: u64,

    // USD totals
    pub total_deposited_usd: f64,
    pub total_borrowed_usd: f64,
    pub total_repaid_usd: f64,

    // Diversity / activity
    pub num_unique_assets: u64,
    pub active_days: u64,

    // Derived ratios
    pub repay_ratio: f64,
    pub borrow_deposit_ratio: f64,
    pub redeem_deposit_ratio: f64,
    pub tx_per_day: f64,
}

impl WalletFeatureVector {
    /// Fill in the derived ratios from the finalized counts and sums
    fn derive_ratios(&mut self) {
        self.repay_ratio = ratio(self.total_repaid_usd, self.total_borrowed_usd);
        self.borrow_deposit_ratio = ratio(self.total_borrowed_usd, self.total_deposited_usd);
        self.redeem_deposit_ratio = ratio(self.num_redeems as f64, self.num_deposits as f64);
        self.tx_per_day = ratio(self.num_transactions as f64, self.active_days as f64);
    }

    /// Replace any non-finite feature with zero
    fn sanitize(&mut self) {
        for value in [
            &mut self.total_deposited_usd,
            &mut self.total_borrowed_usd,
            &mut self.total_repaid_usd,
            &mut self.repay_ratio,
            &mut self.borrow_deposit_ratio,
            &mut self.redeem_deposit_ratio,
            &mut self.tx_per_day,
        ] {
            *value = finite_or_zero(*value);
        }
    }

    /// Check that every real-valued feature is finite
    pub fn is_finite(&self) -> bool {
        [
            self.total_deposited_usd,
            self.total_borrowed_usd,
            self.total_repaid_usd,
            self.repay_ratio,
            self.borrow_deposit_ratio,
            self.redeem_deposit_ratio,
            self.tx_per_day,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Running state for one wallet group
#[derive(Debug, Default)]
struct WalletAccumulator {
    counts: HashMap<ActionKind, u64>,
    deposited: Vec<f64>,
    borrowed: Vec<f64>,
    repaid: Vec<f64>,
    assets: BTreeSet<String>,
    days: BTreeSet<NaiveDate>,
    total: u64,
}

impl WalletAccumulator {
    fn push(&mut self, tx: &Transaction) {
        self.total += 1;
        *self.counts.entry(tx.action).or_insert(0) += 1;

        match tx.action {
            ActionKind::Deposit => self.deposited.push(tx.amount_usd()),
            ActionKind::Borrow => self.borrowed.push(tx.amount_usd()),
            ActionKind::Repay => self.repaid.push(tx.amount_usd()),
            _ => {}
        }

        if let Some(ref symbol) = tx.asset_symbol {
            self.assets.insert(symbol.clone());
        }
        self.days.insert(tx.date);
    }

    fn count(&self, action: ActionKind) -> u64 {
        self.counts.get(&action).copied().unwrap_or(0)
    }

    fn finish(self) -> WalletFeatureVector {
        let mut features = WalletFeatureVector {
            num_transactions: self.total,
            num_deposits: self.count(ActionKind::Deposit),
            num_redeems: self.count(ActionKind::RedeemUnderlying),
            num_borrows: self.count(ActionKind::Borrow),
            num_repays: self.count(ActionKind::Repay),
            num_liquidations: self.count(ActionKind::LiquidationCall),
            total_deposited_usd: canonical_sum(self.deposited),
            total_borrowed_usd: canonical_sum(self.borrowed),
            total_repaid_usd: canonical_sum(self.repaid),
            num_unique_assets: self.assets.len() as u64,
            active_days: self.days.len() as u64,
            ..Default::default()
        };

        features.derive_ratios();
        features.sanitize();
        features
    }
}

/// Groups transactions by wallet and reduces each group to a feature vector
#[derive(Debug, Default)]
pub struct WalletAggregator {
    groups: HashMap<String, WalletAccumulator>,
}

impl WalletAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one transaction to its wallet group
    pub fn push(&mut self, tx: &Transaction) {
        self.groups.entry(tx.wallet_id.clone()).or_default().push(tx);
    }

    /// Number of distinct wallets seen so far
    pub fn wallet_count(&self) -> usize {
        self.groups.len()
    }

    /// Finalize every group, keyed by wallet identifier
    pub fn finish(self) -> BTreeMap<String, WalletFeatureVector> {
        self.groups
            .into_iter()
            .map(|(wallet, acc)| {
                let features = acc.finish();
                debug!(
                    wallet = %wallet,
                    txs = features.num_transactions,
                    active_days = features.active_days,
                    repay_ratio = %format!("{:.3}", features.repay_ratio),
                    "Aggregated wallet"
                );
                (wallet, features)
            })
            .collect()
    }
}

/// Aggregate a full transaction set
pub fn aggregate<'a, I>(transactions: I) -> BTreeMap<String, WalletFeatureVector>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut aggregator = WalletAggregator::new();
    for tx in transactions {
        aggregator.push(tx);
    }
    debug!(wallets = aggregator.wallet_count(), "Grouped transactions");
    aggregator.finish()
}

/// `num / den`, or 0 when the denominator is not positive
fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        finite_or_zero(num / den)
    } else {
        0.0
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Sum in ascending order so the result does not depend on input order
fn canonical_sum(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    values.iter().sum()
}
