//! Typed transaction records
//!
//! Converts one loosely structured feed record into a [`Transaction`]. The nested
//! `actionData` payload is merged over the top-level fields, so on a key collision the
//! nested value wins.

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Key of the nested action payload in a raw record
pub const ACTION_DATA_KEY: &str = "actionData";

/// Wallet identifier keys, in lookup order
const WALLET_KEYS: [&str; 2] = ["userWallet", "walletId"];

/// Lending protocol action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    Deposit,
    RedeemUnderlying,
    Borrow,
    Repay,
    LiquidationCall,
    /// Anything unrecognized; counted in totals only
    Other,
}

impl ActionKind {
    /// Parse an action tag (case-insensitive exact match, no trimming)
    pub fn parse(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "deposit" => Self::Deposit,
            "redeemunderlying" => Self::RedeemUnderlying,
            "borrow" => Self::Borrow,
            "repay" => Self::Repay,
            "liquidationcall" => Self::LiquidationCall,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::RedeemUnderlying => "redeemunderlying",
            Self::Borrow => "borrow",
            Self::Repay => "repay",
            Self::LiquidationCall => "liquidationcall",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason a raw record was rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has no wallet identifier")]
    MissingWallet,

    #[error("record has no timestamp")]
    MissingTimestamp,

    #[error("record timestamp is not a usable epoch value")]
    InvalidTimestamp,
}

/// One historical wallet action
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub wallet_id: String,
    pub action: ActionKind,
    /// Token amount, `None` when the feed value was not numeric
    pub amount: Option<f64>,
    /// USD price per token unit, `None` when the feed value was not numeric
    pub asset_price_usd: Option<f64>,
    pub asset_symbol: Option<String>,
    /// Seconds since epoch
    pub timestamp: i64,
    /// UTC calendar day of `timestamp`
    pub date: NaiveDate,
}

impl Transaction {
    /// Build a transaction from a raw feed record
    pub fn from_record(record: &Value) -> Result<Self, RecordError> {
        let fields = flatten_record(record)?;

        let wallet_id = WALLET_KEYS
            .iter()
            .filter_map(|key| fields.get(*key))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|id| !id.is_empty())
            .ok_or(RecordError::MissingWallet)?
            .to_string();

        let timestamp = match fields.get("timestamp") {
            None | Some(Value::Null) => return Err(RecordError::MissingTimestamp),
            Some(value) => coerce_timestamp(value).ok_or(RecordError::InvalidTimestamp)?,
        };
        let date = DateTime::from_timestamp(timestamp, 0)
            .ok_or(RecordError::InvalidTimestamp)?
            .date_naive();

        let action = fields
            .get("action")
            .and_then(Value::as_str)
            .map(ActionKind::parse)
            .unwrap_or(ActionKind::Other);

        let asset_symbol = fields
            .get("assetSymbol")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            wallet_id,
            action,
            amount: fields.get("amount").and_then(coerce_amount),
            asset_price_usd: fields.get("assetPriceUSD").and_then(coerce_amount),
            asset_symbol,
            timestamp,
            date,
        })
    }

    /// USD value of this action; unknown inputs count as zero
    pub fn amount_usd(&self) -> f64 {
        let usd = self.amount.unwrap_or(0.0) * self.asset_price_usd.unwrap_or(0.0);
        if usd.is_finite() {
            usd
        } else {
            0.0
        }
    }
}

/// Merge the nested action payload over the record's top-level fields
fn flatten_record(record: &Value) -> Result<Map<String, Value>, RecordError> {
    let top = record.as_object().ok_or(RecordError::NotAnObject)?;

    let mut fields: Map<String, Value> = top
        .iter()
        .filter(|(key, _)| key.as_str() != ACTION_DATA_KEY)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if let Some(Value::Object(nested)) = top.get(ACTION_DATA_KEY) {
        for (key, value) in nested {
            fields.insert(key.clone(), value.clone());
        }
    }

    Ok(fields)
}

/// Parse a JSON number or numeric string
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Non-negative finite amount, or unknown
fn coerce_amount(value: &Value) -> Option<f64> {
    coerce_number(value).filter(|v| v.is_finite() && *v >= 0.0)
}

/// Whole epoch seconds; fractional values are truncated
fn coerce_timestamp(value: &Value) -> Option<i64> {
    if let Some(secs) = value.as_i64() {
        return Some(secs);
    }
    if let Value::String(s) = value {
        if let Ok(secs) = s.trim().parse::<i64>() {
            return Some(secs);
        }
    }
    coerce_number(value)
        .filter(|v| v.is_finite() && v.abs() < i64::MAX as f64)
        .map(|v| v.trunc() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(action: &str, amount: Value, price: Value) -> Value {
        json!({
            "userWallet": "0x00000000001accfa9cef68cf5371a23025b6d4b6",
            "network": "polygon",
            "protocol": "aave_v2",
            "txHash": "0x695c69acf608fbf5d38e48ca5535e118cc213a89e3d6d2e66e6b0e3b2e8d4190",
            "timestamp": 1629178166,
            "action": action,
            "actionData": {
                "type": "Deposit",
                "amount": amount,
                "assetSymbol": "USDC",
                "assetPriceUSD": price,
                "poolId": "0x2791bca1f2de4661ed88a30c99a7a9449aa84174"
            }
        })
    }

    #[test]
    fn test_parse_deposit_record() {
        let tx = Transaction::from_record(&record("deposit", json!("2000000000"), json!("0.99"))).unwrap();

        assert_eq!(tx.wallet_id, "0x00000000001accfa9cef68cf5371a23025b6d4b6");
        assert_eq!(tx.action, ActionKind::Deposit);
        assert_eq!(tx.asset_symbol.as_deref(), Some("USDC"));
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2021, 8, 17).unwrap());
        assert!((tx.amount_usd() - 1_980_000_000.0).abs() < 1e-3);
    }

    #[test]
    fn test_action_parse_case_insensitive() {
        assert_eq!(ActionKind::parse("Deposit"), ActionKind::Deposit);
        assert_eq!(ActionKind::parse("REDEEMUNDERLYING"), ActionKind::RedeemUnderlying);
        assert_eq!(ActionKind::parse("liquidationCall"), ActionKind::LiquidationCall);
        assert_eq!(ActionKind::parse("flashloan"), ActionKind::Other);
        assert_eq!(ActionKind::parse("deposits"), ActionKind::Other);
        assert_eq!(ActionKind::parse(" deposit"), ActionKind::Other);
        assert_eq!(ActionKind::parse("repay\n"), ActionKind::Other);
    }

    #[test]
    fn test_non_numeric_amount_is_unknown() {
        let tx = Transaction::from_record(&record("repay", json!("n/a"), json!(1.0))).unwrap();
        assert_eq!(tx.amount, None);
        assert_eq!(tx.amount_usd(), 0.0);

        let tx = Transaction::from_record(&record("repay", json!(10), json!({"x": 1}))).unwrap();
        assert_eq!(tx.asset_price_usd, None);
        assert_eq!(tx.amount_usd(), 0.0);

        let tx = Transaction::from_record(&record("repay", json!("-5"), json!(1.0))).unwrap();
        assert_eq!(tx.amount, None);
    }

    #[test]
    fn test_nested_payload_wins_collision() {
        let raw = json!({
            "userWallet": "w1",
            "timestamp": 0,
            "action": "deposit",
            "assetSymbol": "TOP",
            "actionData": { "assetSymbol": "NESTED", "amount": "1", "assetPriceUSD": "2" }
        });
        let tx = Transaction::from_record(&raw).unwrap();
        assert_eq!(tx.asset_symbol.as_deref(), Some("NESTED"));
        assert_eq!(tx.amount_usd(), 2.0);
    }

    #[test]
    fn test_missing_wallet_or_timestamp() {
        let raw = json!({ "timestamp": 1, "action": "deposit" });
        assert_eq!(Transaction::from_record(&raw), Err(RecordError::MissingWallet));

        let raw = json!({ "userWallet": "   ", "timestamp": 1 });
        assert_eq!(Transaction::from_record(&raw), Err(RecordError::MissingWallet));

        let raw = json!({ "userWallet": "w1", "action": "deposit" });
        assert_eq!(Transaction::from_record(&raw), Err(RecordError::MissingTimestamp));

        let raw = json!({ "userWallet": "w1", "timestamp": "yesterday" });
        assert_eq!(Transaction::from_record(&raw), Err(RecordError::InvalidTimestamp));

        assert_eq!(Transaction::from_record(&json!([1, 2])), Err(RecordError::NotAnObject));
    }

    #[test]
    fn test_wallet_id_alias_and_timestamp_forms() {
        let raw = json!({ "walletId": "w2", "timestamp": "1629178166", "action": "borrow" });
        let tx = Transaction::from_record(&raw).unwrap();
        assert_eq!(tx.wallet_id, "w2");
        assert_eq!(tx.timestamp, 1629178166);
        assert_eq!(tx.amount, None);
        assert_eq!(tx.asset_symbol, None);

        let raw = json!({ "walletId": "w2", "timestamp": 1629178166.9 });
        let tx = Transaction::from_record(&raw).unwrap();
        assert_eq!(tx.timestamp, 1629178166);
        assert_eq!(tx.action, ActionKind::Other);
    }
}
