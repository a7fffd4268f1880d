//! Transaction feed loading
//!
//! Reads the raw feed as either a JSON array or newline-delimited JSON and fingerprints
//! the bytes so a fitted normalization state can name the data it came from.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Raw records plus the digest of the bytes they were parsed from
#[derive(Debug, Clone)]
pub struct Feed {
    pub records: Vec<Value>,
    /// Hex-encoded SHA-256 of the feed bytes
    pub digest: String,
}

impl Feed {
    /// Load a feed from disk
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::InputNotFound(path.display().to_string()));
        }

        let bytes = tokio::fs::read(path).await?;
        let feed = Self::parse(&bytes)?;

        info!(
            path = %path.display(),
            records = feed.records.len(),
            digest = %&feed.digest[..12],
            "Loaded transaction feed"
        );

        Ok(feed)
    }

    /// Parse feed bytes. A leading `[` selects JSON array mode, anything else is read as
    /// one record per line.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let digest = format!("{:x}", Sha256::digest(bytes));

        let text = std::str::from_utf8(bytes).map_err(|e| Error::MalformedFeed {
            line: 0,
            reason: e.to_string(),
        })?;

        let records = if text.trim_start().starts_with('[') {
            serde_json::from_str::<Vec<Value>>(text).map_err(|e| Error::MalformedFeed {
                line: e.line(),
                reason: e.to_string(),
            })?
        } else {
            parse_lines(text)?
        };

        debug!(records = records.len(), "Parsed feed");

        Ok(Self { records, digest })
    }
}

fn parse_lines(text: &str) -> Result<Vec<Value>> {
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value = serde_json::from_str(line).map_err(|e| Error::MalformedFeed {
            line: idx + 1,
            reason: e.to_string(),
        })?;
        records.push(value);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_json_array() {
        let feed = Feed::parse(br#"  [{"userWallet": "a"}, {"userWallet": "b"}]"#).unwrap();
        assert_eq!(feed.records.len(), 2);
        assert_eq!(feed.digest.len(), 64);
    }

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let text = "{\"userWallet\": \"a\"}\n\n{\"userWallet\": \"b\"}\n";
        let feed = Feed::parse(text.as_bytes()).unwrap();
        assert_eq!(feed.records.len(), 2);
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let text = "{\"userWallet\": \"a\"}\n{not json}\n";
        match Feed::parse(text.as_bytes()) {
            Err(Error::MalformedFeed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed feed, got {:?}", other),
        }
    }

    #[test]
    fn test_digest_is_stable() {
        let a = Feed::parse(b"[]").unwrap();
        let b = Feed::parse(b"[]").unwrap();
        let c = Feed::parse(b"[ ]").unwrap();
        assert_eq!(a.digest, b.digest);
        assert_ne!(a.digest, c.digest);
        assert!(a.records.is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = Feed::load(dir.path().join("nope.json")).await;
        assert!(matches!(result, Err(Error::InputNotFound(_))));
    }

    #[tokio::test]
    async fn test_load_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(&path, r#"[{"userWallet": "a", "timestamp": 1}]"#).unwrap();

        let feed = Feed::load(&path).await.unwrap();
        assert_eq!(feed.records.len(), 1);
    }
}
