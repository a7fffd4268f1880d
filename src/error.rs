//! Error types for the scoring pipeline

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the scoring pipeline
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Invalid score weights: {0}")]
    InvalidWeights(String),

    // Input feed errors
    #[error("Input feed not found: {0}")]
    InputNotFound(String),

    #[error("Malformed input feed at line {line}: {reason}")]
    MalformedFeed { line: usize, reason: String },

    // Normalization state errors
    #[error("Normalization state invalid: {0}")]
    NormalizationState(String),

    #[error("Unsupported normalization state version {found} (expected {expected})")]
    UnsupportedStateVersion { found: u32, expected: u32 },

    // Score errors
    #[error("Score out of bounds for wallet {wallet}: {score}")]
    ScoreOutOfBounds { wallet: String, score: i64 },

    // Output errors
    #[error("Output file already exists: {0} (set output.overwrite = true)")]
    OutputExists(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Check if this error stems from the content of the data rather than the environment
    pub fn is_data_quality(&self) -> bool {
        matches!(
            self,
            Error::MalformedFeed { .. }
                | Error::NormalizationState(_)
                | Error::UnsupportedStateVersion { .. }
                | Error::ScoreOutOfBounds { .. }
        )
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        if self.is_data_quality() {
            2
        } else {
            1
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = Error::MalformedFeed {
            line: 3,
            reason: "expected value".to_string(),
        };
        assert!(err.is_data_quality());
        assert_eq!(err.exit_code(), 2);

        let err = Error::ScoreOutOfBounds {
            wallet: "0xabc".to_string(),
            score: 1200,
        };
        assert!(err.is_data_quality());

        let err = Error::Io("disk full".to_string());
        assert!(!err.is_data_quality());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("missing"));
    }
}
