//! Error types for EnergyDash
//!
//! Ingestion failures are the only errors the core surfaces to callers.
//! Classification problems are absorbed by the classifier and never leave it.

use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors that fail a whole ingestion pass
#[derive(Error, Debug)]
pub enum IngestError {
    /// Underlying I/O failure while reading the export
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file could not be read as delimited text
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// None of the configured timestamp column names is present
    #[error("Missing timestamp column (expected one of: {expected})")]
    MissingTimestampColumn { expected: String },

    /// A timestamp cell could not be parsed with any configured format
    #[error("Invalid timestamp '{value}' on line {line}")]
    InvalidTimestamp { value: String, line: u64 },

    /// A row carries more cells than the header names
    #[error("Line {line} has {found} cells but the header names {expected}")]
    TooManyCells {
        line: u64,
        found: usize,
        expected: usize,
    },
}

/// Errors raised while talking to the external completion service
#[derive(Error, Debug)]
pub enum CompletionError {
    /// No endpoint or credential configured
    #[error("Completion service not configured")]
    NotConfigured,

    /// Network or client failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("Service returned status {status}")]
    Status { status: u16 },

    /// Response body did not contain a completion
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The call exceeded its time budget
    #[error("Timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Errors raised while loading settings
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Settings file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file is not valid JSON for [`crate::Settings`]
    #[error("Invalid settings: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_error_display_is_passed_through() {
        let mut reader = csv::ReaderBuilder::new().from_reader("a,b\n1,2,3\n".as_bytes());
        let csv_err = reader.records().next().unwrap().unwrap_err();
        let expected = csv_err.to_string();
        assert_eq!(IngestError::from(csv_err).to_string(), expected);
    }

    #[test]
    fn test_error_display() {
        let err = IngestError::MissingTimestampColumn {
            expected: "Tijdstip, timestamp".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Missing timestamp column (expected one of: Tijdstip, timestamp)"
        );

        let err = IngestError::InvalidTimestamp {
            value: "gisteren".to_string(),
            line: 4,
        };
        assert!(err.to_string().contains("line 4"));
    }

    #[test]
    fn test_completion_error_display() {
        let err = CompletionError::Status { status: 503 };
        assert_eq!(err.to_string(), "Service returned status 503");
        let err = CompletionError::Timeout { timeout_ms: 5000 };
        assert_eq!(err.to_string(), "Timed out after 5000ms");
    }
}
