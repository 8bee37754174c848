//! Error types for the worldping scraper
//!
//! This module defines the domain-specific error types used throughout the application.

use thiserror::Error;

/// Errors that can occur while fetching the world directory
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server error with status code
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Directory page could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors that can occur while parsing the directory page
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The server list table is missing from the page
    #[error("Server list table not found")]
    TableNotFound,

    /// A single row or record could not be mapped onto the catalog schema
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// The world id could not be extracted from the link identifier
    #[error("Failed to extract world id from '{0}'")]
    IdExtractionFailed(String),
}

/// Errors raised by a single latency probe
///
/// These never abort a batch; the prober turns them into sentinel measurements.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Transport-level failure (connection refused, DNS, TLS, ...)
    #[error("Probe request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// No response within the probe timeout
    #[error("Probe timed out")]
    Timeout,

    /// Target URL rejected before sending
    #[error("Invalid probe URL: {0}")]
    InvalidUrl(String),
}

impl ProbeError {
    /// Classify a reqwest failure, separating timeouts from other transport errors
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

/// Errors raised by the catalog/measurement storage
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O failure while preparing the database location
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transaction could not be committed
    #[error("Commit failed: {0}")]
    CommitFailed(String),

    /// Write rejected by the store
    #[error("Write rejected: {0}")]
    WriteRejected(String),

    /// A stored value could not be decoded
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::MalformedRecord("missing name".to_string());
        assert_eq!(err.to_string(), "Malformed record: missing name");
    }

    #[test]
    fn test_fetch_error_from_parse() {
        let err: FetchError = ParseError::TableNotFound.into();
        assert!(matches!(err, FetchError::Parse(ParseError::TableNotFound)));
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::CommitFailed("disk full".to_string());
        assert_eq!(err.to_string(), "Commit failed: disk full");
    }
}
