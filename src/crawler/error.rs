//! Error type for the request layer.

use crate::runner::{ConfigError, ExecutionError};
use std::path::PathBuf;
use thiserror::Error;

/// Failure of one request, one response decode, or crawler setup.
#[derive(Debug, Error)]
pub enum CrawlerError {
    // Transport
    #[error("Network error: could not reach {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Authorization failed at {url}: the cookie is missing or expired. Pass a headers file with a valid Cookie via --headers.")]
    Unauthorized { url: String },

    // Decoding
    #[error("Could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Response from {url} is missing `{field}`")]
    MissingField { url: String, field: String },

    // Setup
    #[error("Cannot read headers file {path}: {source}")]
    HeadersFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Headers file {path} is not a JSON object of strings: {reason}")]
    InvalidHeaders { path: PathBuf, reason: String },

    #[error("Failed to create HTTP client: {source}")]
    Client { source: reqwest::Error },

    #[error("Invalid batch settings: {0}")]
    Config(#[from] ConfigError),
}

impl From<CrawlerError> for ExecutionError {
    fn from(e: CrawlerError) -> Self {
        ExecutionError::from_error(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crawler_error_becomes_execution_error_with_same_message() {
        let e = CrawlerError::HttpStatus {
            status: 503,
            url: "https://manga.bilibili.com/x".into(),
        };
        let msg = e.to_string();
        let exec: ExecutionError = e.into();
        assert_eq!(exec.to_string(), msg);
    }

    #[test]
    fn unauthorized_mentions_headers_flag() {
        let e = CrawlerError::Unauthorized { url: "u".into() };
        assert!(e.to_string().contains("--headers"));
    }
}
