//! Error types for the copymill pipeline.
//!
//! Two failure domains: [`ConfigError`] is fatal and aborts the run before
//! any row is processed, [`UpstreamError`] is contained at the row boundary
//! so the remaining rows keep going.

use thiserror::Error;

/// Fatal configuration and input-schema errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Environment variable {0} is not set")]
    MissingCredential(String),

    #[error("Input CSV is missing required column '{0}'")]
    MissingColumn(String),

    #[error("Input CSV contains no processable rows")]
    EmptyInput,

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from a single generation call.
///
/// Recorded in the failing row's `error` field; never propagated past the
/// row processor.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API error ({status}): {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed response body: {0}")]
    MalformedResponse(String),

    #[error("stage '{stage}' timed out after {seconds}s")]
    DeadlineElapsed { stage: String, seconds: u64 },
}
