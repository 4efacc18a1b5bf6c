// src/error.rs

//! Error taxonomy for the ingestion pipeline.
//!
//! Whole-call failures (configuration, network exhaustion, robots.txt denial,
//! undecodable documents) surface as [`IngestError`]. Per-field problems such as
//! a bad duration or view count never reach this type; they degrade to `None`.

use std::fmt;

use thiserror::Error;

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// Required credential or identifier missing. Raised before any HTTP call.
    #[error("configuration error: {0}")]
    Config(String),

    /// GET failed on every attempt (transport error or non-2xx status).
    #[error("GET {url} failed after {attempts} attempt(s): {source}")]
    Network {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// robots.txt disallows the target path.
    #[error("robots.txt at {robots_url} disallows fetching {url}")]
    PermissionDenied { url: String, robots_url: String },

    /// A whole document (feed JSON, API page) could not be decoded.
    #[error("malformed {what}: {message}")]
    Malformed { what: String, message: String },

    /// Reading a response body after a successful status failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl IngestError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a malformed-document error.
    pub fn malformed(what: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Malformed {
            what: what.into(),
            message: message.to_string(),
        }
    }

    /// True for failures that went through the retry loop.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}
