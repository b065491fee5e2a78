//! Error types for the Lianzai pipeline.
//!
//! Uses `thiserror` for structured error definitions that provide
//! clear context about what went wrong.

use thiserror::Error;

/// Error type for translation provider calls.
///
/// The orchestrator classifies these into two families: transient errors
/// are retried with backoff on the same provider, content-policy rejections
/// trigger the fallback provider immediately and are never retried.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// HTTP request to the provider failed
    #[error("provider request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Provider returned a non-success status
    #[error("provider API error: {0}")]
    ApiError(String),

    /// Provider returned 429 or an explicit rate-limit signal
    #[error("provider rate limited: {0}")]
    RateLimited(String),

    /// Provider declined to produce output for this content
    #[error("content policy rejection: {0}")]
    ContentPolicy(String),

    /// Failed to parse the provider response
    #[error("failed to parse provider response: {0}")]
    ParseError(String),

    /// Provider returned an empty or unusable translation
    #[error("provider returned empty output")]
    EmptyResponse,
}

impl ProviderError {
    /// Whether this error is a deterministic content-policy rejection.
    ///
    /// Retrying these on the same provider wastes quota; the orchestrator
    /// falls through to the literal provider instead.
    pub fn is_content_policy(&self) -> bool {
        matches!(self, ProviderError::ContentPolicy(_))
    }

    /// Whether this error is worth retrying on the same provider.
    pub fn is_transient(&self) -> bool {
        !self.is_content_policy()
    }
}

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("failed to parse config: {0}")]
    ParseError(String),

    /// Missing required configuration value
    #[error("missing required config value: {0}")]
    MissingValue(String),

    /// Invalid configuration value
    #[error("invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory not found
    #[error("could not determine config directory")]
    NoConfigDir,
}

/// Error type for glossary persistence.
#[derive(Error, Debug)]
pub enum GlossaryError {
    /// Failed to read glossary file
    #[error("failed to read glossary: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse glossary JSON
    #[error("failed to parse glossary JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Failed to write glossary file
    #[error("failed to save glossary: {0}")]
    WriteError(String),
}

/// Error type for work state persistence.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to read the work state file
    #[error("failed to read work state: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse the work state JSON
    #[error("failed to parse work state JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Failed to write the work state file
    #[error("failed to save work state: {0}")]
    WriteError(String),

    /// Work state violates a structural invariant
    #[error("invalid work state: {0}")]
    InvalidState(String),
}

/// Error type for the raw chapter source boundary.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Failed to read a raw chapter artifact
    #[error("failed to read raw chapter: {0}")]
    ReadError(#[from] std::io::Error),

    /// Raw chapter is missing from the source
    #[error("raw chapter {number} not found for work '{work_id}'")]
    NotFound { work_id: String, number: u32 },
}

/// Error type for the content platform publisher.
#[derive(Error, Debug)]
pub enum PublishError {
    /// HTTP request to the platform failed
    #[error("publish request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Platform returned a non-success status
    #[error("platform API error: HTTP {status}: {body}")]
    ApiError { status: u16, body: String },

    /// Failed to parse the platform response
    #[error("failed to parse platform response: {0}")]
    ParseError(String),
}

/// Result type alias using anyhow for application-level error handling.
pub type Result<T> = anyhow::Result<T>;
