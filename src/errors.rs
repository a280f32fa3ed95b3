/*!
 * Error types for the srtnotes application.
 *
 * This module contains custom error types for the different parts of the
 * pipeline, using the thiserror crate for ergonomic error definitions.
 *
 * Classification follows how each failure is handled at runtime:
 * - `SubtitleError::MalformedRecord` is skipped by the parser
 * - `ProviderError::RateLimitExceeded` is retried by the enrichment client
 * - `EnrichmentError::RemoteCallFailed` degrades a single segment
 * - `EnrichmentError::StageFailed` aborts one enrichment stage
 * - `EnrichmentError::Cancelled` ends the run as cancelled
 * - everything else fails the run
 */

use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting (HTTP 429)
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Whether the service asked us to slow down
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimitExceeded(_))
    }

    /// Whether retrying other items against the same service is pointless
    pub fn is_stage_fatal(&self) -> bool {
        matches!(self, Self::AuthenticationError(_))
    }

    /// Classify a non-success HTTP status into a provider error
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            429 => Self::RateLimitExceeded(message),
            401 | 403 => Self::AuthenticationError(message),
            _ => Self::ApiError { status_code, message },
        }
    }
}

/// Errors that can occur during subtitle processing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubtitleError {
    /// A cue block that cannot be turned into a cue; the parser skips it
    #[error("Malformed subtitle record at line {line}: {reason}")]
    MalformedRecord {
        /// 1-based line number of the offending line
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// A timestamp that does not have the `HH:MM:SS,mmm` shape
    #[error("Invalid timestamp format: {0}")]
    InvalidTimestamp(String),

    /// Segments must be closed at some positive length
    #[error("Target length must be greater than zero")]
    InvalidTargetLength,
}

/// Errors that can occur while enriching segments with titles or proofreading
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnrichmentError {
    /// Non-retryable remote failure, or a rate limit that outlived the retry budget
    #[error("Remote call failed: {0}")]
    RemoteCallFailed(#[from] ProviderError),

    /// The whole stage cannot run (for example, no API key)
    #[error("Stage failed: {0}")]
    StageFailed(String),

    /// The run was cancelled while the call was pending
    #[error("Operation cancelled")]
    Cancelled,
}

impl EnrichmentError {
    /// Whether the remaining items of the stage should skip the remote service
    pub fn is_stage_fatal(&self) -> bool {
        match self {
            Self::StageFailed(_) => true,
            Self::RemoteCallFailed(e) => e.is_stage_fatal(),
            Self::Cancelled => false,
        }
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from subtitle processing
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Error from enrichment
    #[error("Enrichment error: {0}")]
    Enrichment(#[from] EnrichmentError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(format!("{:#}", error))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
