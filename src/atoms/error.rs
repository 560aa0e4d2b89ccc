// ── Kaiwa Atoms: Error Types ───────────────────────────────────────────────
// Single canonical error enum for the client, built with `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by domain (network, API, stream, input).
//   • The `#[from]` attribute wires external error conversions automatically.
//   • Malformed stream records are NOT errors — they are logged and dropped
//     at the decode layer, so no variant exists for them.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ClientError {
    /// Terminal or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP / network failure (reqwest layer).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend answered with a non-success status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The response stream failed mid-read.
    #[error("Stream error: {0}")]
    Stream(String),

    /// User input rejected before any network call (empty message, no app
    /// selected, send already in flight).
    #[error("{0}")]
    Validation(String),

    /// Startup configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catch-all. Prefer adding a specific variant over using this.
    #[error("{0}")]
    Other(String),
}

impl ClientError {
    /// Create an API error from a status and message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api { status, message: message.into() }
    }

    /// True for the input-validation family — surfaced as a notice, not an
    /// error banner.
    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}

impl From<String> for ClientError {
    fn from(s: String) -> Self {
        ClientError::Other(s)
    }
}

impl From<&str> for ClientError {
    fn from(s: &str) -> Self {
        ClientError::Other(s.to_string())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All client operations return this type.
pub type ClientResult<T> = Result<T, ClientError>;
