use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbedError>;

/// Errors from the embedding gateway.
///
/// Provider failures are kept distinct from empty-result conditions so
/// callers can tell "the provider is down" from "the provider returned
/// nothing for this input".
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("Embedding provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Embedding provider returned no vectors for a non-empty request")]
    EmptyResponse,

    #[error("Embedding response count mismatch: sent {sent}, received {received}")]
    CountMismatch { sent: usize, received: usize },

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding request failed after {0} attempt(s)")]
    Exhausted(u32),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmbedError {
    /// Transient failures are worth retrying; the rest are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { status, .. } => *status == 429 || *status >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}
