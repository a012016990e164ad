use compass_protocol::{ErrorEnvelope, ErrorKind};
use compass_search::SearchError;
use thiserror::Error;

/// Tool-level error, carrying the taxonomy kind reported to clients.
///
/// Messages stay safe for the wire: relative paths only, no internals.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Security(String),

    #[error("{0}")]
    Upstream(String),

    /// Non-strict multi-collection query where a collection failed and the
    /// surviving collections produced nothing.
    #[error("{0}")]
    Partial(String),

    #[error("{0}")]
    Internal(String),
}

impl ToolError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Security(_) => ErrorKind::Security,
            Self::Upstream(_) => ErrorKind::UpstreamUnavailable,
            Self::Partial(_) => ErrorKind::PartialFailure,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    #[must_use]
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.kind(), self.to_string())
    }
}

impl From<SearchError> for ToolError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::InvalidQuery(msg) => Self::Validation(msg),
            SearchError::CollectionUnavailable { name, message } => {
                Self::Upstream(format!("collection {name} unavailable: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_taxonomy() {
        assert_eq!(
            ToolError::Security("p".into()).kind(),
            ErrorKind::Security
        );
        assert_eq!(
            ToolError::Partial("p".into()).kind(),
            ErrorKind::PartialFailure
        );
    }

    #[test]
    fn search_errors_convert() {
        let err: ToolError = SearchError::InvalidQuery("empty".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: ToolError = SearchError::CollectionUnavailable {
            name: "repo__docs".to_string(),
            message: "timeout".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    }
}
