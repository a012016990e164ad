use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Raised when strict mode (or a single-collection query) cannot
    /// tolerate a failed collection.
    #[error("Collection {name} unavailable: {message}")]
    CollectionUnavailable { name: String, message: String },
}
