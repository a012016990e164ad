use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Chunker error: {0}")]
    Chunker(#[from] compass_chunker::ChunkerError),

    #[error("Embedding error: {0}")]
    Embed(#[from] compass_embed::EmbedError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] compass_vector_store::VectorStoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    #[error("Index lock error: {0}")]
    Lock(String),

    #[error("Run failed: {0}")]
    RunFailed(String),
}
