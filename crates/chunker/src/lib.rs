//! # Compass Chunker
//!
//! Splits file content into overlapping, bounded-size chunks with stable
//! boundaries for embedding.
//!
//! ## Pipeline
//!
//! ```text
//! File bytes
//!     │
//!     ├──> Binary / encoding guard ──> Skipped(reason)
//!     │
//!     ├──> Syntax splitter (tree-sitter, supported languages)
//!     │      └─> Item-aligned chunks + symbol names
//!     │
//!     └──> Window splitter (fallback)
//!            └─> Token-budget windows with bounded overlap
//! ```
//!
//! Chunks cover the file in source order without gaps; overlap between
//! consecutive chunks never exceeds the configured budget.

mod chunker;
mod config;
mod error;
mod language;
mod markdown;
mod syntax;
mod types;
mod window;

pub use chunker::Chunker;
pub use config::ChunkerConfig;
pub use error::{ChunkerError, Result};
pub use language::Language;
pub use types::{estimate_tokens, Chunk, ChunkKind, ChunkOutcome, SkipReason};
