//! # Compass Indexer
//!
//! Deterministic, idempotent indexing of a repository snapshot into the
//! vector store.
//!
//! ## Pipeline
//!
//! ```text
//! Repository root
//!     │
//!     ├──> Scanner (.gitignore aware, no symlinks, size ceiling)
//!     │      └─> Eligible files + content hashes
//!     │
//!     ├──> Chunker ──> Embedding router (per content class)
//!     │
//!     └──> Vector store (batched, idempotent upserts)
//!            └─> Housekeeping (stale path / stale commit deletes)
//! ```
//!
//! Running the same mode twice over an unchanged tree yields zero net
//! mutations: identities are pure functions of content and position, and
//! upserts replace-in-place.

mod error;
mod hash_state;
mod identity;
mod lock;
mod pipeline;
mod scanner;
mod stats;

pub use error::{IndexerError, Result};
pub use hash_state::{HashStateStore, JsonHashStateStore};
pub use identity::{chunk_hash, file_hash, point_id};
pub use pipeline::{IndexMode, IndexingPipeline, PipelineConfig, RunPhase};
pub use scanner::{FileScanner, ScannedFile};
pub use stats::IndexStats;
