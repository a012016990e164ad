//! # Compass Search
//!
//! Evidence-first retrieval over the vector store: per-collection
//! nearest-neighbor queries fanned out in parallel, merged with Reciprocal
//! Rank Fusion when both content classes are targeted.

mod engine;
mod error;
mod fusion;

pub use engine::{RetrievalEngine, SearchConfig};
pub use error::{Result, SearchError};
pub use fusion::{rrf_merge, RankedList, DEFAULT_RRF_K};
