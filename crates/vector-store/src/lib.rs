//! # Compass Vector Store
//!
//! Named vector collections with payload filtering, idempotent upserts and
//! JSON persistence.
//!
//! ## Architecture
//!
//! ```text
//! VectorPoint { point_id, vector, payload }
//!     │
//!     ├──> Collection (one per content class: <stem>__code / <stem>__docs)
//!     │      ├─> idempotent upsert by point_id
//!     │      ├─> filtered delete (path / commit scoped)
//!     │      └─> cosine top-k query
//!     │
//!     └──> Persistent storage
//!            └─> one JSON file per collection, atomic tmp+rename
//! ```
//!
//! Consistency note: readers see the collection snapshot taken at query
//! time. Upserts from a concurrently running indexing pass become visible
//! on their completion, not before; read-your-writes is not guaranteed and
//! is an accepted trade-off.

mod collection;
mod error;
mod migration;
mod store;
mod types;

pub use collection::Collection;
pub use error::{Result, VectorStoreError};
pub use migration::{CollectionMigration, CutoverState};
pub use store::{VectorQuery, VectorStore};
pub use types::{
    CollectionSchema, DistanceMetric, PointFilter, PointPayload, ScoredPoint, UpsertOutcome,
    VectorPoint,
};
