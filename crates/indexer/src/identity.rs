//! Deterministic content hashes and point identifiers.
//!
//! Everything here is a pure function of its inputs: no clocks, no
//! randomness, no process state. Identical inputs produce identical
//! identifiers across processes and machines, which is what makes
//! incremental indexing idempotent.

use compass_chunker::Chunk;
use sha2::{Digest, Sha256};

/// Digest of a source file's full content at scan time.
#[must_use]
pub fn file_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex(&hasher.finalize())
}

/// Digest of a chunk's text plus its position metadata. Moving a chunk
/// without changing its text still changes the hash.
#[must_use]
pub fn chunk_hash(chunk: &Chunk) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunk.path.as_bytes());
    hasher.update([0]);
    hasher.update(chunk.start_line.to_le_bytes());
    hasher.update(chunk.end_line.to_le_bytes());
    hasher.update(chunk.kind.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(chunk.text.as_bytes());
    hex(&hasher.finalize())
}

/// Stable point identifier for a chunk within a repository snapshot.
#[must_use]
pub fn point_id(repo: &str, commit: &str, path: &str, chunk_hash: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [repo, commit, path, chunk_hash] {
        hasher.update(part.as_bytes());
        hasher.update([0]);
    }
    hex(&hasher.finalize())
}

fn hex(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
