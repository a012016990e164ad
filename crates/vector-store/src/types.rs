use compass_protocol::ContentType;
use serde::{Deserialize, Serialize};

/// Distance metric for a collection. Only cosine is used today; the enum
/// exists so a metric change is a schema change, not a silent behavior
/// change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Cosine,
}

/// Immutable schema of one collection. Changing either field requires a
/// parallel collection and a cutover, never an in-place alter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionSchema {
    pub vector_size: usize,
    pub metric: DistanceMetric,
}

impl std::fmt::Display for CollectionSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d/{:?}", self.vector_size, self.metric)
    }
}

/// Payload carried by every stored point: the chunk's attributes minus the
/// vector itself. All fields are filterable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointPayload {
    pub repo: String,
    pub branch: String,
    pub commit: String,
    pub path: String,
    pub language: String,
    /// `Code` or `Docs`; a stored point is never `All`.
    pub kind: ContentType,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Chunk text, served back as the evidence snippet.
    pub text: String,
    /// Digest of the source file at scan time.
    pub file_hash: String,
}

/// A stored vector plus payload, keyed by a deterministic id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// Structured filter over payload fields. All present clauses must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PointFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ContentType>,
    /// Match points whose commit differs from this value (stale-point
    /// housekeeping after a re-index).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_not: Option<String>,
}

impl PointFilter {
    #[must_use]
    pub fn matches(&self, payload: &PointPayload) -> bool {
        if let Some(repo) = &self.repo {
            if &payload.repo != repo {
                return false;
            }
        }
        if let Some(path) = &self.path {
            if &payload.path != path {
                return false;
            }
        }
        if let Some(prefix) = &self.path_prefix {
            if !payload.path.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(language) = &self.language {
            if &payload.language != language {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if payload.kind != kind {
                return false;
            }
        }
        if let Some(commit) = &self.commit_not {
            if &payload.commit == commit {
                return false;
            }
        }
        true
    }
}

/// One ranked query hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: PointPayload,
}

/// Net effect of an upsert batch. `unchanged` counts points that were
/// already stored with an identical vector and payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub written: usize,
    pub unchanged: usize,
}
