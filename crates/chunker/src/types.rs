use serde::{Deserialize, Serialize};
use std::path::Path;

/// A contiguous text unit of one file, ready for embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Repo-relative source path
    pub path: String,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,

    /// The chunk text
    pub text: String,

    /// Source language name
    pub language: String,

    /// Content class this chunk belongs to
    pub kind: ChunkKind,

    /// Symbol names declared inside this chunk, when the syntax splitter
    /// produced it
    #[serde(default)]
    pub symbols: Vec<String>,
}

impl Chunk {
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    #[must_use]
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.text)
    }
}

/// Content class, partitioning the vector store into parallel collections.
///
/// Closed variant on purpose: routing to models and collections is a lookup
/// over these two values, never runtime type inspection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Code,
    Docs,
}

impl ChunkKind {
    /// Classify a file path into a content class
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        if crate::Language::from_path(path).is_documentation() {
            Self::Docs
        } else {
            Self::Code
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Docs => "docs",
        }
    }
}

/// Why a file produced no chunks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Content is not valid UTF-8
    NotUtf8,
    /// Content contains NUL bytes (binary-adjacent)
    BinaryContent,
    /// File exceeds the configured size ceiling
    TooLarge { bytes: u64, limit: u64 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotUtf8 => write!(f, "not valid UTF-8"),
            Self::BinaryContent => write!(f, "binary content"),
            Self::TooLarge { bytes, limit } => {
                write!(f, "file too large ({bytes} bytes > {limit})")
            }
        }
    }
}

/// Result of chunking one file: chunks, or a reported skip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Chunks(Vec<Chunk>),
    Skipped(SkipReason),
}

impl ChunkOutcome {
    #[must_use]
    pub fn chunks(self) -> Vec<Chunk> {
        match self {
            Self::Chunks(chunks) => chunks,
            Self::Skipped(_) => Vec::new(),
        }
    }
}

/// Estimate tokens from content (rough heuristic: ~4 chars per token for code)
#[must_use]
pub fn estimate_tokens(content: &str) -> usize {
    (content.len() / 4).max(1)
}
