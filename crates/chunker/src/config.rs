use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for chunking behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk size in estimated tokens (hard limit for grouping;
    /// a single indivisible unit may still exceed it)
    pub max_chunk_tokens: usize,

    /// Overlap carried from the previous chunk, in estimated tokens
    pub overlap_tokens: usize,

    /// Minimum chunk size in tokens; trailing fragments below this are
    /// merged into the previous chunk instead of standing alone
    pub min_chunk_tokens: usize,

    /// Files larger than this many bytes are skipped, not chunked
    pub max_file_bytes: u64,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_tokens: 512,
            overlap_tokens: 64,
            min_chunk_tokens: 8,
            max_file_bytes: 1_048_576, // 1 MB
        }
    }
}

impl ChunkerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_tokens == 0 {
            return Err(ChunkerError::invalid_config("max_chunk_tokens must be > 0"));
        }

        if self.overlap_tokens >= self.max_chunk_tokens {
            return Err(ChunkerError::invalid_config(format!(
                "overlap_tokens ({}) must be smaller than max_chunk_tokens ({})",
                self.overlap_tokens, self.max_chunk_tokens
            )));
        }

        if self.min_chunk_tokens > self.max_chunk_tokens {
            return Err(ChunkerError::invalid_config(format!(
                "min_chunk_tokens ({}) cannot exceed max_chunk_tokens ({})",
                self.min_chunk_tokens, self.max_chunk_tokens
            )));
        }

        Ok(())
    }
}
