use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Statistics for one indexing run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Eligible files found by the scanner
    pub files_scanned: usize,

    /// Files chunked and embedded this run
    pub files_indexed: usize,

    /// Files skipped because their hash matched the last run
    pub files_unchanged: usize,

    /// Files skipped by the chunker (binary, oversized, invalid encoding)
    pub files_skipped: usize,

    /// Files whose processing failed and was isolated
    pub files_failed: usize,

    /// Files removed since the last run and cleaned up
    pub files_deleted: usize,

    /// Chunks produced this run
    pub chunks: usize,

    /// Points written (inserted or replaced)
    pub points_written: usize,

    /// Points re-submitted with identical content (no-op upserts)
    pub points_unchanged: usize,

    /// Points removed by housekeeping
    pub points_deleted: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Files per language
    pub languages: HashMap<String, usize>,

    /// Isolated per-file errors, for reporting
    pub errors: Vec<String>,
}

impl IndexStats {
    pub fn add_language(&mut self, language: &str) {
        *self.languages.entry(language.to_string()).or_insert(0) += 1;
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Share of processed files that failed, for the abort threshold.
    #[must_use]
    pub fn failure_rate(&self) -> f32 {
        let processed = self.files_indexed + self.files_failed;
        if processed == 0 {
            return 0.0;
        }
        self.files_failed as f32 / processed as f32
    }
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "files: {} indexed, {} unchanged, {} skipped, {} failed, {} deleted | chunks: {} | points: {} written, {} unchanged, {} deleted | {} ms",
            self.files_indexed,
            self.files_unchanged,
            self.files_skipped,
            self.files_failed,
            self.files_deleted,
            self.chunks,
            self.points_written,
            self.points_unchanged,
            self.points_deleted,
            self.time_ms
        )
    }
}
