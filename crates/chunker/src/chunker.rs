use crate::config::ChunkerConfig;
use crate::error::Result;
use crate::language::Language;
use crate::markdown::MarkdownSplitter;
use crate::syntax::SyntaxSplitter;
use crate::types::{Chunk, ChunkKind, ChunkOutcome, SkipReason};
use crate::window::WindowSplitter;

/// Main chunker interface for processing file content
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker with a validated configuration
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Chunk raw file bytes.
    ///
    /// Binary-adjacent input (NUL bytes, invalid UTF-8) and oversized files
    /// are skipped with a reason, never an error: the indexing pipeline
    /// records the skip and continues.
    pub fn chunk_bytes(&self, bytes: &[u8], path: &str) -> ChunkOutcome {
        if bytes.len() as u64 > self.config.max_file_bytes {
            return ChunkOutcome::Skipped(SkipReason::TooLarge {
                bytes: bytes.len() as u64,
                limit: self.config.max_file_bytes,
            });
        }

        if bytes.contains(&0) {
            return ChunkOutcome::Skipped(SkipReason::BinaryContent);
        }

        match std::str::from_utf8(bytes) {
            Ok(content) => ChunkOutcome::Chunks(self.chunk_str(content, path)),
            Err(_) => ChunkOutcome::Skipped(SkipReason::NotUtf8),
        }
    }

    /// Chunk valid UTF-8 content. Empty content yields zero chunks.
    pub fn chunk_str(&self, content: &str, path: &str) -> Vec<Chunk> {
        if content.is_empty() {
            return Vec::new();
        }

        let language = Language::from_path(path);
        let kind = ChunkKind::from_path(path);

        if kind == ChunkKind::Code && language.supports_syntax() {
            match SyntaxSplitter::new(&self.config).split(content, path, language) {
                Ok(chunks) if !chunks.is_empty() => return chunks,
                Ok(_) => {}
                Err(e) => {
                    log::warn!("Syntax chunking failed for {path}, falling back to windows: {e}");
                }
            }
        }

        if language == Language::Markdown {
            let chunks = MarkdownSplitter::new(&self.config).split(content, path);
            if !chunks.is_empty() {
                return chunks;
            }
        }

        let lines: Vec<&str> = content.lines().collect();
        WindowSplitter::new(&self.config).split(&lines, 1, path, language.as_str(), kind)
    }

    /// Get configuration
    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default()).expect("default chunker config is valid")
    }
}
