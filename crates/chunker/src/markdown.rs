use crate::config::ChunkerConfig;
use crate::types::{estimate_tokens, Chunk, ChunkKind};
use crate::window::WindowSplitter;
use once_cell::sync::Lazy;
use regex::Regex;

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+\S").expect("valid regex"));

/// Heading-aware splitter for markdown documentation: chunk boundaries
/// follow section headings, grouped up to the token budget. Oversized
/// sections fall back to token windows internally.
pub struct MarkdownSplitter<'a> {
    config: &'a ChunkerConfig,
}

impl<'a> MarkdownSplitter<'a> {
    pub fn new(config: &'a ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn split(&self, content: &str, path: &str) -> Vec<Chunk> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }

        // Section boundaries: line 0 plus every heading line.
        let mut starts: Vec<usize> = vec![0];
        let mut in_fence = false;
        for (idx, line) in lines.iter().enumerate() {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                continue;
            }
            if !in_fence && idx > 0 && HEADING.is_match(line) {
                starts.push(idx);
            }
        }

        let max_tokens = self.config.max_chunk_tokens;
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut group_start: Option<usize> = None;
        let mut group_tokens = 0usize;

        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).map_or(lines.len(), |&next| next) - 1;
            let tokens: usize = lines[start..=end].iter().map(|l| estimate_tokens(l)).sum();

            if tokens > max_tokens {
                if let Some(s) = group_start.take() {
                    chunks.push(self.make_chunk(&lines, s, start - 1, path));
                }
                chunks.extend(WindowSplitter::new(self.config).split(
                    &lines[start..=end],
                    start + 1,
                    path,
                    "markdown",
                    ChunkKind::Docs,
                ));
                continue;
            }

            if group_start.is_some() && group_tokens + tokens > max_tokens {
                if let Some(s) = group_start.take() {
                    chunks.push(self.make_chunk(&lines, s, start - 1, path));
                }
            }
            if group_start.is_none() {
                group_start = Some(start);
                group_tokens = 0;
            }
            group_tokens += tokens;
        }

        if let Some(s) = group_start {
            chunks.push(self.make_chunk(&lines, s, lines.len() - 1, path));
        }

        chunks
    }

    fn make_chunk(&self, lines: &[&str], start: usize, end: usize, path: &str) -> Chunk {
        Chunk {
            path: path.to_string(),
            start_line: start + 1,
            end_line: end + 1,
            text: lines[start..=end].join("\n"),
            language: "markdown".to_string(),
            kind: ChunkKind::Docs,
            symbols: Vec::new(),
        }
    }
}
