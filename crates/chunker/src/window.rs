use crate::config::ChunkerConfig;
use crate::types::{estimate_tokens, Chunk, ChunkKind};

/// Fixed-size token-window splitter, the fallback for languages without a
/// syntax-aware splitter and for oversized single items.
///
/// Windows advance in source order without gaps; each window after the first
/// re-reads a bounded tail of the previous one as overlap.
pub struct WindowSplitter<'a> {
    config: &'a ChunkerConfig,
}

impl<'a> WindowSplitter<'a> {
    pub fn new(config: &'a ChunkerConfig) -> Self {
        Self { config }
    }

    /// Split `lines` into window chunks. `origin_line` is the 1-based source
    /// line of `lines[0]`, so callers can window a sub-range of a file.
    pub fn split(
        &self,
        lines: &[&str],
        origin_line: usize,
        path: &str,
        language: &str,
        kind: ChunkKind,
    ) -> Vec<Chunk> {
        if lines.is_empty() {
            return Vec::new();
        }

        let max_tokens = self.config.max_chunk_tokens;
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut start = 0usize;

        while start < lines.len() {
            let mut end = start;
            let mut tokens = 0usize;

            while end < lines.len() {
                let line_tokens = estimate_tokens(lines[end]);
                if tokens > 0 && tokens + line_tokens > max_tokens {
                    break;
                }
                tokens += line_tokens;
                end += 1;
            }
            // A single line larger than the budget still forms one chunk.
            debug_assert!(end > start);

            let window_start = if chunks.is_empty() {
                start
            } else {
                start.saturating_sub(self.overlap_line_count(lines, start))
            };

            let text = lines[window_start..end].join("\n");
            chunks.push(Chunk {
                path: path.to_string(),
                start_line: origin_line + window_start,
                end_line: origin_line + end - 1,
                text,
                language: language.to_string(),
                kind,
                symbols: Vec::new(),
            });

            start = end;
        }

        self.merge_trailing_fragment(chunks, lines, origin_line)
    }

    /// Number of tail lines before `boundary` that fit in the overlap budget.
    /// Never reaches back past the previous chunk's own start.
    fn overlap_line_count(&self, lines: &[&str], boundary: usize) -> usize {
        let budget = self.config.overlap_tokens;
        if budget == 0 {
            return 0;
        }

        let mut taken = 0usize;
        let mut tokens = 0usize;
        for line in lines[..boundary].iter().rev() {
            let line_tokens = estimate_tokens(line);
            if tokens + line_tokens > budget {
                break;
            }
            tokens += line_tokens;
            taken += 1;
        }
        taken
    }

    /// Fold a final fragment below `min_chunk_tokens` into its predecessor so
    /// tiny tails do not become standalone points.
    fn merge_trailing_fragment(
        &self,
        mut chunks: Vec<Chunk>,
        lines: &[&str],
        origin_line: usize,
    ) -> Vec<Chunk> {
        if chunks.len() < 2 {
            return chunks;
        }

        if let Some(last) = chunks.last() {
            if last.estimated_tokens() >= self.config.min_chunk_tokens {
                return chunks;
            }
        }

        let Some(fragment) = chunks.pop() else {
            return chunks;
        };
        let Some(prev) = chunks.last_mut() else {
            return vec![fragment];
        };

        // Append only the lines the previous chunk does not already cover.
        let new_from = prev.end_line + 1 - origin_line;
        let fragment_end = fragment.end_line - origin_line;
        for idx in new_from..=fragment_end {
            prev.text.push('\n');
            prev.text.push_str(lines[idx]);
        }
        prev.end_line = fragment.end_line;

        chunks
    }
}
