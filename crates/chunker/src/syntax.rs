use crate::config::ChunkerConfig;
use crate::error::{ChunkerError, Result};
use crate::language::Language;
use crate::types::{estimate_tokens, Chunk, ChunkKind};
use crate::window::WindowSplitter;

/// Syntax-aware splitter: chunk boundaries follow top-level items
/// (functions, impls, classes) reported by tree-sitter.
pub struct SyntaxSplitter<'a> {
    config: &'a ChunkerConfig,
}

/// A run of source lines aligned to one top-level item or to the text
/// between items. Segments cover the file contiguously.
struct Segment {
    /// 0-based inclusive line range
    start: usize,
    end: usize,
    symbol: Option<String>,
}

impl<'a> SyntaxSplitter<'a> {
    pub fn new(config: &'a ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn split(&self, content: &str, path: &str, language: Language) -> Result<Vec<Chunk>> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&language.tree_sitter_language()?)
            .map_err(|e| ChunkerError::tree_sitter(e.to_string()))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| ChunkerError::tree_sitter("parser returned no tree"))?;
        if tree.root_node().has_error() {
            return Err(ChunkerError::tree_sitter(format!(
                "syntax errors in {path}"
            )));
        }

        let lines: Vec<&str> = content.lines().collect();
        let segments = self.collect_segments(&tree, content, lines.len());
        Ok(self.group_segments(&segments, &lines, path, language))
    }

    /// Walk the root's named children and produce contiguous segments:
    /// one per top-level item, plus filler for the lines between them.
    fn collect_segments(
        &self,
        tree: &tree_sitter::Tree,
        content: &str,
        line_count: usize,
    ) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut next_line = 0usize;

        let root = tree.root_node();
        let mut cursor = root.walk();
        for node in root.named_children(&mut cursor) {
            let start = node.start_position().row;
            // A node ending exactly at a newline reports the row after it.
            let end = node.end_position().row.min(line_count.saturating_sub(1));
            if start > end {
                continue;
            }

            if start > next_line {
                segments.push(Segment {
                    start: next_line,
                    end: start - 1,
                    symbol: None,
                });
            }
            if end >= next_line {
                segments.push(Segment {
                    start: start.max(next_line),
                    end,
                    symbol: symbol_name(node, content),
                });
                next_line = end + 1;
            }
        }

        if next_line < line_count {
            segments.push(Segment {
                start: next_line,
                end: line_count - 1,
                symbol: None,
            });
        }

        segments
    }

    /// Greedily pack segments into chunks up to the token budget. A single
    /// segment over the budget is windowed internally instead of failing.
    fn group_segments(
        &self,
        segments: &[Segment],
        lines: &[&str],
        path: &str,
        language: Language,
    ) -> Vec<Chunk> {
        let max_tokens = self.config.max_chunk_tokens;
        let mut chunks: Vec<Chunk> = Vec::new();

        let mut group_start: Option<usize> = None;
        let mut group_end = 0usize;
        let mut group_tokens = 0usize;
        let mut group_symbols: Vec<String> = Vec::new();

        let mut flush = |start: &mut Option<usize>,
                         end: usize,
                         symbols: &mut Vec<String>,
                         chunks: &mut Vec<Chunk>| {
            if let Some(s) = start.take() {
                chunks.push(Chunk {
                    path: path.to_string(),
                    start_line: s + 1,
                    end_line: end + 1,
                    text: lines[s..=end].join("\n"),
                    language: language.as_str().to_string(),
                    kind: ChunkKind::Code,
                    symbols: std::mem::take(symbols),
                });
            }
        };

        for segment in segments {
            let tokens: usize = lines[segment.start..=segment.end]
                .iter()
                .map(|l| estimate_tokens(l))
                .sum();

            if tokens > max_tokens {
                // Oversized item: close the running group, then window the
                // item's own lines so boundaries stay inside it.
                flush(&mut group_start, group_end, &mut group_symbols, &mut chunks);
                let windowed = WindowSplitter::new(self.config).split(
                    &lines[segment.start..=segment.end],
                    segment.start + 1,
                    path,
                    language.as_str(),
                    ChunkKind::Code,
                );
                for mut chunk in windowed {
                    if let Some(symbol) = &segment.symbol {
                        chunk.symbols = vec![symbol.clone()];
                    }
                    chunks.push(chunk);
                }
                continue;
            }

            if group_start.is_some() && group_tokens + tokens > max_tokens {
                flush(&mut group_start, group_end, &mut group_symbols, &mut chunks);
            }

            if group_start.is_none() {
                group_start = Some(segment.start);
                group_tokens = 0;
            }
            group_end = segment.end;
            group_tokens += tokens;
            if let Some(symbol) = &segment.symbol {
                group_symbols.push(symbol.clone());
            }
        }

        flush(&mut group_start, group_end, &mut group_symbols, &mut chunks);
        chunks
    }
}

/// Best-effort symbol name for a top-level node via its `name` field.
fn symbol_name(node: tree_sitter::Node<'_>, content: &str) -> Option<String> {
    let name = node.child_by_field_name("name")?;
    content.get(name.byte_range()).map(str::to_string)
}
