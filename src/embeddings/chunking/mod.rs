#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::ops::Range;

use pulldown_cmark::{Event, Options, Parser, Tag};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::config::ConfigError;

pub const DEFAULT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_CHUNK_OVERLAP: usize = 160;

/// Represents a chunk of a markdown document ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChunk {
    /// The chunk text, an exact substring of the source document
    pub content: String,
    /// Position of this chunk in the split sequence
    pub chunk_index: usize,
    /// Byte offset where the chunk starts in the source document
    pub start: usize,
    /// Byte offset one past the end of the chunk in the source document
    pub end: usize,
    /// Estimated token count
    pub token_count: usize,
}

/// Configuration for markdown chunking. Both sizes are measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks that are not split at a heading
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    #[inline]
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::ChunkOverlapTooLarge(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }

        Ok(())
    }
}

/// Where a chunk may end, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CutKind {
    Heading,
    Block,
    LineBreak,
    Whitespace,
}

const CUT_PREFERENCE: [CutKind; 4] = [
    CutKind::Heading,
    CutKind::Block,
    CutKind::LineBreak,
    CutKind::Whitespace,
];

/// Structural layout of a markdown document, in byte offsets
struct Structure {
    heading_starts: HashSet<usize>,
    block_starts: HashSet<usize>,
    code_blocks: Vec<Range<usize>>,
}

impl Structure {
    fn scan(text: &str) -> Self {
        let mut heading_starts = HashSet::new();
        let mut block_starts = HashSet::new();
        let mut code_blocks = Vec::new();
        let mut depth = 0_usize;

        let options = Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_FOOTNOTES;

        for (event, range) in Parser::new_ext(text, options).into_offset_iter() {
            match event {
                Event::Start(tag) => {
                    if depth == 0 {
                        block_starts.insert(range.start);
                        if matches!(tag, Tag::Heading { .. }) {
                            heading_starts.insert(range.start);
                        }
                    }
                    if matches!(tag, Tag::CodeBlock(_)) {
                        code_blocks.push(range);
                    }
                    depth += 1;
                }
                Event::End(_) => depth = depth.saturating_sub(1),
                Event::Rule if depth == 0 => {
                    block_starts.insert(range.start);
                }
                _ => {}
            }
        }

        Self {
            heading_starts,
            block_starts,
            code_blocks,
        }
    }

    fn inside_code(&self, byte: usize) -> bool {
        self.code_blocks
            .iter()
            .any(|block| block.start < byte && byte < block.end)
    }
}

/// Split a markdown document into overlapping chunks of at most `chunk_size` characters
///
/// Every chunk is an exact substring of `text`. A chunk that starts at a top-level
/// heading shares nothing with its predecessor; every other chunk begins with the
/// last `chunk_overlap` characters of the previous one.
#[inline]
pub fn chunk_markdown(text: &str, config: &ChunkingConfig) -> Result<Vec<ContentChunk>> {
    config.validate()?;

    if text.is_empty() {
        return Ok(Vec::new());
    }

    let structure = Structure::scan(text);
    let chars: Vec<char> = text.chars().collect();
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0_usize;

    loop {
        if char_count - start <= config.chunk_size {
            chunks.push(make_chunk(text, &offsets, start, char_count, chunks.len()));
            break;
        }

        let limit = start + config.chunk_size;
        let min_end = start + config.chunk_overlap + 1;
        let (end, kind) = find_cut(&structure, &chars, &offsets, min_end, limit);

        chunks.push(make_chunk(text, &offsets, start, end, chunks.len()));

        start = if kind == Some(CutKind::Heading) {
            end
        } else {
            end - config.chunk_overlap
        };
    }

    debug!(
        "Chunked document of {} characters into {} chunks (avg {} tokens)",
        char_count,
        chunks.len(),
        chunks.iter().map(|c| c.token_count).sum::<usize>() / chunks.len().max(1)
    );

    Ok(chunks)
}

/// Pick the best end position in `min_end..=limit`, in character indices
fn find_cut(
    structure: &Structure,
    chars: &[char],
    offsets: &[usize],
    min_end: usize,
    limit: usize,
) -> (usize, Option<CutKind>) {
    for kind in CUT_PREFERENCE {
        let found = (min_end..=limit).rev().find(|&pos| {
            let byte = offsets[pos];
            match kind {
                CutKind::Heading => structure.heading_starts.contains(&byte),
                CutKind::Block => structure.block_starts.contains(&byte),
                CutKind::LineBreak => chars[pos - 1] == '\n' && !structure.inside_code(byte),
                CutKind::Whitespace => {
                    chars[pos - 1].is_whitespace() && !structure.inside_code(byte)
                }
            }
        });

        if let Some(pos) = found {
            return (pos, Some(kind));
        }
    }

    (limit, None)
}

fn make_chunk(
    text: &str,
    offsets: &[usize],
    start: usize,
    end: usize,
    chunk_index: usize,
) -> ContentChunk {
    let (start, end) = (offsets[start], offsets[end]);
    let content = text.get(start..end).unwrap_or_default().to_string();
    let token_count = estimate_token_count(&content);

    ContentChunk {
        content,
        chunk_index,
        start,
        end,
        token_count,
    }
}

/// Rebuild the source text from its chunks by dropping the overlapping prefixes
#[inline]
pub fn reconstruct(chunks: &[ContentChunk]) -> String {
    let mut text = String::new();
    let mut covered = 0;

    for chunk in chunks {
        if chunk.end <= covered {
            continue;
        }
        let skip = covered.saturating_sub(chunk.start);
        text.push_str(chunk.content.get(skip..).unwrap_or_default());
        covered = chunk.end;
    }

    text
}

/// Estimate token count using a simple heuristic
/// This is a rough approximation - actual tokenization would be more accurate
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}
