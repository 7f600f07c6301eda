//! Overlap-aware chunking bounded by `max_size` characters.
//!
//! Chunk `i > 0` starts with exactly `overlap` characters copied from the end
//! of chunk `i - 1`; dropping that prefix from every chunk but the first and
//! concatenating reproduces the input. Cut points prefer paragraph breaks,
//! then line breaks, then sentence ends, then whitespace, and fall back to a
//! hard cut at the size limit.

use tracing::debug;

use crate::config::ChunkingSettings;
use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

const SENTENCE_ENDS: &[char] = &['.', '!', '?', ';', '。', '！', '？', '；'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_size: 512, overlap: 50 }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(s: &ChunkingSettings) -> Self {
        Self { max_size: s.max_size, overlap: s.overlap }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        if config.max_size == 0 || config.overlap >= config.max_size {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than max size ({})",
                config.overlap, config.max_size
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        let pieces = split_with_overlap(&document.text, self.config.max_size, self.config.overlap);
        let total_chunks = pieces.len();
        debug!(source = %document.source, total_chunks, "chunked document");
        pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| Chunk {
                text,
                source: document.source.clone(),
                chunk_index,
                total_chunks,
            })
            .collect()
    }
}

/// Split `text` into pieces of at most `max_size` chars with `overlap` chars
/// of shared context between neighbours. Empty input yields no pieces.
///
/// Callers guarantee `overlap < max_size`.
pub fn split_with_overlap(text: &str, max_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let mut pieces = Vec::new();
    if n == 0 {
        return pieces;
    }

    // `body_start` is where the new (non-overlapping) content of a piece begins.
    let mut body_start = 0usize;
    while body_start < n {
        let lead = if body_start == 0 { 0 } else { overlap };
        let budget = max_size - lead;
        let end = if n - body_start <= budget {
            n
        } else {
            // Never cut so early that the next piece could not carry a full overlap.
            let earliest = (body_start + (budget + 1) / 2).max(overlap).min(body_start + budget);
            find_cut(&chars, earliest, body_start + budget)
        };
        pieces.push(chars[body_start - lead..end].iter().collect());
        body_start = end;
    }
    pieces
}

/// Best cut in `earliest..=latest`, where a cut at `i` ends a piece after `chars[i - 1]`.
fn find_cut(chars: &[char], earliest: usize, latest: usize) -> usize {
    let boundaries: [&dyn Fn(usize) -> bool; 4] = [
        &|i: usize| i >= 2 && chars[i - 1] == '\n' && chars[i - 2] == '\n',
        &|i: usize| chars[i - 1] == '\n',
        &|i: usize| SENTENCE_ENDS.contains(&chars[i - 1]),
        &|i: usize| chars[i - 1].is_whitespace(),
    ];
    for is_boundary in boundaries {
        if let Some(cut) = (earliest.max(1)..=latest).rev().find(|&i| is_boundary(i)) {
            return cut;
        }
    }
    latest
}
