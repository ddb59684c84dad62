//! Fixed-size character splitter applied to catalog documents before embedding.

use serde::{Deserialize, Serialize};

use crate::error::SplitterError;

/// Default maximum chunk length, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default number of characters shared between neighbouring chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 0;
/// Default separator the splitter breaks documents on.
pub const DEFAULT_SEPARATOR: &str = "\n\n";

/// Provenance attached to every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the cleaned table the document was read from.
    pub source: String,
    /// Zero-based data row of the document within that table.
    pub row: usize,
}

/// Bounded-length slice of a catalog document; the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk body submitted to the embedding model and shown to the LLM.
    pub text: String,
    /// Where the chunk came from.
    pub metadata: ChunkMetadata,
}

/// Splits text on a separator and merges the pieces into chunks of at most
/// `chunk_size` characters.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separator: String,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

impl TextSplitter {
    /// Builds a splitter. Overlap is clamped below `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, SplitterError> {
        if chunk_size == 0 {
            return Err(SplitterError::ZeroChunkSize);
        }
        Ok(Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separator: DEFAULT_SEPARATOR.to_string(),
        })
    }

    /// Replaces the separator. An empty separator treats the text as one piece.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Maximum chunk length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters carried over between neighbouring chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits one document into chunks tagged with `metadata`.
    pub fn split_document(&self, text: &str, metadata: &ChunkMetadata) -> Vec<Chunk> {
        self.split_text(text)
            .into_iter()
            .map(|text| Chunk {
                text,
                metadata: metadata.clone(),
            })
            .collect()
    }

    /// Splits text into non-empty chunks no longer than `chunk_size` characters.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let pieces: Vec<&str> = if self.separator.is_empty() {
            vec![text.trim()]
        } else {
            text.split(self.separator.as_str())
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .collect()
        };
        let sep_len = char_len(&self.separator);

        let mut chunks = Vec::new();
        let mut buffer: Vec<&str> = Vec::new();
        for piece in pieces {
            let piece_len = char_len(piece);
            if piece_len > self.chunk_size {
                self.flush(&mut chunks, &buffer);
                buffer.clear();
                self.hard_split(piece, &mut chunks);
                continue;
            }

            if !buffer.is_empty()
                && joined_len(&buffer, sep_len) + sep_len + piece_len > self.chunk_size
            {
                self.flush(&mut chunks, &buffer);
                buffer = retain_overlap(&buffer, self.chunk_overlap, sep_len);
                while !buffer.is_empty()
                    && joined_len(&buffer, sep_len) + sep_len + piece_len > self.chunk_size
                {
                    buffer.remove(0);
                }
            }
            buffer.push(piece);
        }
        self.flush(&mut chunks, &buffer);
        chunks
    }

    fn flush(&self, chunks: &mut Vec<String>, buffer: &[&str]) {
        if buffer.is_empty() {
            return;
        }
        let text = buffer.join(&self.separator);
        let text = text.trim();
        if !text.is_empty() {
            chunks.push(text.to_string());
        }
    }

    fn hard_split(&self, piece: &str, chunks: &mut Vec<String>) {
        let chars: Vec<char> = piece.chars().collect();
        let step = (self.chunk_size - self.chunk_overlap).max(1);
        let mut start = 0usize;
        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            let window = window.trim();
            if !window.is_empty() {
                chunks.push(window.to_string());
            }
            if end == chars.len() {
                break;
            }
            start += step;
        }
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn joined_len(buffer: &[&str], sep_len: usize) -> usize {
    let body: usize = buffer.iter().map(|piece| char_len(piece)).sum();
    body + sep_len * buffer.len().saturating_sub(1)
}

/// Trailing pieces whose joined length fits inside `overlap`.
fn retain_overlap<'a>(buffer: &[&'a str], overlap: usize, sep_len: usize) -> Vec<&'a str> {
    if overlap == 0 || buffer.is_empty() {
        return Vec::new();
    }
    let mut retained = Vec::new();
    let mut total = 0usize;
    for &piece in buffer.iter().rev() {
        let extra = if retained.is_empty() {
            char_len(piece)
        } else {
            char_len(piece) + sep_len
        };
        if total + extra > overlap {
            break;
        }
        total += extra;
        retained.push(piece);
    }
    retained.reverse();
    retained
}
