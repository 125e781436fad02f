//! Recursive character chunker
//!
//! Splits page text into windows of at most `chunk_size` characters. Each cut
//! goes directly after the coarsest separator available in the window
//! (paragraph break, then line break, then space) and only falls back to a
//! raw character cut when none exists. Consecutive chunks of a page share
//! exactly `overlap` characters, so dropping the first `overlap` characters of
//! every chunk after the first reproduces the page.
//!
//! Lengths and offsets are in chars, never bytes.

use crate::error::ChunkConfigError;

use super::document::{Document, Segment, SegmentMetadata};

/// Separators in priority order.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// A chunk of a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageChunk {
    pub text: String,
    /// Char offset of the first character
    pub start: usize,
    /// Char offset one past the last character
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkConfigError> {
        if chunk_size == 0 {
            return Err(ChunkConfigError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkConfigError::OverlapTooLarge { chunk_size, overlap });
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split documents into segments, page by page, document by document.
    ///
    /// Segment ids are `"{entity_id}_{ordinal}"` where `ordinal` is the
    /// position in the returned list. Embeddings are left unset.
    pub fn split(&self, documents: &[Document]) -> Vec<Segment> {
        let mut segments = Vec::new();

        for doc in documents {
            for page in &doc.pages {
                for (chunk_index, chunk) in self.chunk_page(&page.text).into_iter().enumerate() {
                    let ordinal = segments.len();
                    segments.push(Segment {
                        id: format!("{}_{}", doc.entity_id, ordinal),
                        text: chunk.text,
                        metadata: SegmentMetadata {
                            entity_id: doc.entity_id.clone(),
                            display_name: doc.display_name.clone(),
                            source_name: doc.source_name.clone(),
                            page_number: page.page_number,
                            chunk_index,
                            start: chunk.start,
                            end: chunk.end,
                        },
                        embedding: None,
                    });
                }
            }
        }

        segments
    }

    /// Chunk one page. Empty or whitespace-only text yields nothing.
    pub fn chunk_page(&self, text: &str) -> Vec<PageChunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // bounds[i] is the byte offset of char i, bounds[n] is text.len()
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(b, _)| b)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = bounds.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            if total - start <= self.chunk_size {
                chunks.push(PageChunk {
                    text: text[bounds[start]..].to_string(),
                    start,
                    end: total,
                });
                break;
            }

            let cut = self.find_cut(text, &bounds, start);
            chunks.push(PageChunk {
                text: text[bounds[start]..bounds[cut]].to_string(),
                start,
                end: cut,
            });

            // cut > start + overlap, so this always moves forward
            start = cut - self.overlap;
        }

        chunks
    }

    /// End (exclusive, in chars) of the chunk starting at `start`.
    ///
    /// The cut must leave more than `overlap` characters in the chunk,
    /// otherwise the next chunk would not start past this one.
    fn find_cut(&self, text: &str, bounds: &[usize], start: usize) -> usize {
        let window_end = start + self.chunk_size;
        let min_cut = start + self.overlap + 1;
        let window = &text[bounds[start]..bounds[window_end]];

        for sep in SEPARATORS {
            let Some(pos) = window.rfind(sep) else {
                continue;
            };
            let cut_byte = bounds[start] + pos + sep.len();
            if let Ok(cut) = bounds.binary_search(&cut_byte) {
                // rfind gives the last match, earlier ones are no better
                if cut >= min_cut {
                    return cut;
                }
            }
        }

        window_end
    }
}
