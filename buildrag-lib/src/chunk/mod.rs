//! Document chunking
//!
//! Raw build guides are scraped web pages, so text goes through
//! [`normalize`] first to drop blank formatting lines, then through a
//! [`Chunker`] that cuts it into bounded, overlapping segments.
//!
//! # Usage
//!
//! ```ignore
//! use buildrag_lib::chunk::{normalize, ChunkMetadata, Chunker, RecursiveChunker};
//!
//! let chunker = RecursiveChunker::default(); // 800 chars, 150 overlap
//! let text = normalize(&raw);
//! let chunks = chunker.chunk(&text, ChunkMetadata::for_document("HuTao", "HuTao.txt"));
//! ```

use serde::{Deserialize, Serialize};

use crate::embed::fnv1a;

/// A chunk of text with its metadata
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Chunk {
    /// Content hash of this chunk
    pub id: String,
    /// The text content of this chunk
    pub content: String,
    /// Metadata about the source and position
    pub metadata: ChunkMetadata,
}

/// Metadata associated with a chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct ChunkMetadata {
    /// Owning document identifier (the character name)
    pub character: String,
    /// Source file name
    pub source: String,
    /// Position of the chunk within its document (0-indexed)
    pub ordinal: usize,
    /// Character offset of the chunk start in the normalized text
    pub offset: usize,
}

impl ChunkMetadata {
    /// Base metadata for every chunk cut from one document.
    #[must_use]
    pub fn for_document(character: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            character: character.into(),
            source: source.into(),
            ..Self::default()
        }
    }
}

/// Trait for document chunking strategies
pub trait Chunker: Send + Sync {
    /// Split content into chunks
    ///
    /// # Arguments
    /// * `content` - The normalized text to chunk
    /// * `metadata` - Base metadata to attach to each chunk
    ///
    /// # Returns
    /// Chunks in document order, each with ordinal and offset filled in
    fn chunk(&self, content: &str, metadata: ChunkMetadata) -> Vec<Chunk>;

    /// Returns the name of this chunking strategy
    fn name(&self) -> &str;
}

/// Content hash used as the chunk id; persisted, so it must stay stable.
pub(crate) fn generate_id(string: &str) -> String {
    format!("{:016x}", fnv1a(string.as_bytes()))
}

mod normalize;
mod recursive;

pub use normalize::normalize;
pub use recursive::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_is_stable() {
        assert_eq!(generate_id(""), "cbf29ce484222325");
        assert_eq!(generate_id("a"), "af63dc4c8601ec8c");
        assert_eq!(generate_id("Pyro character."), generate_id("Pyro character."));
        assert_ne!(generate_id("Pyro character."), generate_id("a polearm."));
    }
}
