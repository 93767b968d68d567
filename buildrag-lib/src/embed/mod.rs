//! Text embedding
//!
//! The production embedder is sentence-transformers/all-MiniLM-L6-v2 via the
//! fastembed crate (ONNX runtime). [`HashEmbedder`] is a deterministic,
//! model-free stand-in for tests and offline runs.
//!
//! An index must be queried with the same embedder it was built with; the
//! model name and dimension are recorded in the index header so drift is
//! caught at load time.
//!
//! # Usage
//!
//! ```ignore
//! use buildrag_lib::embed::{Embedder, MiniLmEmbedder};
//!
//! let embedder = MiniLmEmbedder::new()?;
//!
//! // Embed chunks (for indexing)
//! let vectors = embedder.embed_many(&["Hu Tao scales with HP...", "Staff of Homa..."])?;
//!
//! // Embed a question (for searching)
//! let query = embedder.embed_one("best weapon for Hu Tao")?;
//! ```

use crate::{Error, Result};

/// A vector embedding - fixed size array of floats
pub type Embedding = Vec<f32>;

/// Trait for text embedding models
///
/// Implementations are deterministic: the same text always maps to the same
/// vector, whatever batch it arrives in.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, preserving input order
    fn embed_many(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Embed a single text
    fn embed_one(&self, text: &str) -> Result<Embedding> {
        self.embed_many(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ModelUnavailable("model returned no embeddings".to_string()))
    }

    /// Returns the embedding dimension
    fn dimension(&self) -> usize;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn embed_many(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        (**self).embed_many(texts)
    }

    fn embed_one(&self, text: &str) -> Result<Embedding> {
        (**self).embed_one(text)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Reject texts that are not plain text.
///
/// Control characters other than line breaks and tabs (NUL, escape codes)
/// only reach us from broken scrapes. The error names the first bad element.
pub fn validate_batch(texts: &[&str]) -> Result<()> {
    for (index, text) in texts.iter().enumerate() {
        if let Some(c) = text
            .chars()
            .find(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
        {
            return Err(Error::Embedding {
                index,
                reason: format!("contains control character {:?}", c),
            });
        }
    }
    Ok(())
}

mod hash;
mod minilm;

pub use hash::*;
pub(crate) use hash::fnv1a;
pub use minilm::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_plain_text() {
        assert!(validate_batch(&["Hu Tao\tPyro\r\nPolearm", "", "胡桃 🔥"]).is_ok());
    }

    #[test]
    fn test_validate_reports_failing_element() {
        let err = validate_batch(&["fine", "also fine", "bro\0ken"]).unwrap_err();
        match err {
            Error::Embedding { index, .. } => assert_eq!(index, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_boxed_embedder_delegates() {
        let boxed: Box<dyn Embedder> = Box::new(HashEmbedder::new(32));
        assert_eq!(boxed.dimension(), 32);
        assert_eq!(boxed.model_name(), "hash-bow-32");
        assert_eq!(boxed.embed_one("pyro").unwrap().len(), 32);
    }
}
