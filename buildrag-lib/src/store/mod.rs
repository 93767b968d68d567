//! Vector index
//!
//! A [`FlatIndex`] holds `(chunk, vector)` entries in insertion order and
//! answers exact nearest-neighbour queries by brute force. The corpus is a
//! few hundred guides, so a flat scan is fast enough and exact.
//!
//! # Storage Model
//!
//! Each stored item consists of:
//! - Chunk: the original text and metadata (character, source file)
//! - Embedding: the vector representation
//!
//! The header records the embedding model, dimension and metric, and is
//! persisted alongside the entries so a loaded index can reject queries from
//! a different model.
//!
//! # Usage
//!
//! ```ignore
//! use buildrag_lib::store::{FlatIndex, IndexEntry, IndexHeader, Metric, VectorStore};
//!
//! let header = IndexHeader::new(embedder.model_name(), embedder.dimension(), Metric::Cosine);
//! let index = FlatIndex::build(header, entries)?;
//! index.save("embeddings/index")?;
//!
//! let index = FlatIndex::load("embeddings/index")?;
//! let results = index.search(&query_embedding, 4)?;
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::embed::Embedding;
use crate::Result;

/// A search result with similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// The matched chunk
    pub chunk: Chunk,
    /// Similarity score (higher is more similar)
    /// For cosine similarity: -1.0 to 1.0
    /// For euclidean: negated distance, so at most 0.0
    pub score: f32,
}

/// One indexed chunk and its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Embedding,
}

impl IndexEntry {
    #[must_use]
    pub fn new(chunk: Chunk, vector: Embedding) -> Self {
        Self { chunk, vector }
    }
}

/// Similarity measure an index is built and queried with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity
    #[default]
    Cosine,
    /// Negative L2 distance
    Euclidean,
}

impl Metric {
    /// Score two vectors of equal length; higher means more similar.
    #[must_use]
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(a, b),
            Metric::Euclidean => -euclidean_distance(a, b),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cosine => f.write_str("cosine"),
            Metric::Euclidean => f.write_str("euclidean"),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            other => Err(format!("unknown metric '{other}' (expected cosine or euclidean)")),
        }
    }
}

/// Everything needed to interpret an index's vectors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHeader {
    /// Embedding model the vectors came from
    pub model: String,
    /// Length of every vector in the index
    pub dimension: usize,
    /// Similarity measure used for search
    pub metric: Metric,
}

impl IndexHeader {
    #[must_use]
    pub fn new(model: impl Into<String>, dimension: usize, metric: Metric) -> Self {
        Self {
            model: model.into(),
            dimension,
            metric,
        }
    }
}

/// Trait for vector storage backends
///
/// Searching takes `&self`; implementations must be safe to query from
/// several threads at once.
pub trait VectorStore: Send + Sync {
    /// Model, dimension and metric of the stored vectors
    fn header(&self) -> IndexHeader;

    /// Vector length every query must have
    fn dimension(&self) -> usize {
        self.header().dimension
    }

    /// Search for similar chunks
    ///
    /// # Arguments
    /// * `query` - The query vector
    /// * `k` - Number of results to return
    ///
    /// # Returns
    /// Top-k results sorted by similarity (highest first), ties in insertion order
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Get total number of stored chunks
    fn len(&self) -> usize;

    /// Check if store is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: VectorStore + ?Sized> VectorStore for Arc<S> {
    fn header(&self) -> IndexHeader {
        (**self).header()
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        (**self).search(query, k)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 means identical direction, and 0 if
/// either vector is all zeros.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Compute the L2 distance between two vectors.
#[must_use]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");

    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

mod flat;
mod persist;
mod shared;

pub use flat::*;
pub use shared::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &a);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_euclidean_score_is_negated_distance() {
        let score = Metric::Euclidean.score(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((score + 5.0).abs() < 1e-6);
        assert_eq!(Metric::Euclidean.score(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_metric_parse_and_display() {
        assert_eq!("cosine".parse::<Metric>().unwrap(), Metric::Cosine);
        assert_eq!("L2".parse::<Metric>().unwrap(), Metric::Euclidean);
        assert!("manhattan".parse::<Metric>().is_err());
        assert_eq!(Metric::Euclidean.to_string(), "euclidean");
    }
}
