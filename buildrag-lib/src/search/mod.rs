//! High-level retrieval interface
//!
//! Combines an embedder and a loaded index into the question-answering side
//! of the pipeline.
//!
//! # Usage
//!
//! ```ignore
//! use buildrag_lib::search::{render_context, Retriever};
//!
//! let retriever = Retriever::open(embedder, "embeddings/index")?;
//! let hits = retriever.retrieve("Best weapon for Hu Tao?", 4)?;
//! println!("{}", render_context(&hits));
//! ```

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::embed::Embedder;
use crate::store::{FlatIndex, IndexHeader, SearchResult, SharedIndex, VectorStore};
use crate::{Error, Result};

/// A retrieved chunk with the fields a prompt needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub character: String,
    pub source: String,
}

impl From<SearchResult> for RetrievedChunk {
    fn from(result: SearchResult) -> Self {
        let SearchResult { chunk, .. } = result;
        Self {
            text: chunk.content,
            character: chunk.metadata.character,
            source: chunk.metadata.source,
        }
    }
}

/// Query-time pairing of an embedder with a vector store.
///
/// Every method takes `&self`, so one retriever can be shared between
/// threads for concurrent questions.
pub struct Retriever<E: Embedder, S: VectorStore = FlatIndex> {
    embedder: E,
    store: S,
}

impl<E: Embedder> Retriever<E, FlatIndex> {
    /// Load the index saved at `location`.
    ///
    /// Fails with [`Error::IndexNotFound`] when nothing has been ingested yet.
    pub fn open(embedder: E, location: impl AsRef<Path>) -> Result<Self> {
        let index = FlatIndex::load(location)?;
        Self::new(embedder, index)
    }
}

impl<E: Embedder, S: VectorStore> Retriever<E, S> {
    /// Pair `embedder` with `store`, checking that their vectors agree.
    pub fn new(embedder: E, store: S) -> Result<Self> {
        check_compatible(&embedder, &store.header())?;
        Ok(Self { embedder, store })
    }

    /// The `k` chunks most relevant to `query`, best first.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        Ok(self
            .search(query, k)?
            .into_iter()
            .map(RetrievedChunk::from)
            .collect())
    }

    /// Like [`retrieve`](Self::retrieve) but keeps scores and full chunks.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let vector = self.embedder.embed_one(query)?;
        let results = self.store.search(&vector, k)?;
        debug!(k, hits = results.len(), "retrieved chunks");
        Ok(results)
    }

    /// Returns the number of indexed chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if no chunks are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    #[must_use]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<E: Embedder> Retriever<E, SharedIndex> {
    /// Load the index at `location` and swap it in.
    ///
    /// The new index goes through the same checks as [`new`](Self::new); on
    /// failure the current index keeps serving.
    pub fn reload(&self, location: impl AsRef<Path>) -> Result<()> {
        let location = location.as_ref();
        let index = FlatIndex::load(location)?;
        check_compatible(&self.embedder, index.header())?;

        let entries = index.len();
        self.store.replace(index);
        info!(location = %location.display(), entries, "reloaded vector index");
        Ok(())
    }
}

fn check_compatible<E: Embedder + ?Sized>(embedder: &E, header: &IndexHeader) -> Result<()> {
    if header.dimension != embedder.dimension() {
        return Err(Error::DimensionMismatch {
            expected: header.dimension,
            actual: embedder.dimension(),
        });
    }
    if header.model != embedder.model_name() {
        warn!(
            index_model = %header.model,
            query_model = embedder.model_name(),
            "index was built with a different embedding model"
        );
    }
    Ok(())
}

/// Format retrieved chunks as prompt context: each chunk under a
/// `[character]` line, blank line between chunks.
#[must_use]
pub fn render_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| format!("[{}]\n{}", c.character, c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
