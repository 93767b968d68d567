//! Index building
//!
//! ```text
//! raw/*.txt -> normalize -> chunk -> embed (batched) -> FlatIndex -> save
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunk::{normalize, Chunk, ChunkMetadata, Chunker, RecursiveChunker};
use crate::corpus::{load_corpus, Document};
use crate::embed::Embedder;
use crate::store::{FlatIndex, IndexEntry, IndexHeader, Metric};
use crate::{Error, Result};

/// Tunables shared by the ingest and query sides of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub overlap: usize,
    /// Chunks per embedding call
    pub batch_size: usize,
    /// Chunks returned per question
    pub top_k: usize,
    /// Similarity measure for new indexes
    pub metric: Metric,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: RecursiveChunker::DEFAULT_MAX_SIZE,
            overlap: RecursiveChunker::DEFAULT_OVERLAP,
            batch_size: 64,
            top_k: 4,
            metric: Metric::Cosine,
        }
    }
}

impl PipelineConfig {
    /// Read settings from a JSON file; missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.display())))
    }

    /// Validate the settings and build the matching [`Ingestor`].
    pub fn ingestor(&self) -> Result<Ingestor<RecursiveChunker>> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be positive".to_string()));
        }
        let chunker = RecursiveChunker::try_new(self.chunk_size, self.overlap)?;
        Ok(Ingestor::new(chunker)
            .with_batch_size(self.batch_size)
            .with_metric(self.metric))
    }
}

/// Summary of an ingest run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
}

/// Turns a corpus into a [`FlatIndex`].
pub struct Ingestor<C: Chunker> {
    chunker: C,
    batch_size: usize,
    metric: Metric,
}

impl<C: Chunker> Ingestor<C> {
    #[must_use]
    pub fn new(chunker: C) -> Self {
        Self {
            chunker,
            batch_size: 64,
            metric: Metric::Cosine,
        }
    }

    /// # Panics
    /// Panics if `batch_size` is zero.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be positive");
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Normalize and chunk each document, tagging chunks with its identity.
    #[must_use]
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| {
                let text = normalize(&doc.text);
                let chunks = self
                    .chunker
                    .chunk(&text, ChunkMetadata::for_document(&doc.id, &doc.source));
                debug!(document = %doc.id, chunks = chunks.len(), "chunked document");
                chunks
            })
            .collect()
    }

    /// Embed chunks in batches and build the index.
    pub fn build<E: Embedder + ?Sized>(
        &self,
        embedder: &E,
        chunks: Vec<Chunk>,
    ) -> Result<FlatIndex> {
        let total = chunks.len();
        info!(chunks = total, model = embedder.model_name(), "embedding chunks");

        let mut entries = Vec::with_capacity(total);
        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();
            let vectors = embedder.embed_many(&texts).map_err(|e| match e {
                // point at the chunk, not the position inside the batch
                Error::Embedding { index, reason } => Error::Embedding {
                    index: batch_no * self.batch_size + index,
                    reason,
                },
                other => other,
            })?;
            if vectors.len() != batch.len() {
                return Err(Error::ModelUnavailable(format!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }
            entries.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(vectors)
                    .map(|(chunk, vector)| IndexEntry::new(chunk, vector)),
            );
            debug!(done = entries.len(), total, "embedded batch");
        }

        let header = IndexHeader::new(embedder.model_name(), embedder.dimension(), self.metric);
        FlatIndex::build(header, entries)
    }

    /// Load the corpus in `data_dir`, build an index and save it to `location`.
    pub fn run<E: Embedder + ?Sized>(
        &self,
        embedder: &E,
        data_dir: impl AsRef<Path>,
        location: impl AsRef<Path>,
    ) -> Result<IngestReport> {
        let documents = load_corpus(data_dir)?;
        let chunks = self.chunk_documents(&documents);
        let report = IngestReport {
            documents: documents.len(),
            chunks: chunks.len(),
            dimension: embedder.dimension(),
        };

        let index = self.build(embedder, chunks)?;
        index.save(location)?;

        info!(
            documents = report.documents,
            chunks = report.chunks,
            "ingest complete"
        );
        Ok(report)
    }
}
