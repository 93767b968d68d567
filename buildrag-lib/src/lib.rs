//! buildrag - retrieval engine for character build guides
//!
//! # Architecture
//!
//! ```text
//! raw/*.txt -> normalize -> Chunker -> Embedder -> FlatIndex -> save
//!                                                                 |
//! Question -> Embedder -> Retriever -> FlatIndex::load <----------+
//!                             |
//!                     [character] text ...
//! ```
//!
//! # Example
//!
//! ```ignore
//! use buildrag_lib::{embed::MiniLmEmbedder, ingest::PipelineConfig, search::Retriever};
//!
//! let embedder = MiniLmEmbedder::new()?;
//!
//! // Build the index once
//! PipelineConfig::default()
//!     .ingestor()?
//!     .run(&embedder, "data/raw", "embeddings/index")?;
//!
//! // Answer questions from it
//! let retriever = Retriever::open(embedder, "embeddings/index")?;
//! let hits = retriever.retrieve("Best artifacts for Hu Tao?", 4)?;
//! ```

pub mod chunk;
pub mod corpus;
pub mod embed;
pub mod error;
pub mod ingest;
pub mod search;
pub mod store;

pub use error::{Error, Result};
