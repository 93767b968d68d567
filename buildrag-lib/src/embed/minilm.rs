use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{debug, info};

use crate::embed::{validate_batch, Embedder, Embedding};
use crate::{Error, Result};

const MODEL_NAME: &str = "sentence-transformers/all-MiniLM-L6-v2";

struct EmbedRequest {
    texts: Vec<String>,
    reply: mpsc::Sender<Result<Vec<Embedding>>>,
}

/// MiniLM embedder using sentence-transformers/all-MiniLM-L6-v2.
///
/// Uses fastembed for ONNX-based inference. This model produces 384-dimensional
/// embeddings and supports up to 256 word pieces per input.
///
/// The model is owned by a dedicated worker thread; callers talk to it over a
/// channel and give up after the configured timeout. Texts are run through the
/// model one at a time so padding never depends on what else is in the batch.
pub struct MiniLmEmbedder {
    sender: mpsc::Sender<EmbedRequest>,
    dimension: usize,
    timeout: Duration,
}

impl MiniLmEmbedder {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Create a new MiniLM embedder with the default timeout.
    ///
    /// Downloads the model on first use (~90MB).
    pub fn new() -> Result<Self> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    /// Create a new MiniLM embedder that waits at most `timeout` per request,
    /// including the dimension check at startup.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let opts = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(true);
        Self::from_options(opts, timeout)
    }

    /// Create an embedder from explicit fastembed options (e.g. a cache dir).
    pub fn from_options(opts: InitOptions, timeout: Duration) -> Result<Self> {
        let mut model = TextEmbedding::try_new(opts)
            .map_err(|e| Error::ModelUnavailable(format!("failed to load {MODEL_NAME}: {e}")))?;

        Self::spawn(
            move |texts: &[&str]| {
                model.embed(texts.to_vec(), Some(1)).map_err(|e| {
                    Error::ModelUnavailable(format!("{MODEL_NAME} inference failed: {e}"))
                })
            },
            timeout,
        )
    }

    /// Start the worker around `backend` and measure its dimension.
    fn spawn<B>(backend: B, timeout: Duration) -> Result<Self>
    where
        B: FnMut(&[&str]) -> Result<Vec<Embedding>> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        thread::Builder::new()
            .name("minilm-embedder".to_string())
            .spawn(move || run_worker(backend, receiver))
            .map_err(|e| {
                Error::ModelUnavailable(format!("failed to start embedding worker: {e}"))
            })?;

        let mut embedder = Self {
            sender,
            dimension: 0,
            timeout,
        };
        embedder.dimension = embedder
            .request(vec!["dimension check".to_string()])?
            .first()
            .map(Vec::len)
            .ok_or_else(|| Error::ModelUnavailable("model returned no embeddings".to_string()))?;

        info!(model = MODEL_NAME, dimension = embedder.dimension, "embedding model ready");
        Ok(embedder)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn request(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        let expected = texts.len();
        let (reply, response) = mpsc::channel();
        self.sender
            .send(EmbedRequest { texts, reply })
            .map_err(|_| Error::ModelUnavailable("embedding worker has stopped".to_string()))?;

        let embeddings = match response.recv_timeout(self.timeout) {
            Ok(result) => result?,
            Err(RecvTimeoutError::Timeout) => {
                return Err(Error::ModelUnavailable(format!(
                    "{MODEL_NAME} did not answer within {:?}",
                    self.timeout
                )))
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::ModelUnavailable(
                    "embedding worker stopped mid-request".to_string(),
                ))
            }
        };

        if embeddings.len() != expected {
            return Err(Error::ModelUnavailable(format!(
                "model returned {} embeddings for {expected} texts",
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }
}

impl Embedder for MiniLmEmbedder {
    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_many(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        validate_batch(texts)?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.request(texts.iter().map(|t| t.to_string()).collect())?;
        if let Some(bad) = embeddings.iter().find(|v| v.len() != self.dimension) {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }
        Ok(embeddings)
    }
}

fn run_worker<B>(mut backend: B, requests: mpsc::Receiver<EmbedRequest>)
where
    B: FnMut(&[&str]) -> Result<Vec<Embedding>>,
{
    for request in requests {
        debug!(texts = request.texts.len(), "embedding batch");
        let refs: Vec<&str> = request.texts.iter().map(String::as_str).collect();
        let result = backend(&refs);

        // the caller may have timed out and dropped its receiver
        let _ = request.reply.send(result);
    }
    debug!("embedding worker shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUB_DIM: usize = 4;

    fn stub_vectors(texts: &[&str]) -> Vec<Embedding> {
        texts.iter().map(|_| vec![0.5; STUB_DIM]).collect()
    }

    #[test]
    fn test_stub_backend_round_trip() {
        let embedder =
            MiniLmEmbedder::spawn(|texts: &[&str]| Ok(stub_vectors(texts)), Duration::from_secs(5))
                .unwrap();

        assert_eq!(embedder.dimension(), STUB_DIM);
        assert_eq!(embedder.embed_many(&["a", "b", "c"]).unwrap().len(), 3);
        assert!(embedder.embed_many(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_slow_model_times_out() {
        let embedder = MiniLmEmbedder::spawn(
            |texts: &[&str]| {
                if texts.iter().any(|t| t.contains("slow")) {
                    thread::sleep(Duration::from_millis(1000));
                }
                Ok(stub_vectors(texts))
            },
            Duration::from_millis(200),
        )
        .unwrap();

        assert!(matches!(
            embedder.embed_one("slow question"),
            Err(Error::ModelUnavailable(_))
        ));
        // once the slow request drains, the worker serves again
        thread::sleep(Duration::from_millis(1200));
        assert_eq!(embedder.embed_one("fast").unwrap().len(), STUB_DIM);
    }

    #[test]
    fn test_startup_check_uses_timeout() {
        let result = MiniLmEmbedder::spawn(
            |texts: &[&str]| {
                thread::sleep(Duration::from_millis(500));
                Ok(stub_vectors(texts))
            },
            Duration::from_millis(20),
        );
        assert!(matches!(result, Err(Error::ModelUnavailable(_))));
    }

    #[test]
    fn test_dead_worker_reports_unavailable() {
        let embedder = MiniLmEmbedder::spawn(
            |texts: &[&str]| {
                if texts.contains(&"boom") {
                    panic!("model crashed");
                }
                Ok(stub_vectors(texts))
            },
            Duration::from_secs(5),
        )
        .unwrap();

        assert!(matches!(
            embedder.embed_one("boom"),
            Err(Error::ModelUnavailable(_))
        ));
        assert!(matches!(
            embedder.embed_one("after the crash"),
            Err(Error::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_short_answer_is_an_error() {
        let embedder = MiniLmEmbedder::spawn(
            |texts: &[&str]| Ok(stub_vectors(&texts[..texts.len().min(1)])),
            Duration::from_secs(5),
        )
        .unwrap();

        assert!(matches!(
            embedder.embed_many(&["one", "two", "three"]),
            Err(Error::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_wrong_vector_length_is_an_error() {
        let embedder = MiniLmEmbedder::spawn(
            |texts: &[&str]| {
                Ok(texts
                    .iter()
                    .map(|t| if *t == "short" { vec![1.0; 3] } else { vec![1.0; STUB_DIM] })
                    .collect())
            },
            Duration::from_secs(5),
        )
        .unwrap();

        assert!(matches!(
            embedder.embed_one("short"),
            Err(Error::DimensionMismatch {
                expected: STUB_DIM,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_model_errors_pass_through() {
        let embedder = MiniLmEmbedder::spawn(
            |texts: &[&str]| {
                if texts.contains(&"unsupported") {
                    return Err(Error::ModelUnavailable("inference failed".to_string()));
                }
                Ok(stub_vectors(texts))
            },
            Duration::from_secs(5),
        )
        .unwrap();

        let err = embedder.embed_one("unsupported").unwrap_err();
        assert!(err.to_string().contains("inference failed"));
    }

    #[test]
    #[ignore] // Requires model download, run with: cargo test -- --ignored
    fn test_dimension_is_384() {
        let embedder = MiniLmEmbedder::new().unwrap();
        assert_eq!(embedder.dimension(), 384);
        assert_eq!(embedder.embed_one("Hu Tao").unwrap().len(), 384);
    }

    #[test]
    #[ignore] // Requires model download
    fn test_batch_grouping_is_deterministic() {
        let embedder = MiniLmEmbedder::new().unwrap();
        let texts = ["Hu Tao is a Pyro character.", "She uses a polearm.", "Staff of Homa"];

        let whole = embedder.embed_many(&texts).unwrap();
        let singles: Vec<_> = texts.iter().map(|t| embedder.embed_one(t).unwrap()).collect();

        assert_eq!(whole, singles);
    }
}
