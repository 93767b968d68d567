//! buildrag CLI - build and query the character guide index
//!
//! # Commands
//!
//! ```bash
//! # Chunk, embed and index every guide in data/raw
//! buildrag ingest
//!
//! # Ask one question, or start an interactive session without one
//! buildrag query "Best weapon for Hu Tao?"
//! buildrag query
//!
//! # Inspect the chunker or the embedder on their own
//! buildrag chunk data/raw/HuTao.txt --size 200 --overlap 40
//! buildrag embed "Crimson Witch of Flames"
//! ```

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use buildrag_lib::{
    chunk::{normalize, ChunkMetadata, Chunker, RecursiveChunker},
    embed::{Embedder, HashEmbedder, MiniLmEmbedder},
    ingest::PipelineConfig,
    search::{render_context, Retriever},
    store::{Metric, SharedIndex, VectorStore},
    Error,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "buildrag")]
#[command(about = "Retrieval over character build guides")]
#[command(version)]
struct Cli {
    /// Embedding backend; an index must be queried with the backend that built it
    #[arg(
        long,
        value_enum,
        env = "BUILDRAG_EMBEDDER",
        default_value_t = EmbedderKind::Minilm,
        global = true
    )]
    embedder: EmbedderKind,

    /// Seconds to wait for the embedding model before giving up
    #[arg(long, default_value_t = 60, global = true)]
    embed_timeout_secs: u64,

    /// JSON file with pipeline settings (chunk_size, overlap, batch_size, top_k, metric)
    #[arg(long, env = "BUILDRAG_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    /// sentence-transformers/all-MiniLM-L6-v2 (downloads ~90MB on first run)
    Minilm,
    /// Feature-hashing bag of words, no model needed
    Hash,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from the raw guides
    Ingest {
        /// Directory of <Character>.txt guides
        #[arg(long, env = "BUILDRAG_DATA_DIR", default_value = "data/raw")]
        data_dir: PathBuf,

        /// Where the index is written
        #[arg(long, env = "BUILDRAG_INDEX_DIR", default_value = "embeddings/index")]
        index_dir: PathBuf,

        /// Maximum chunk length in characters
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters shared by consecutive chunks
        #[arg(long)]
        overlap: Option<usize>,

        /// Chunks per embedding call
        #[arg(long)]
        batch_size: Option<usize>,

        /// Similarity measure: "cosine" or "euclidean"
        #[arg(long)]
        metric: Option<Metric>,
    },

    /// Retrieve guide passages for a question
    Query {
        /// Question to answer; omit for an interactive session
        question: Option<String>,

        /// Index built by `ingest`
        #[arg(long, env = "BUILDRAG_INDEX_DIR", default_value = "embeddings/index")]
        index_dir: PathBuf,

        /// Number of chunks to retrieve
        #[arg(short, long)]
        k: Option<usize>,

        /// Print the prompt context block instead of ranked results
        #[arg(long)]
        context: bool,
    },

    /// Chunk a single guide and show the result
    Chunk {
        /// Input file to chunk
        input: PathBuf,

        /// Maximum chunk length in characters
        #[arg(long, default_value_t = RecursiveChunker::DEFAULT_MAX_SIZE)]
        size: usize,

        /// Characters shared by consecutive chunks
        #[arg(long, default_value_t = RecursiveChunker::DEFAULT_OVERLAP)]
        overlap: usize,
    },

    /// Embed text and show vector info
    Embed {
        /// Text to embed
        text: String,
    },
}

fn load_embedder(kind: EmbedderKind, timeout: Duration) -> Result<Box<dyn Embedder>> {
    match kind {
        EmbedderKind::Minilm => {
            println!("Loading MiniLM model (first run downloads ~90MB)...");
            let embedder = MiniLmEmbedder::with_timeout(timeout)?;
            Ok(Box::new(embedder))
        }
        EmbedderKind::Hash => Ok(Box::new(HashEmbedder::default())),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn preview(text: &str, max: usize) -> String {
    let mut out: String = text.chars().take(max).collect();
    if text.chars().count() > max {
        out.push_str("...");
    }
    out
}

fn print_results<S: VectorStore>(
    retriever: &Retriever<Box<dyn Embedder>, S>,
    question: &str,
    k: usize,
    context: bool,
) -> Result<()> {
    if context {
        let chunks = retriever.retrieve(question, k)?;
        println!("{}", render_context(&chunks));
        return Ok(());
    }

    let results = retriever.search(question, k)?;
    if results.is_empty() {
        println!("No matching passages.");
    }
    for (i, result) in results.iter().enumerate() {
        let meta = &result.chunk.metadata;
        println!(
            "#{} [{}] {} (score: {:.4})",
            i + 1,
            meta.character,
            meta.source,
            result.score
        );
        println!("---");
        println!("{}\n", preview(&result.chunk.content, 300));
    }
    Ok(())
}

fn interactive(
    retriever: &Retriever<Box<dyn Embedder>, SharedIndex>,
    index_dir: &Path,
    k: usize,
    context: bool,
) -> Result<()> {
    println!(
        "Loaded {} chunks. Ask about a build, `reload` after re-ingesting, `exit` to quit.",
        retriever.len()
    );

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\n> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let question = line.trim();

        match question {
            "" => continue,
            "exit" | "quit" | "q" => break,
            "reload" => match retriever.reload(index_dir) {
                Ok(()) => println!("Reloaded {} chunks.", retriever.len()),
                Err(e) => eprintln!("Reload failed, keeping the current index: {e}"),
            },
            _ => {
                if let Err(e) = print_results(retriever, question, k, context) {
                    eprintln!("Error: {e}");
                }
            }
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let timeout = Duration::from_secs(cli.embed_timeout_secs);

    match cli.command {
        Commands::Ingest {
            data_dir,
            index_dir,
            chunk_size,
            overlap,
            batch_size,
            metric,
        } => {
            let config = PipelineConfig {
                chunk_size: chunk_size.unwrap_or(config.chunk_size),
                overlap: overlap.unwrap_or(config.overlap),
                batch_size: batch_size.unwrap_or(config.batch_size),
                metric: metric.unwrap_or(config.metric),
                ..config
            };
            let ingestor = config.ingestor()?;
            let embedder = load_embedder(cli.embedder, timeout)?;

            println!("Indexing guides in '{}'...", data_dir.display());
            let report = ingestor.run(&embedder, &data_dir, &index_dir)?;
            println!(
                "Done! Indexed {} chunks from {} guides ({} dimensions) into '{}'",
                report.chunks,
                report.documents,
                report.dimension,
                index_dir.display()
            );
        }

        Commands::Query {
            question,
            index_dir,
            k,
            context,
        } => {
            let k = k.unwrap_or(config.top_k);
            let index = SharedIndex::open(&index_dir)?;
            let embedder = load_embedder(cli.embedder, timeout)?;
            let retriever = Retriever::new(embedder, index)?;
            info!(chunks = retriever.len(), k, "retriever ready");

            match question {
                Some(question) => print_results(&retriever, &question, k, context)?,
                None => interactive(&retriever, &index_dir, k, context)?,
            }
        }

        Commands::Chunk {
            input,
            size,
            overlap,
        } => {
            let raw = fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let character = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let source = input
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            let chunker = RecursiveChunker::try_new(size, overlap)?;
            let chunks = chunker.chunk(
                &normalize(&raw),
                ChunkMetadata::for_document(character, source),
            );

            println!(
                "Chunked '{}' into {} chunks (max {size}, overlap {overlap}):\n",
                input.display(),
                chunks.len()
            );
            for chunk in &chunks {
                println!(
                    "--- Chunk {} ({} chars at {}, id: {}) ---",
                    chunk.metadata.ordinal + 1,
                    chunk.content.chars().count(),
                    chunk.metadata.offset,
                    chunk.id
                );
                println!("{}\n", preview(&chunk.content, 200));
            }
        }

        Commands::Embed { text } => {
            let embedder = load_embedder(cli.embedder, timeout)?;
            let embedding = embedder.embed_one(&text)?;

            println!("Embedding '{text}' with {}", embedder.model_name());
            println!("\nEmbedding stats:");
            println!("  Dimensions: {}", embedding.len());
            println!(
                "  First 5 values: {:?}",
                embedding.iter().take(5).collect::<Vec<_>>()
            );
            println!("  Min: {:.4}", embedding.iter().copied().fold(f32::INFINITY, f32::min));
            println!("  Max: {:.4}", embedding.iter().copied().fold(f32::NEG_INFINITY, f32::max));
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    // Logs go to stderr so query output can be piped
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        if let Some(Error::IndexNotFound(path)) = err.downcast_ref::<Error>() {
            eprintln!(
                "Index not found at '{}'. Please run `buildrag ingest` first.",
                path.display()
            );
            process::exit(1);
        }
        return Err(err);
    }
    Ok(())
}
