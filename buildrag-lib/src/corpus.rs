//! Raw document corpus
//!
//! The scraper leaves one `<Character>.txt` per character in a raw-data
//! directory. The file stem becomes the character tag on every chunk cut
//! from that file.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::{Error, Result};

/// A scraped build guide for one character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Character identifier, the file name without `.txt`
    pub id: String,
    /// Source file name
    pub source: String,
    /// Raw, un-normalized text
    pub text: String,
}

impl Document {
    /// Read a single `.txt` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::corpus(path, "file name is not valid UTF-8"))?
            .to_string();
        let source = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(&id)
            .to_string();
        let text = fs::read_to_string(path).map_err(|e| Error::corpus(path, e))?;

        Ok(Self { id, source, text })
    }
}

/// Load every `*.txt` document in `dir`, ordered by file name.
///
/// Other files and subdirectories are skipped.
pub fn load_corpus(dir: impl AsRef<Path>) -> Result<Vec<Document>> {
    let dir = dir.as_ref();
    let listing = fs::read_dir(dir).map_err(|e| Error::corpus(dir, e))?;

    let mut paths = Vec::new();
    for entry in listing {
        let path = entry.map_err(|e| Error::corpus(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
            paths.push(path);
        } else {
            debug!(path = %path.display(), "skipping non-document entry");
        }
    }
    paths.sort();

    let documents = paths
        .iter()
        .map(Document::from_path)
        .collect::<Result<Vec<_>>>()?;
    info!(dir = %dir.display(), documents = documents.len(), "loaded corpus");
    Ok(documents)
}
