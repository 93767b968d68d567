//! On-disk layout of a [`FlatIndex`]
//!
//! An index location is a directory holding two files:
//! - `index.json`: format version, header and the vectors in ordinal order
//! - `docstore.json`: the chunks, each tagged with the same ordinal
//!
//! Saving writes both into a staging directory next to the location, moves
//! the old index aside and renames the staging directory into place, so
//! readers never observe a half-written index. `location` is briefly absent
//! between the two renames.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chunk::Chunk;
use crate::embed::Embedding;
use crate::store::{FlatIndex, IndexEntry, IndexHeader};
use crate::{Error, Result};

const INDEX_FILE: &str = "index.json";
const DOCSTORE_FILE: &str = "docstore.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct IndexFileRef<'a> {
    format_version: u32,
    header: &'a IndexHeader,
    vectors: Vec<&'a [f32]>,
}

#[derive(Deserialize)]
struct IndexFile {
    format_version: u32,
    header: IndexHeader,
    vectors: Vec<Embedding>,
}

#[derive(Serialize)]
struct StoredChunkRef<'a> {
    ordinal: usize,
    chunk: &'a Chunk,
}

#[derive(Deserialize)]
struct StoredChunk {
    ordinal: usize,
    chunk: Chunk,
}

impl FlatIndex {
    /// Persist the index to the directory `location`, replacing any index
    /// already there.
    pub fn save(&self, location: impl AsRef<Path>) -> Result<()> {
        let location = location.as_ref();
        let parent = match location.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| Error::persistence(location, e))?;

        let staging = tempfile::Builder::new()
            .prefix(".buildrag-staging-")
            .tempdir_in(&parent)
            .map_err(|e| Error::persistence(location, e))?;

        let index = IndexFileRef {
            format_version: FORMAT_VERSION,
            header: self.header(),
            vectors: self.entries().iter().map(|e| e.vector.as_slice()).collect(),
        };
        let docstore: Vec<StoredChunkRef<'_>> = self
            .entries()
            .iter()
            .enumerate()
            .map(|(ordinal, e)| StoredChunkRef {
                ordinal,
                chunk: &e.chunk,
            })
            .collect();

        write_json(&staging.path().join(INDEX_FILE), &index)
            .map_err(|e| Error::persistence(location, e))?;
        write_json(&staging.path().join(DOCSTORE_FILE), &docstore)
            .map_err(|e| Error::persistence(location, e))?;

        swap_into_place(staging.path(), location, &parent)?;

        info!(
            location = %location.display(),
            entries = self.len(),
            "saved vector index"
        );
        Ok(())
    }

    /// Load an index previously written by [`save`](FlatIndex::save).
    pub fn load(location: impl AsRef<Path>) -> Result<Self> {
        let location = location.as_ref();
        if !location.exists() {
            return Err(Error::IndexNotFound(location.to_path_buf()));
        }

        let index: IndexFile = read_json(&location.join(INDEX_FILE))?;
        if index.format_version != FORMAT_VERSION {
            return Err(Error::corrupt(
                location,
                format!("unsupported format version {}", index.format_version),
            ));
        }
        if index.header.dimension == 0 {
            return Err(Error::corrupt(location, "index dimension is missing"));
        }

        let docstore: Vec<StoredChunk> = read_json(&location.join(DOCSTORE_FILE))?;
        if docstore.len() != index.vectors.len() {
            return Err(Error::corrupt(
                location,
                format!(
                    "{} vectors but {} stored chunks",
                    index.vectors.len(),
                    docstore.len()
                ),
            ));
        }

        let mut entries = Vec::with_capacity(docstore.len());
        for (expected, (stored, vector)) in docstore.into_iter().zip(index.vectors).enumerate() {
            if stored.ordinal != expected {
                return Err(Error::corrupt(
                    location,
                    format!("chunk ordinal {} found at position {expected}", stored.ordinal),
                ));
            }
            entries.push(IndexEntry::new(stored.chunk, vector));
        }

        let loaded = FlatIndex::build(index.header, entries).map_err(|e| match e {
            Error::DimensionMismatch { expected, actual } => Error::corrupt(
                location,
                format!("stored vector has dimension {actual}, header says {expected}"),
            ),
            other => other,
        })?;

        info!(
            location = %location.display(),
            entries = loaded.len(),
            "loaded vector index"
        );
        Ok(loaded)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| Error::corrupt(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::corrupt(path, e))
}

/// Move `staging` to `location`, restoring the previous index on failure.
///
/// The swap takes two renames: the old index moves aside into a retired
/// directory, then `staging` moves in. If the second rename fails and the
/// old index cannot be moved back, the retired directory is kept on disk and
/// its path is reported in the error.
fn swap_into_place(staging: &Path, location: &Path, parent: &Path) -> Result<()> {
    swap_into_place_with(staging, location, parent, |_| {})
}

fn swap_into_place_with(
    staging: &Path,
    location: &Path,
    parent: &Path,
    before_install: impl FnOnce(&Path),
) -> Result<()> {
    // dropping `retired` deletes whatever index used to live at `location`
    let retired = tempfile::Builder::new()
        .prefix(".buildrag-retired-")
        .tempdir_in(parent)
        .map_err(|e| Error::persistence(location, e))?;
    let previous = retired.path().join("previous");

    let had_previous = location.exists();
    if had_previous {
        fs::rename(location, &previous).map_err(|e| Error::persistence(location, e))?;
    }

    before_install(location);
    let install_err = match fs::rename(staging, location) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    if !had_previous {
        return Err(Error::persistence(location, install_err));
    }

    match fs::rename(&previous, location) {
        Ok(()) => Err(Error::persistence(location, install_err)),
        Err(restore_err) => {
            let kept = retired.keep().join("previous");
            warn!(kept = %kept.display(), "could not restore previous index");
            Err(Error::persistence(
                location,
                format!(
                    "{install_err}; restoring the previous index also failed ({restore_err}), \
                     it was kept at {}",
                    kept.display()
                ),
            ))
        }
    }
}
