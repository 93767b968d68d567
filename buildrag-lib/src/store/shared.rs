use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::store::{FlatIndex, IndexHeader, SearchResult, VectorStore};
use crate::Result;

/// Swappable handle to a loaded index.
///
/// Readers grab an `Arc` snapshot and search it without holding the lock;
/// [`replace`](SharedIndex::replace) and [`reload`](SharedIndex::reload) swap
/// in a whole new index. A search that started before a swap finishes against
/// the index it started with.
#[derive(Debug)]
pub struct SharedIndex {
    current: RwLock<Arc<FlatIndex>>,
}

impl SharedIndex {
    #[must_use]
    pub fn new(index: FlatIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    /// Load the index at `location`.
    pub fn open(location: impl AsRef<Path>) -> Result<Self> {
        FlatIndex::load(location).map(Self::new)
    }

    /// The index currently being served.
    #[must_use]
    pub fn snapshot(&self) -> Arc<FlatIndex> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap in `index`, returning the one it replaced.
    pub fn replace(&self, index: FlatIndex) -> Arc<FlatIndex> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, Arc::new(index))
    }

    /// Load the index at `location` and swap it in.
    ///
    /// The load happens before the lock is taken; on failure the current
    /// index keeps serving.
    pub fn reload(&self, location: impl AsRef<Path>) -> Result<()> {
        let index = FlatIndex::load(location.as_ref())?;
        let entries = index.len();
        self.replace(index);
        info!(location = %location.as_ref().display(), entries, "reloaded vector index");
        Ok(())
    }
}

impl VectorStore for SharedIndex {
    fn header(&self) -> IndexHeader {
        self.snapshot().header().clone()
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.snapshot().search(query, k)
    }

    fn len(&self) -> usize {
        self.snapshot().len()
    }
}
