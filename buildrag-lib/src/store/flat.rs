use std::cmp::Ordering;

use tracing::info;

use crate::store::{IndexEntry, IndexHeader, SearchResult, VectorStore};
use crate::{Error, Result};

/// Exact, in-memory vector index.
///
/// Brute-force scan over every entry. Entries are fixed at [`build`] time and
/// never change afterwards, so any number of threads may search one index
/// without locking.
///
/// [`build`]: FlatIndex::build
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    header: IndexHeader,
    entries: Vec<IndexEntry>,
}

impl FlatIndex {
    /// Build an index from entries, keeping their order.
    ///
    /// Fails with [`Error::DimensionMismatch`] on the first vector whose length
    /// differs from `header.dimension`. Zero entries is a valid, empty index.
    pub fn build(header: IndexHeader, entries: Vec<IndexEntry>) -> Result<Self> {
        if header.dimension == 0 {
            return Err(Error::InvalidConfig(
                "index dimension must be positive".to_string(),
            ));
        }

        if let Some(bad) = entries.iter().find(|e| e.vector.len() != header.dimension) {
            return Err(Error::DimensionMismatch {
                expected: header.dimension,
                actual: bad.vector.len(),
            });
        }

        info!(
            entries = entries.len(),
            dimension = header.dimension,
            metric = %header.metric,
            model = %header.model,
            "built vector index"
        );
        Ok(Self { header, entries })
    }

    #[must_use]
    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    /// Entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-`k` entries by descending score, ties in insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.header.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.header.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let metric = self.header.metric;
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, metric.score(query, &entry.vector)))
            .collect();

        // (score desc, position asc) is a total order, so partial selection is safe
        let by_rank = |a: &(usize, f32), b: &(usize, f32)| -> Ordering {
            b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
        };
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_rank);
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_rank);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchResult {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }
}

impl VectorStore for FlatIndex {
    fn header(&self) -> IndexHeader {
        self.header.clone()
    }

    fn dimension(&self) -> usize {
        self.header.dimension
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        FlatIndex::search(self, query, k)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunk, ChunkMetadata};
    use crate::store::Metric;

    fn make_chunk(id: &str, content: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            content: content.to_string(),
            metadata: ChunkMetadata::for_document("HuTao", "HuTao.txt"),
        }
    }

    fn make_index(dimension: usize, items: Vec<(&str, Vec<f32>)>) -> FlatIndex {
        let entries = items
            .into_iter()
            .map(|(id, v)| IndexEntry::new(make_chunk(id, id), v))
            .collect();
        FlatIndex::build(IndexHeader::new("test", dimension, Metric::Cosine), entries).unwrap()
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.chunk.id.as_str()).collect()
    }

    #[test]
    fn test_build_and_len() {
        let index = make_index(2, vec![("1", vec![1.0, 0.0]), ("2", vec![0.0, 1.0])]);
        assert_eq!(index.len(), 2);
        assert!(!index.is_empty());
        assert_eq!(VectorStore::dimension(&index), 2);
    }

    #[test]
    fn test_build_rejects_mismatched_dimension() {
        let entries = vec![
            IndexEntry::new(make_chunk("1", "a"), vec![1.0, 0.0, 0.0]),
            IndexEntry::new(make_chunk("2", "b"), vec![1.0, 0.0]),
        ];
        let err = FlatIndex::build(IndexHeader::new("test", 3, Metric::Cosine), entries)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_build_rejects_zero_dimension() {
        let err = FlatIndex::build(IndexHeader::new("test", 0, Metric::Cosine), Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_search_returns_sorted() {
        // Query will be [1, 0, 0]
        let index = make_index(
            3,
            vec![
                ("1", vec![0.0, 1.0, 0.0]), // orthogonal to query
                ("2", vec![1.0, 0.0, 0.0]), // identical to query
                ("3", vec![0.5, 0.5, 0.0]), // somewhat similar
            ],
        );

        let results = index.search(&[1.0, 0.0, 0.0], 3).unwrap();

        assert_eq!(ids(&results), vec!["2", "3", "1"]);
        for window in results.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
    }

    #[test]
    fn test_search_respects_k() {
        let index = make_index(
            2,
            vec![
                ("1", vec![1.0, 0.0]),
                ("2", vec![0.9, 0.1]),
                ("3", vec![0.8, 0.2]),
            ],
        );

        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(ids(&results), vec!["1", "2"]);
    }

    #[test]
    fn test_search_k_zero() {
        let index = make_index(2, vec![("1", vec![1.0, 0.0])]);
        assert!(index.search(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_k_larger_than_store() {
        let index = make_index(
            2,
            vec![("1", vec![1.0, 0.0]), ("2", vec![0.0, 1.0]), ("3", vec![1.0, 1.0])],
        );

        let results = index.search(&[1.0, 0.0], 100).unwrap();

        let mut seen = ids(&results);
        seen.sort_unstable();
        assert_eq!(seen, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = make_index(
            2,
            vec![
                ("b", vec![0.0, 1.0]),
                ("first", vec![2.0, 0.0]),
                ("second", vec![1.0, 0.0]),
                ("third", vec![3.0, 0.0]),
            ],
        );

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(ids(&results), vec!["first", "second", "third"]);

        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(ids(&results), vec!["first", "second"]);
    }

    #[test]
    fn test_search_rejects_mismatched_query() {
        let index = make_index(3, vec![("1", vec![1.0, 0.0, 0.0])]);
        let err = index.search(&[1.0, 0.0], 1).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_empty_search() {
        let index = make_index(2, Vec::new());
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_euclidean_ranking() {
        let entries = vec![
            IndexEntry::new(make_chunk("far", "far"), vec![10.0, 10.0]),
            IndexEntry::new(make_chunk("near", "near"), vec![1.1, 1.0]),
            // same direction as the query but far away: cosine would rank it first
            IndexEntry::new(make_chunk("scaled", "scaled"), vec![5.0, 5.0]),
        ];
        let index =
            FlatIndex::build(IndexHeader::new("test", 2, Metric::Euclidean), entries).unwrap();

        let results = index.search(&[1.0, 1.0], 3).unwrap();
        assert_eq!(ids(&results), vec!["near", "scaled", "far"]);
    }

    #[test]
    fn test_concurrent_searches() {
        let index = make_index(
            2,
            vec![("1", vec![1.0, 0.0]), ("2", vec![0.0, 1.0]), ("3", vec![0.7, 0.7])],
        );
        let expected = index.search(&[1.0, 0.2], 3).unwrap();

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| index.search(&[1.0, 0.2], 3).unwrap()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }
}
