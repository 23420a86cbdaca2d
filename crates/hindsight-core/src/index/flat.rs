//! Brute-force cosine index.
//!
//! Vectors are L2-normalized on insert and queries on search, so cosine
//! similarity reduces to a dot product. Search is a full scan.

use std::cmp::Ordering;

use hindsight_types::error::IndexError;
use hindsight_types::index::IndexSnapshot;

use super::VectorIndex;

/// Flat (exhaustive) vector index.
#[derive(Debug, Clone)]
pub struct FlatIndex<K> {
    dimension: usize,
    ids: Vec<K>,
    /// Row-major, `ids.len() * dimension` normalized components.
    vectors: Vec<f32>,
}

impl<K: Clone + PartialEq + Send + Sync> FlatIndex<K> {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    /// Restore an index from a persisted snapshot.
    ///
    /// Rejects snapshots whose blob length disagrees with the id count, or
    /// whose dimension differs from `expected_dimension`.
    pub fn from_snapshot(
        snapshot: IndexSnapshot<K>,
        expected_dimension: usize,
    ) -> Result<Self, IndexError> {
        if snapshot.dimension != expected_dimension {
            return Err(IndexError::DimensionMismatch {
                expected: expected_dimension,
                actual: snapshot.dimension,
            });
        }
        if !snapshot.is_well_formed() {
            return Err(IndexError::ShapeMismatch(format!(
                "{} ids but {} components at dimension {}",
                snapshot.ids.len(),
                snapshot.vectors.len(),
                snapshot.dimension
            )));
        }

        // Snapshots hold normalized rows already; renormalizing is idempotent
        // and repairs hand-edited or foreign blobs.
        let mut vectors = snapshot.vectors;
        if snapshot.dimension > 0 {
            for row in vectors.chunks_mut(snapshot.dimension) {
                normalize(row);
            }
        }

        Ok(Self {
            dimension: snapshot.dimension,
            ids: snapshot.ids,
            vectors,
        })
    }

    /// Iterate over stored keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.ids.iter()
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dimension..(i + 1) * self.dimension]
    }
}

impl<K: Clone + PartialEq + Send + Sync> VectorIndex<K> for FlatIndex<K> {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn add(&mut self, entries: Vec<(K, Vec<f32>)>) -> Result<(), IndexError> {
        if let Some((_, bad)) = entries.iter().find(|(_, v)| v.len() != self.dimension) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        self.ids.reserve(entries.len());
        self.vectors.reserve(entries.len() * self.dimension);
        for (key, mut vector) in entries {
            normalize(&mut vector);
            self.ids.push(key);
            self.vectors.extend_from_slice(&vector);
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<(K, f32)> {
        if k == 0 || query.len() != self.dimension || self.ids.is_empty() {
            return Vec::new();
        }

        let mut query = query.to_vec();
        normalize(&mut query);

        let mut scored: Vec<(usize, f32)> = (0..self.ids.len())
            .map(|i| (i, dot(self.row(i), &query)))
            .collect();
        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| (self.ids[i].clone(), score))
            .collect()
    }

    fn retain(&mut self, keep: &mut dyn FnMut(&K) -> bool) {
        let dimension = self.dimension;
        let mut ids = Vec::with_capacity(self.ids.len());
        let mut vectors = Vec::with_capacity(self.vectors.len());
        for (i, id) in self.ids.drain(..).enumerate() {
            if keep(&id) {
                vectors.extend_from_slice(&self.vectors[i * dimension..(i + 1) * dimension]);
                ids.push(id);
            }
        }
        self.ids = ids;
        self.vectors = vectors;
    }

    fn vector(&self, key: &K) -> Option<Vec<f32>> {
        let i = self.ids.iter().position(|id| id == key)?;
        Some(self.row(i).to_vec())
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn clear(&mut self) {
        self.ids.clear();
        self.vectors.clear();
    }

    fn snapshot(&self) -> IndexSnapshot<K> {
        IndexSnapshot {
            dimension: self.dimension,
            ids: self.ids.clone(),
            vectors: self.vectors.clone(),
        }
    }
}

/// Scale to unit length in place. Zero vectors are left as-is.
fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
