//! Persisted forms of the vector indices and the embedder fingerprint.
//!
//! Both are rebuildable caches: losing or corrupting them only costs a
//! re-embedding on the next open.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Granularity of a vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// One vector per trajectory (goal + plan).
    Trajectories,
    /// One vector per step (observation + reasoning).
    Steps,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Trajectories => write!(f, "trajectories"),
            IndexKind::Steps => write!(f, "steps"),
        }
    }
}

/// Serializable contents of a flat vector index.
///
/// `vectors` is row-major: entry `i` occupies
/// `vectors[i * dimension..(i + 1) * dimension]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot<K> {
    pub dimension: usize,
    pub ids: Vec<K>,
    pub vectors: Vec<f32>,
}

impl<K> IndexSnapshot<K> {
    pub fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    /// Whether the blob length agrees with the id count and dimension.
    pub fn is_well_formed(&self) -> bool {
        self.vectors.len() == self.ids.len() * self.dimension
    }

    /// Keep only the rows whose id satisfies `keep`, preserving order.
    ///
    /// A malformed snapshot is left untouched.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&K) -> bool) {
        if !self.is_well_formed() || self.dimension == 0 {
            return;
        }
        let dimension = self.dimension;
        let mut vectors = Vec::with_capacity(self.vectors.len());
        let ids = std::mem::take(&mut self.ids);
        self.ids = ids
            .into_iter()
            .zip(self.vectors.chunks(dimension))
            .filter(|(id, _)| keep(id))
            .map(|(id, row)| {
                vectors.extend_from_slice(row);
                id
            })
            .collect();
        self.vectors = vectors;
    }
}

/// Identity of the embedding model that produced the persisted vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedderFingerprint {
    pub model_name: String,
    pub dimension: usize,
    /// Content hash of the embedding of a fixed probe text.
    pub probe_digest: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_kind_display() {
        assert_eq!(IndexKind::Trajectories.to_string(), "trajectories");
        assert_eq!(IndexKind::Steps.to_string(), "steps");
    }

    #[test]
    fn test_retain_rows_keeps_matching_rows_in_order() {
        let mut snapshot = IndexSnapshot {
            dimension: 2,
            ids: vec!["a", "b", "c"],
            vectors: vec![1.0, 0.0, 0.0, 1.0, 0.6, 0.8],
        };
        snapshot.retain_rows(|id| *id != "b");
        assert_eq!(snapshot.ids, vec!["a", "c"]);
        assert_eq!(snapshot.vectors, vec![1.0, 0.0, 0.6, 0.8]);
        assert!(snapshot.is_well_formed());
    }

    #[test]
    fn test_snapshot_shape_check() {
        let good = IndexSnapshot {
            dimension: 2,
            ids: vec!["a", "b"],
            vectors: vec![1.0, 0.0, 0.0, 1.0],
        };
        assert!(good.is_well_formed());

        let truncated = IndexSnapshot {
            dimension: 2,
            ids: vec!["a", "b"],
            vectors: vec![1.0, 0.0, 0.0],
        };
        assert!(!truncated.is_well_formed());
        assert!(IndexSnapshot::<String>::empty(8).is_well_formed());
    }
}
