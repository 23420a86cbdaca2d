//! Nearest-neighbor vector index trait.
//!
//! The store talks to its two indices (trajectory-level and step-level)
//! only through this interface, so the brute-force [`FlatIndex`] can be
//! replaced by an approximate index without touching store logic.

pub mod flat;

pub use flat::FlatIndex;

use hindsight_types::error::IndexError;
use hindsight_types::index::IndexSnapshot;

/// In-memory nearest-neighbor index keyed by `K`.
///
/// Object safe: the store holds indices as `Box<dyn VectorIndex<K>>`.
pub trait VectorIndex<K>: Send + Sync {
    /// Dimensionality every stored vector must have.
    fn dimension(&self) -> usize;

    /// Insert vectors. Fails without modifying the index if any vector has
    /// the wrong dimension.
    fn add(&mut self, entries: Vec<(K, Vec<f32>)>) -> Result<(), IndexError>;

    /// Return up to `k` keys ranked by descending cosine similarity.
    fn search(&self, query: &[f32], k: usize) -> Vec<(K, f32)>;

    /// Keep only the entries whose key satisfies `keep`.
    fn retain(&mut self, keep: &mut dyn FnMut(&K) -> bool);

    /// Stored vector for `key`, if present.
    fn vector(&self, key: &K) -> Option<Vec<f32>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// Copy the index contents out for persistence.
    fn snapshot(&self) -> IndexSnapshot<K>;
}
