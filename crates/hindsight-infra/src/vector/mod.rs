//! Embedder adapters.
//!
//! `HashingEmbedder` is deterministic and dependency-free at runtime, for
//! offline use and tests. `FastEmbedder` (cargo feature `fastembed`) runs a
//! local ONNX sentence embedding model.

pub mod hashing;

#[cfg(feature = "fastembed")]
pub mod fastembed;

pub use hashing::HashingEmbedder;

#[cfg(feature = "fastembed")]
pub use self::fastembed::FastEmbedder;
