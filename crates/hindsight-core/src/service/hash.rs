//! ContentHasher trait for content-addressing code artifacts.
//!
//! Defined in hindsight-core so extraction and validation can hash content
//! without coupling to a specific algorithm. The `Sha256ContentHasher`
//! adapter lives in hindsight-infra.

/// Abstraction over content hashing.
///
/// Used to content-address artifacts at extraction time, to detect
/// unchanged files at validation time, and to fingerprint the embedder.
pub trait ContentHasher: Send + Sync {
    /// Compute a hex-encoded hash of the given content.
    fn compute_hash(&self, content: &str) -> String;
}
