//! SHA-256 content addressing for code artifacts.
//!
//! A write artifact records the digest of the whole file it produced, and
//! the persistence validator later compares that digest with the digest of
//! the file on disk: equal digests mean the change is still intact without
//! any line comparison. The same hasher digests the embedding of the
//! fingerprint probe text, so a changed embedding model is detected on open.

use sha2::{Digest, Sha256};

use hindsight_core::service::hash::ContentHasher;

/// Lowercase hex SHA-256 of the exact UTF-8 bytes.
///
/// No normalization is applied: a file that only gained a trailing newline
/// no longer matches its artifact digest and falls through to line-level
/// validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256ContentHasher;

impl Sha256ContentHasher {
    pub fn new() -> Self {
        Self
    }
}

impl ContentHasher for Sha256ContentHasher {
    fn compute_hash(&self, content: &str) -> String {
        hex_digest(content.as_bytes())
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use hindsight_core::embedder::{BoxEmbedder, fingerprint};

    use crate::vector::HashingEmbedder;

    const LOADER: &str = "def load_config(path):\n    return parse(path)\n";

    #[test]
    fn test_artifact_digest_matches_known_value() {
        assert_eq!(
            Sha256ContentHasher::new().compute_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_unchanged_file_matches_artifact_digest() {
        let hasher = Sha256ContentHasher::new();
        let recorded = hasher.compute_hash(LOADER);
        let on_disk = String::from(LOADER);
        assert_eq!(recorded, hasher.compute_hash(&on_disk));
        assert_eq!(recorded.len(), 64);
    }

    #[test]
    fn test_trailing_newline_breaks_digest_match() {
        let hasher = Sha256ContentHasher::new();
        let recorded = hasher.compute_hash(LOADER);
        assert_ne!(recorded, hasher.compute_hash(&format!("{LOADER}\n")));
        assert_ne!(recorded, hasher.compute_hash(LOADER.trim_end()));
    }

    #[tokio::test]
    async fn test_fingerprint_digest_tracks_embedder_dimension() {
        let hasher = Sha256ContentHasher::new();
        let small = fingerprint(&BoxEmbedder::new(HashingEmbedder::new(32)), &hasher)
            .await
            .unwrap();
        let again = fingerprint(&BoxEmbedder::new(HashingEmbedder::new(32)), &hasher)
            .await
            .unwrap();
        let large = fingerprint(&BoxEmbedder::new(HashingEmbedder::new(64)), &hasher)
            .await
            .unwrap();

        assert_eq!(small, again);
        assert_ne!(small.probe_digest, large.probe_digest);
        assert!(small.probe_digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
