//! Embedder trait for text-to-vector conversion.
//!
//! Defines the interface for embedding text into vectors for semantic search.
//! Implementations (feature hashing, local ONNX models) live in hindsight-infra.

pub mod box_embedder;

pub use box_embedder::BoxEmbedder;

use hindsight_types::error::EmbedError;
use hindsight_types::index::EmbedderFingerprint;

use crate::service::hash::ContentHasher;

/// Fixed text embedded to detect silent model changes between runs.
const FINGERPRINT_PROBE: &str =
    "hindsight embedder fingerprint probe: fix the failing test in src/lib.rs";

/// Trait for converting text into embedding vectors.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations must be deterministic for a given model version; the
/// store relies on that to decide whether persisted vectors are reusable.
pub trait Embedder: Send + Sync {
    /// Embed one or more texts into vectors.
    ///
    /// Returns one vector per input text. The store sends all of a
    /// trajectory's texts in a single call.
    fn embed(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, EmbedError>> + Send;

    /// Embed a single text. Delegates to [`Embedder::embed`].
    fn embed_single(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, EmbedError>> + Send {
        let texts = vec![text.to_string()];
        async move {
            let mut vectors = self.embed(&texts).await?;
            match (vectors.pop(), vectors.is_empty()) {
                (Some(vector), true) => Ok(vector),
                (last, _) => Err(EmbedError::CountMismatch {
                    expected: 1,
                    actual: vectors.len() + usize::from(last.is_some()),
                }),
            }
        }
    }

    /// The model name used for embeddings (e.g., "bge-small-en-v1.5").
    fn model_name(&self) -> &str;

    /// The dimensionality of the output vectors.
    fn dimension(&self) -> usize;
}

/// Compute the fingerprint of an embedder: model, dimension, and a digest of
/// its embedding of a fixed probe text.
pub async fn fingerprint<H: ContentHasher>(
    embedder: &BoxEmbedder,
    hasher: &H,
) -> Result<EmbedderFingerprint, EmbedError> {
    let probe = embedder.embed_single(FINGERPRINT_PROBE).await?;
    let rendered = probe
        .iter()
        .map(|v| format!("{v:.6}"))
        .collect::<Vec<_>>()
        .join(",");

    Ok(EmbedderFingerprint {
        model_name: embedder.model_name().to_string(),
        dimension: embedder.dimension(),
        probe_digest: hasher.compute_hash(&rendered),
    })
}


#[cfg(test)]
mod tests {
    use super::testing::{PlainHasher, WordEmbedder};
    use super::*;

    #[tokio::test]
    async fn test_fingerprint_is_deterministic() {
        let embedder = BoxEmbedder::new(WordEmbedder::new(16));
        let a = fingerprint(&embedder, &PlainHasher).await.unwrap();
        let b = fingerprint(&embedder, &PlainHasher).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.model_name, "word-test");
        assert_eq!(a.dimension, 16);
    }

    #[tokio::test]
    async fn test_fingerprint_changes_with_dimension() {
        let small = BoxEmbedder::new(WordEmbedder::new(16));
        let large = BoxEmbedder::new(WordEmbedder::new(32));
        let a = fingerprint(&small, &PlainHasher).await.unwrap();
        let b = fingerprint(&large, &PlainHasher).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_fingerprint_propagates_embedder_failure() {
        let mut inner = WordEmbedder::new(16);
        inner.fail = true;
        let embedder = BoxEmbedder::new(inner);
        assert!(matches!(
            fingerprint(&embedder, &PlainHasher).await,
            Err(EmbedError::Provider(_))
        ));
    }
}
