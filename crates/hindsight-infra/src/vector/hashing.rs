//! Feature-hashing embedder.
//!
//! Each lowercase alphanumeric token is hashed with SHA-256; the first eight
//! digest bytes pick a bucket and the next byte a sign. Counts are
//! L2-normalized. Lexical rather than semantic, but fully deterministic,
//! which is all the store's fingerprinting requires.

use sha2::{Digest, Sha256};

use hindsight_core::embedder::Embedder;
use hindsight_types::error::EmbedError;

/// Default number of buckets.
pub const DEFAULT_DIMENSION: usize = 256;

pub struct HashingEmbedder {
    dimension: usize,
    model_name: String,
}

impl HashingEmbedder {
    /// Embedder with `dimension` buckets. Zero is bumped to one.
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model_name: format!("feature-hash-v1-{dimension}"),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_vectors_are_normalized_and_sized() {
        let embedder = HashingEmbedder::new(64);
        let vectors = embedder
            .embed(&["Fix the failing build".to_string(), String::new()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 64);
        assert!((cosine(&vectors[0], &vectors[0]) - 1.0).abs() < 1e-5);
        // Empty text stays the zero vector
        assert!(vectors[1].iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_deterministic_and_case_insensitive() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed_single("Parse JSON config").await.unwrap();
        let b = embedder.embed_single("parse json CONFIG").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(embedder.model_name(), "feature-hash-v1-256");
    }

    #[tokio::test]
    async fn test_shared_words_raise_similarity() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed_single("deploy docker container").await.unwrap();
        let close = embedder.embed_single("deploy the docker container to staging").await.unwrap();
        let far = embedder.embed_single("sort a list of integers").await.unwrap();
        assert!(cosine(&query, &close) > cosine(&query, &far));
    }
}
