//! FastEmbed-based local embedding generator.
//!
//! Implements the `Embedder` trait from `hindsight-core` using fastembed's
//! BGESmallENV15 model (384 dimensions) with ONNX runtime inference.
//! Inference is CPU-bound, so it runs on tokio's blocking pool.

use std::sync::{Arc, Mutex};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use hindsight_core::embedder::Embedder;
use hindsight_types::error::EmbedError;

const MODEL_NAME: &str = "bge-small-en-v1.5";
const DIMENSION: usize = 384;

/// Local ONNX sentence embedder.
pub struct FastEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastEmbedder {
    /// Load the model, downloading it into fastembed's cache on first use.
    pub fn new() -> Result<Self, EmbedError> {
        let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::BGESmallENV15))
            .map_err(|e| EmbedError::Provider(format!("failed to load {MODEL_NAME}: {e}")))?;
        tracing::info!(model = MODEL_NAME, "loaded local embedding model");
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

impl Embedder for FastEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| EmbedError::Provider("embedding model lock poisoned".to_string()))?;
            model
                .embed(texts, None)
                .map_err(|e| EmbedError::Provider(e.to_string()))
        })
        .await
        .map_err(|e| EmbedError::Provider(format!("embedding task failed: {e}")))?
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "downloads the model on first run"]
    async fn test_embeds_with_expected_dimension() {
        let embedder = FastEmbedder::new().unwrap();
        let vectors = embedder
            .embed(&["refactor the parser".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors[0].len(), DIMENSION);
    }
}
