use thiserror::Error;

use crate::trajectory::TrajectoryId;

/// Errors from an embedding provider.
///
/// The one fatal error class of the store: without vectors nothing can be
/// inserted or searched.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding provider error: {0}")]
    Provider(String),

    #[error("embedder returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors from repository operations (used by trait definitions in hindsight-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("entity not found")]
    NotFound,
}

/// Errors from vector index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index snapshot shape mismatch: {0}")]
    ShapeMismatch(String),
}

/// Errors surfaced by the trajectory store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("trajectory '{0}' already exists")]
    AlreadyExists(TrajectoryId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_error_display() {
        let err = EmbedError::DimensionMismatch {
            expected: 384,
            actual: 3,
        };
        assert_eq!(err.to_string(), "embedding dimension mismatch: expected 384, got 3");
    }

    #[test]
    fn test_store_error_is_transparent_for_embedding() {
        let err: StoreError = EmbedError::Provider("offline".to_string()).into();
        assert_eq!(err.to_string(), "embedding provider error: offline");
    }

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Io("disk full".to_string());
        assert_eq!(err.to_string(), "io error: disk full");
    }
}
