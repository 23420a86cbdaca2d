//! Wiring of the trajectory store over local infrastructure.

use std::path::Path;

use hindsight_core::embedder::BoxEmbedder;
use hindsight_core::store::TrajectoryStore;
use hindsight_types::error::StoreError;

use crate::config::load_config;
use crate::crypto::hash::Sha256ContentHasher;
use crate::filesystem::LocalFileSystem;
use crate::repository::FileTrajectoryRepository;

/// A trajectory store persisted under a local data directory.
pub type LocalTrajectoryStore =
    TrajectoryStore<FileTrajectoryRepository, Sha256ContentHasher, LocalFileSystem>;

/// Open (or create) the store rooted at `data_dir`.
///
/// Configuration comes from `{data_dir}/config.toml`, with defaults for
/// anything missing.
pub async fn open_local_store(
    data_dir: &Path,
    embedder: BoxEmbedder,
) -> Result<LocalTrajectoryStore, StoreError> {
    let config = load_config(data_dir).await;
    tracing::debug!(data_dir = %data_dir.display(), model = embedder.model_name(), "opening local store");
    TrajectoryStore::open(
        FileTrajectoryRepository::new(data_dir),
        embedder,
        Sha256ContentHasher::new(),
        LocalFileSystem::new(),
        config,
    )
    .await
}
