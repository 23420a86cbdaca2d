//! Periodic eviction of trajectories that keep failing as examples.

use std::sync::Arc;

use hindsight_types::error::StoreError;
use hindsight_types::trajectory::TrajectoryId;

use crate::repository::TrajectoryRepository;
use crate::service::fs::FileSystem;
use crate::service::hash::ContentHasher;
use crate::store::TrajectoryStore;

/// Runs a curation sweep every `curation.curate_every` successful episodes.
///
/// A trajectory is evicted once it has been retrieved at least
/// `min_retrievals` times and its utility is below `utility_threshold`.
pub struct CurationManager<R: TrajectoryRepository, H: ContentHasher, F: FileSystem> {
    store: Arc<TrajectoryStore<R, H, F>>,
    successful_episodes: u64,
}

impl<R: TrajectoryRepository, H: ContentHasher, F: FileSystem> CurationManager<R, H, F> {
    pub fn new(store: Arc<TrajectoryStore<R, H, F>>) -> Self {
        Self {
            store,
            successful_episodes: 0,
        }
    }

    /// Successful episodes counted so far.
    pub fn successful_episodes(&self) -> u64 {
        self.successful_episodes
    }

    /// Count one successful episode and curate if a sweep is due.
    ///
    /// Returns `Some(removed)` when a sweep ran, `None` otherwise.
    pub async fn maybe_curate(&mut self) -> Result<Option<Vec<TrajectoryId>>, StoreError> {
        self.successful_episodes += 1;
        let every = u64::from(self.store.config().curation.curate_every.max(1));
        if self.successful_episodes % every != 0 {
            return Ok(None);
        }
        self.curate().await.map(Some)
    }

    /// Remove every low-utility trajectory now.
    pub async fn curate(&self) -> Result<Vec<TrajectoryId>, StoreError> {
        let threshold = self.store.config().curation.utility_threshold;
        let removed = self.store.remove_low_utility(threshold).await?;
        if !removed.is_empty() {
            tracing::info!(removed = removed.len(), threshold, "curation evicted trajectories");
        }
        Ok(removed)
    }

    /// What `curate` would remove right now.
    pub async fn get_low_utility_trajectories(&self) -> Vec<TrajectoryId> {
        let threshold = self.store.config().curation.utility_threshold;
        self.store.get_low_utility_trajectories(threshold).await
    }
}
