//! Episode-scoped retrieval.
//!
//! The store cannot know whether an example it served helped: that is only
//! known when the episode ends. The retriever remembers which trajectories
//! were shown during one episode and credits the outcome to all of them.

use std::collections::BTreeSet;
use std::sync::Arc;

use hindsight_types::error::StoreError;
use hindsight_types::store::{ScoredStep, ScoredTrajectory};
use hindsight_types::trajectory::TrajectoryId;

use crate::repository::TrajectoryRepository;
use crate::service::fs::FileSystem;
use crate::service::hash::ContentHasher;
use crate::store::TrajectoryStore;

pub struct Retriever<R: TrajectoryRepository, H: ContentHasher, F: FileSystem> {
    store: Arc<TrajectoryStore<R, H, F>>,
    shown: BTreeSet<TrajectoryId>,
}

impl<R: TrajectoryRepository, H: ContentHasher, F: FileSystem> Retriever<R, H, F> {
    pub fn new(store: Arc<TrajectoryStore<R, H, F>>) -> Self {
        Self {
            store,
            shown: BTreeSet::new(),
        }
    }

    /// Examples for the planning phase, at trajectory granularity.
    pub async fn retrieve_for_plan(
        &mut self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredTrajectory>, StoreError> {
        let results = self.store.search(query, k, false).await?;
        self.shown
            .extend(results.iter().map(|r| r.trajectory.id.clone()));
        Ok(results)
    }

    /// Examples for one acting step, at step granularity.
    pub async fn retrieve_for_step(&mut self, query: &str, k: usize) -> Result<Vec<ScoredStep>, StoreError> {
        let results = self.store.search_steps(query, k).await?;
        self.shown
            .extend(results.iter().map(|r| r.example.trajectory_id.clone()));
        Ok(results)
    }

    /// Credit the episode outcome to everything shown, then start a new
    /// episode. Returns how many trajectories were credited.
    pub async fn record_episode_result(&mut self, success: bool) -> Result<usize, StoreError> {
        if self.shown.is_empty() {
            return Ok(0);
        }
        let ids: Vec<TrajectoryId> = std::mem::take(&mut self.shown).into_iter().collect();
        let updated = self.store.record_retrieval(&ids, success).await?;
        tracing::debug!(shown = ids.len(), updated, success, "episode result recorded");
        Ok(updated)
    }

    /// Trajectories shown so far this episode.
    pub fn shown(&self) -> &BTreeSet<TrajectoryId> {
        &self.shown
    }

    /// Forget the current episode without crediting anything.
    pub fn reset(&mut self) {
        self.shown.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hindsight_types::config::HindsightConfig;
    use hindsight_types::trajectory::{Step, Trajectory};

    use crate::embedder::BoxEmbedder;
    use crate::embedder::testing::{PlainHasher, WordEmbedder};
    use crate::repository::trajectory::testing::MemoryRepository;
    use crate::service::fs::testing::MemoryFileSystem;

    type TestStore = TrajectoryStore<MemoryRepository, PlainHasher, MemoryFileSystem>;

    async fn seeded() -> (Arc<TestStore>, Trajectory, Trajectory) {
        let store = TrajectoryStore::open(
            MemoryRepository::new(),
            BoxEmbedder::new(WordEmbedder::new(64)),
            PlainHasher,
            MemoryFileSystem::new(),
            HindsightConfig::default(),
        )
        .await
        .unwrap();
        let sort = Trajectory::new(
            "sort a list of numbers",
            "use the standard sort",
            vec![Step::new("unsorted input", "call sort on the vector", "sort()")],
            true,
        );
        let http = Trajectory::new(
            "fetch a web page",
            "send an http request",
            vec![Step::new("need remote html", "issue a get request", "get()")],
            true,
        );
        store.add(sort.clone(), None, false).await.unwrap();
        store.add(http.clone(), None, false).await.unwrap();
        (Arc::new(store), sort, http)
    }

    #[tokio::test]
    async fn test_shown_set_is_union_of_results() {
        let (store, sort, http) = seeded().await;
        let mut retriever = Retriever::new(store);

        let plans = retriever.retrieve_for_plan("sort numbers", 1).await.unwrap();
        assert_eq!(plans[0].trajectory.id, sort.id);
        let steps = retriever.retrieve_for_step("issue a get request", 1).await.unwrap();
        assert_eq!(steps[0].example.trajectory_id, http.id);
        retriever.retrieve_for_plan("sort numbers", 1).await.unwrap();

        let shown: Vec<_> = retriever.shown().iter().cloned().collect();
        let mut expected = vec![sort.id, http.id];
        expected.sort();
        assert_eq!(shown, expected);
    }

    #[tokio::test]
    async fn test_record_episode_result_flushes_once() {
        let (store, sort, _) = seeded().await;
        let mut retriever = Retriever::new(store.clone());

        retriever.retrieve_for_plan("sort numbers", 1).await.unwrap();
        assert_eq!(retriever.record_episode_result(true).await.unwrap(), 1);
        assert!(retriever.shown().is_empty());
        assert_eq!(retriever.record_episode_result(true).await.unwrap(), 0);

        let meta = store.get_metadata(&sort.id).await.unwrap();
        assert_eq!(meta.times_retrieved, 1);
        assert_eq!(meta.times_led_to_success, 1);
    }

    #[tokio::test]
    async fn test_reset_discards_episode() {
        let (store, sort, _) = seeded().await;
        let mut retriever = Retriever::new(store.clone());
        retriever.retrieve_for_plan("sort numbers", 2).await.unwrap();
        retriever.reset();
        assert_eq!(retriever.record_episode_result(false).await.unwrap(), 0);
        assert_eq!(store.get_metadata(&sort.id).await.unwrap().times_retrieved, 0);
    }
}
