//! The trajectory store.
//!
//! Owns every stored trajectory, its curation metadata and both vector
//! indices. Single writer: all state sits behind one async mutex, and every
//! mutating call persists through the [`TrajectoryRepository`] before it
//! returns. Query embedding happens outside the lock.
//!
//! Persisted indices are only trusted when the embedder fingerprint matches
//! and their contents exactly cover the stored trajectories; anything else
//! is rebuilt on open. That is what heals a crash between the separate
//! trajectory, metadata and index writes.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use hindsight_types::artifact::DeferredValidation;
use hindsight_types::config::HindsightConfig;
use hindsight_types::curation::{CurationMetadata, SUPERSEDED_REASON};
use hindsight_types::error::StoreError;
use hindsight_types::index::{IndexKind, IndexSnapshot};
use hindsight_types::store::{AddReport, ScoredStep, ScoredTrajectory, StoreStats};
use hindsight_types::trajectory::{StepKey, Trajectory, TrajectoryId};

use super::state::{
    StoreState, embedding_texts, index_entries, ordered_ids, rebuild_indices, reconcile_metadata,
    restore_indices,
};
use crate::artifact::{ArtifactExtractor, PersistenceValidator, ValidationContext};
use crate::curation::supersession::find_superseded;
use crate::embedder::{BoxEmbedder, fingerprint};
use crate::index::VectorIndex;
use crate::repository::TrajectoryRepository;
use crate::service::fs::FileSystem;
use crate::service::hash::ContentHasher;

/// Persistent experience store with two-granularity semantic search.
///
/// Generic over the repository, content hasher and filesystem ports so
/// hindsight-core never depends on hindsight-infra.
pub struct TrajectoryStore<R: TrajectoryRepository, H: ContentHasher, F: FileSystem> {
    repo: R,
    embedder: BoxEmbedder,
    hasher: H,
    fs: F,
    config: HindsightConfig,
    state: Mutex<StoreState>,
}

impl<R: TrajectoryRepository, H: ContentHasher, F: FileSystem> TrajectoryStore<R, H, F> {
    /// Load the store from `repo`, repairing whatever is inconsistent.
    ///
    /// Trajectory records are the ground truth. Metadata is reconciled to
    /// them; indices are restored from snapshots only if the embedder
    /// fingerprint matches, otherwise every trajectory is re-embedded.
    /// Repairs are persisted before this returns.
    #[tracing::instrument(name = "open_store", skip_all, fields(model = embedder.model_name()))]
    pub async fn open(
        repo: R,
        embedder: BoxEmbedder,
        hasher: H,
        fs: F,
        config: HindsightConfig,
    ) -> Result<Self, StoreError> {
        let trajectories: HashMap<_, _> = repo
            .load_trajectories()
            .await?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();

        let stored_metadata = repo.load_metadata().await.unwrap_or_else(|e| {
            warn!(error = %e, "metadata unreadable, treating as absent");
            None
        });
        let (metadata, metadata_repaired) = reconcile_metadata(&trajectories, stored_metadata);

        let current = fingerprint(&embedder, &hasher).await?;
        let stored_fingerprint = repo.load_fingerprint().await.unwrap_or_else(|e| {
            warn!(error = %e, "embedder fingerprint unreadable, treating as absent");
            None
        });

        let dimension = embedder.dimension();
        let restored = if stored_fingerprint.as_ref() == Some(&current) {
            let trajectory_snapshot = load_snapshot::<R, TrajectoryId>(&repo, IndexKind::Trajectories).await;
            let step_snapshot = load_snapshot::<R, StepKey>(&repo, IndexKind::Steps).await;
            restore_indices(trajectory_snapshot, step_snapshot, &trajectories, dimension)
        } else {
            if stored_fingerprint.is_some() {
                info!(
                    model = %current.model_name,
                    dimension = current.dimension,
                    "embedder changed since last run, re-embedding all trajectories"
                );
            }
            None
        };

        let (trajectory_index, step_index, rebuilt) = match restored {
            Some((trajectory_index, step_index)) => (trajectory_index, step_index, false),
            None => {
                let order = ordered_ids(&metadata);
                let (trajectory_index, step_index) =
                    rebuild_indices(&embedder, &trajectories, &order).await?;
                info!(
                    trajectories = trajectory_index.len(),
                    steps = step_index.len(),
                    "rebuilt vector indices"
                );
                (trajectory_index, step_index, true)
            }
        };

        let state = StoreState {
            trajectories,
            metadata,
            trajectory_index: Box::new(trajectory_index),
            step_index: Box::new(step_index),
        };

        if metadata_repaired {
            repo.save_metadata(&state.ordered_metadata()).await?;
        }
        if rebuilt {
            save_indices(&repo, &state).await?;
            repo.save_fingerprint(&current).await?;
        }

        info!(trajectories = state.trajectories.len(), "trajectory store opened");

        Ok(Self {
            repo,
            embedder,
            hasher,
            fs,
            config,
            state: Mutex::new(state),
        })
    }

    pub fn config(&self) -> &HindsightConfig {
        &self.config
    }

    /// Name of the model producing the stored vectors.
    pub fn embedding_model(&self) -> &str {
        self.embedder.model_name()
    }

    /// Store a completed trajectory.
    ///
    /// Embeds goal + plan and every step in one embedder call before
    /// anything is written, so an embedder failure leaves no trace. When
    /// `extract_artifacts` is set, file changes in the actions are recorded
    /// and any older trajectory whose code this one replaced is deprecated
    /// as superseded. Relative artifact paths are resolved against
    /// `working_dir`, or the process working directory when `None`.
    #[tracing::instrument(skip_all, fields(trajectory_id = %trajectory.id, steps = trajectory.steps.len()))]
    pub async fn add(
        &self,
        trajectory: Trajectory,
        working_dir: Option<&Path>,
        extract_artifacts: bool,
    ) -> Result<AddReport, StoreError> {
        let vectors = self.embedder.embed(&embedding_texts(&trajectory)).await?;
        let (head, steps) = index_entries(&trajectory, vectors)?;

        let artifacts = if extract_artifacts {
            let working_dir = resolve_working_dir(working_dir);
            ArtifactExtractor::new(&self.hasher, &self.config.artifacts).extract(&trajectory, &working_dir)
        } else {
            Vec::new()
        };

        let mut state = self.state.lock().await;
        if state.trajectories.contains_key(&trajectory.id) {
            return Err(StoreError::AlreadyExists(trajectory.id));
        }

        // Deprecations and the new metadata are staged on copies and only
        // committed once everything is persisted.
        let superseded = {
            let order = state.ordered_ids();
            let candidates = order.iter().filter_map(|id| {
                state
                    .metadata
                    .get(id)
                    .filter(|m| !m.is_deprecated())
                    .map(|m| (&m.trajectory_id, m.code_artifacts.as_slice()))
            });
            find_superseded(&artifacts, candidates, &self.config.artifacts)
        };
        let mut staged: Vec<CurationMetadata> = superseded
            .iter()
            .filter_map(|old| state.metadata.get(old).cloned())
            .filter_map(|mut meta| {
                meta.deprecate(SUPERSEDED_REASON, Some(trajectory.id.clone()))
                    .then_some(meta)
            })
            .collect();
        let artifact_count = artifacts.len();
        staged.push(CurationMetadata::new(trajectory.id.clone(), artifacts));

        state.trajectory_index.add(vec![head])?;
        if let Err(e) = state.step_index.add(steps) {
            state.unindex(&trajectory.id);
            return Err(e.into());
        }

        if let Err(e) = self.persist_added(&state, &trajectory, &staged).await {
            warn!(error = %e, "persisting new trajectory failed, rolling back");
            state.unindex(&trajectory.id);
            if let Err(undo) = self.repo.delete_trajectory(&trajectory.id).await {
                warn!(error = %undo, "could not delete partially stored trajectory");
            }
            self.resync_caches(&state).await;
            return Err(e);
        }

        for meta in &staged {
            if let Some(by) = meta.superseded_by() {
                info!(superseded = %meta.trajectory_id, %by, "trajectory superseded");
            }
        }
        let report = AddReport {
            trajectory_id: trajectory.id.clone(),
            artifact_count,
            superseded,
        };
        state.commit_metadata(staged);
        state.trajectories.insert(trajectory.id.clone(), trajectory);
        debug!(
            artifacts = report.artifact_count,
            superseded = report.superseded.len(),
            "trajectory added"
        );
        Ok(report)
    }

    /// Write the record, the staged metadata and both indices (which already
    /// hold the new rows).
    async fn persist_added(
        &self,
        state: &StoreState,
        trajectory: &Trajectory,
        staged: &[CurationMetadata],
    ) -> Result<(), StoreError> {
        self.repo.save_trajectory(trajectory).await?;
        self.repo
            .save_metadata(&state.staged_metadata(staged, &HashSet::new()))
            .await?;
        save_indices(&self.repo, state).await
    }

    /// Best-effort rewrite of metadata and indices from memory after a
    /// failed write. Anything still inconsistent is repaired on next open.
    async fn resync_caches(&self, state: &StoreState) {
        if let Err(e) = self.repo.save_metadata(&state.ordered_metadata()).await {
            warn!(error = %e, "could not restore persisted metadata");
        }
        if let Err(e) = save_indices(&self.repo, state).await {
            warn!(error = %e, "could not restore persisted indices");
        }
    }

    pub async fn get(&self, id: &TrajectoryId) -> Option<Trajectory> {
        self.state.lock().await.trajectories.get(id).cloned()
    }

    /// Trajectories most similar to `query` by goal + plan.
    ///
    /// Deprecated trajectories are skipped unless `include_deprecated`.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        include_deprecated: bool,
    ) -> Result<Vec<ScoredTrajectory>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.embedder.embed_single(query).await?;

        let state = self.state.lock().await;
        let keep = |id: &TrajectoryId| include_deprecated || !state.is_deprecated(id);
        let hits = self.filtered_search(&*state.trajectory_index, &query_vector, k, keep);

        Ok(hits
            .into_iter()
            .filter_map(|(id, similarity)| {
                state.trajectories.get(&id).map(|t| ScoredTrajectory {
                    trajectory: t.clone(),
                    similarity,
                })
            })
            .collect())
    }

    /// Steps most similar to `query` by observation + reasoning.
    ///
    /// Steps of deprecated trajectories are never returned.
    pub async fn search_steps(&self, query: &str, k: usize) -> Result<Vec<ScoredStep>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.embedder.embed_single(query).await?;

        let state = self.state.lock().await;
        let keep = |key: &StepKey| !state.is_deprecated(&key.trajectory_id);
        let hits = self.filtered_search(&*state.step_index, &query_vector, k, keep);

        Ok(hits
            .into_iter()
            .filter_map(|(key, similarity)| {
                let example = state.trajectories.get(&key.trajectory_id)?.step_example(key.step_index)?;
                Some(ScoredStep { example, similarity })
            })
            .collect())
    }

    /// Over-fetch, filter, and fall back to a full scan if filtering left
    /// fewer than `k` hits while more entries exist.
    fn filtered_search<K>(
        &self,
        index: &dyn VectorIndex<K>,
        query: &[f32],
        k: usize,
        keep: impl Fn(&K) -> bool,
    ) -> Vec<(K, f32)> {
        let fetch = k.saturating_mul(self.config.search_overfetch.max(1));
        let mut hits: Vec<(K, f32)> = index.search(query, fetch).into_iter().filter(|(key, _)| keep(key)).collect();
        if hits.len() < k && fetch < index.len() {
            hits = index
                .search(query, index.len())
                .into_iter()
                .filter(|(key, _)| keep(key))
                .collect();
        }
        hits.truncate(k);
        hits
    }

    /// Delete one trajectory. Returns false if it was not stored.
    pub async fn remove(&self, id: &TrajectoryId) -> Result<bool, StoreError> {
        let removed = self.remove_many(std::slice::from_ref(id)).await?;
        Ok(!removed.is_empty())
    }

    /// Delete several trajectories with a single index rebuild.
    ///
    /// Returns the ids that were actually stored and are now gone.
    #[tracing::instrument(skip_all, fields(requested = ids.len()))]
    pub async fn remove_many(&self, ids: &[TrajectoryId]) -> Result<Vec<TrajectoryId>, StoreError> {
        let mut state = self.state.lock().await;
        self.remove_locked(&mut state, ids).await
    }

    /// Atomically remove every trajectory the eviction predicate selects.
    #[tracing::instrument(skip(self))]
    pub async fn remove_low_utility(&self, threshold: f64) -> Result<Vec<TrajectoryId>, StoreError> {
        let mut state = self.state.lock().await;
        let doomed = self.low_utility_locked(&state, threshold);
        self.remove_locked(&mut state, &doomed).await
    }

    /// Remove every deprecated trajectory.
    #[tracing::instrument(skip(self))]
    pub async fn prune_deprecated(&self) -> Result<Vec<TrajectoryId>, StoreError> {
        let mut state = self.state.lock().await;
        let doomed: Vec<TrajectoryId> = state
            .ordered_ids()
            .into_iter()
            .filter(|id| state.is_deprecated(id))
            .collect();
        self.remove_locked(&mut state, &doomed).await
    }

    /// Persist the shrunken metadata and indices first, then delete the
    /// records, then forget in memory. If a record deletion fails, the
    /// records already deleted are forgotten and everything else stays.
    async fn remove_locked(
        &self,
        state: &mut StoreState,
        ids: &[TrajectoryId],
    ) -> Result<Vec<TrajectoryId>, StoreError> {
        let mut doomed = HashSet::new();
        let present: Vec<TrajectoryId> = ids
            .iter()
            .filter(|id| state.trajectories.contains_key(*id) && doomed.insert((*id).clone()))
            .cloned()
            .collect();
        if present.is_empty() {
            return Ok(Vec::new());
        }

        let metadata = state.staged_metadata(&[], &doomed);
        let mut trajectory_snapshot = state.trajectory_index.snapshot();
        trajectory_snapshot.retain_rows(|id| !doomed.contains(id));
        let mut step_snapshot = state.step_index.snapshot();
        step_snapshot.retain_rows(|key| !doomed.contains(&key.trajectory_id));

        let caches = async {
            self.repo.save_metadata(&metadata).await?;
            self.repo
                .save_index(IndexKind::Trajectories, &trajectory_snapshot)
                .await?;
            self.repo.save_index(IndexKind::Steps, &step_snapshot).await
        };
        if let Err(e) = caches.await {
            self.resync_caches(state).await;
            return Err(e.into());
        }

        let mut deleted = HashSet::new();
        for id in &present {
            if let Err(e) = self.repo.delete_trajectory(id).await {
                warn!(trajectory_id = %id, error = %e, "trajectory deletion failed");
                state.forget(&deleted);
                self.resync_caches(state).await;
                return Err(e.into());
            }
            deleted.insert(id.clone());
        }
        state.forget(&deleted);

        info!(removed = present.len(), remaining = state.trajectories.len(), "trajectories removed");
        Ok(present)
    }

    /// Run the code persistence validator for one trajectory and record the
    /// result. Returns `None` for unknown ids.
    pub async fn validate_trajectory(
        &self,
        id: &TrajectoryId,
        ctx: &ValidationContext,
    ) -> Result<Option<DeferredValidation>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(mut meta) = state.metadata.get(id).cloned() else {
            return Ok(None);
        };

        let validation = self.validator().validate(id, &meta.code_artifacts, ctx).await;
        meta.add_validation(validation.clone(), &self.config.curation);
        self.commit_updates(&mut state, vec![meta]).await?;

        Ok(Some(validation))
    }

    /// Validate every non-deprecated trajectory, persisting once at the end.
    #[tracing::instrument(skip_all)]
    pub async fn validate_all(
        &self,
        ctx: &ValidationContext,
    ) -> Result<Vec<(TrajectoryId, DeferredValidation)>, StoreError> {
        let mut state = self.state.lock().await;
        let targets: Vec<CurationMetadata> = state
            .ordered_ids()
            .iter()
            .filter_map(|id| state.metadata.get(id))
            .filter(|m| !m.is_deprecated())
            .cloned()
            .collect();

        let validator = self.validator();
        let mut updated = Vec::with_capacity(targets.len());
        let mut results = Vec::with_capacity(targets.len());
        for mut meta in targets {
            let validation = validator.validate(&meta.trajectory_id, &meta.code_artifacts, ctx).await;
            meta.add_validation(validation.clone(), &self.config.curation);
            results.push((meta.trajectory_id.clone(), validation));
            updated.push(meta);
        }

        if !updated.is_empty() {
            self.commit_updates(&mut state, updated).await?;
        }
        info!(validated = results.len(), "validation sweep finished");
        Ok(results)
    }

    /// Persist updated metadata entries, then swap them into memory.
    async fn commit_updates(
        &self,
        state: &mut StoreState,
        updated: Vec<CurationMetadata>,
    ) -> Result<(), StoreError> {
        self.repo
            .save_metadata(&state.staged_metadata(&updated, &HashSet::new()))
            .await?;
        state.commit_metadata(updated);
        Ok(())
    }

    fn validator(&self) -> PersistenceValidator<'_, F, H> {
        PersistenceValidator::new(&self.fs, &self.hasher, &self.config.artifacts)
    }

    /// Credit one episode's outcome to every trajectory shown during it.
    ///
    /// Unknown ids are ignored and repeated ids count once. Returns how many
    /// trajectories were updated.
    pub async fn record_retrieval(
        &self,
        ids: &[TrajectoryId],
        led_to_success: bool,
    ) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let mut seen = HashSet::new();
        let updated: Vec<CurationMetadata> = ids
            .iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| state.metadata.get(id).cloned())
            .map(|mut meta| {
                meta.record_retrieval(led_to_success, &self.config.curation);
                meta
            })
            .collect();

        let count = updated.len();
        if count > 0 {
            self.commit_updates(&mut state, updated).await?;
        }
        debug!(updated = count, led_to_success, "retrieval outcome recorded");
        Ok(count)
    }

    pub async fn get_active_trajectories(&self) -> Vec<Trajectory> {
        self.state.lock().await.trajectories_where(|m| !m.is_deprecated())
    }

    pub async fn get_deprecated_trajectories(&self) -> Vec<Trajectory> {
        self.state.lock().await.trajectories_where(CurationMetadata::is_deprecated)
    }

    /// Deprecated trajectories that a newer trajectory replaced.
    pub async fn get_superseded_trajectories(&self) -> Vec<Trajectory> {
        self.state
            .lock()
            .await
            .trajectories_where(|m| m.superseded_by().is_some())
    }

    pub async fn get_metadata(&self, id: &TrajectoryId) -> Option<CurationMetadata> {
        self.state.lock().await.metadata.get(id).cloned()
    }

    /// All metadata in insertion order.
    pub async fn all_metadata(&self) -> Vec<CurationMetadata> {
        self.state.lock().await.ordered_metadata()
    }

    /// Read-only preview of what eviction at `threshold` would remove.
    pub async fn get_low_utility_trajectories(&self, threshold: f64) -> Vec<TrajectoryId> {
        let state = self.state.lock().await;
        self.low_utility_locked(&state, threshold)
    }

    fn low_utility_locked(&self, state: &StoreState, threshold: f64) -> Vec<TrajectoryId> {
        state
            .ordered_ids()
            .into_iter()
            .filter(|id| {
                state
                    .metadata
                    .get(id)
                    .is_some_and(|m| m.is_low_utility(threshold, &self.config.curation))
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.trajectories.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> StoreStats {
        let state = self.state.lock().await;
        let metadata: Vec<&CurationMetadata> = state.metadata.values().collect();
        let active: Vec<&&CurationMetadata> = metadata.iter().filter(|m| !m.is_deprecated()).collect();

        let mean_utility = if active.is_empty() {
            1.0
        } else {
            active.iter().map(|m| m.utility_score).sum::<f64>() / active.len() as f64
        };

        StoreStats {
            total_trajectories: state.trajectories.len(),
            active: active.len(),
            deprecated: metadata.len() - active.len(),
            superseded: metadata.iter().filter(|m| m.superseded_by().is_some()).count(),
            total_steps: state.trajectories.values().map(|t| t.steps.len()).sum(),
            total_artifacts: metadata.iter().map(|m| m.code_artifacts.len()).sum(),
            validated: metadata.iter().filter(|m| !m.validations.is_empty()).count(),
            mean_utility,
            embedding_model: self.embedder.model_name().to_string(),
        }
    }
}

async fn load_snapshot<R, K>(repo: &R, kind: IndexKind) -> Option<IndexSnapshot<K>>
where
    R: TrajectoryRepository,
    K: serde::de::DeserializeOwned + Send,
{
    repo.load_index::<K>(kind).await.unwrap_or_else(|e| {
        warn!(%kind, error = %e, "persisted index unreadable, treating as absent");
        None
    })
}

async fn save_indices<R: TrajectoryRepository>(repo: &R, state: &StoreState) -> Result<(), StoreError> {
    repo.save_index(IndexKind::Trajectories, &state.trajectory_index.snapshot())
        .await?;
    repo.save_index(IndexKind::Steps, &state.step_index.snapshot()).await?;
    Ok(())
}

fn resolve_working_dir(working_dir: Option<&Path>) -> String {
    match working_dir {
        Some(dir) => dir.to_string_lossy().into_owned(),
        None => match std::env::current_dir() {
            Ok(dir) => dir.to_string_lossy().into_owned(),
            Err(e) => {
                warn!(error = %e, "current directory unavailable, using '.'");
                ".".to_string()
            }
        },
    }
}
