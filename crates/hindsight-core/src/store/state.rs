//! In-memory state of the trajectory store and index (re)construction.

use std::collections::{HashMap, HashSet};

use hindsight_types::curation::CurationMetadata;
use hindsight_types::error::{EmbedError, StoreError};
use hindsight_types::index::IndexSnapshot;
use hindsight_types::trajectory::{StepKey, Trajectory, TrajectoryId};

use crate::embedder::BoxEmbedder;
use crate::index::{FlatIndex, VectorIndex};

/// Everything the store guards with its mutex.
pub(crate) struct StoreState {
    pub trajectories: HashMap<TrajectoryId, Trajectory>,
    pub metadata: HashMap<TrajectoryId, CurationMetadata>,
    pub trajectory_index: Box<dyn VectorIndex<TrajectoryId>>,
    pub step_index: Box<dyn VectorIndex<StepKey>>,
}

impl StoreState {
    /// Ids in insertion order (creation time, then id).
    pub fn ordered_ids(&self) -> Vec<TrajectoryId> {
        ordered_ids(&self.metadata)
    }

    /// Metadata in insertion order, as persisted.
    pub fn ordered_metadata(&self) -> Vec<CurationMetadata> {
        self.staged_metadata(&[], &HashSet::new())
    }

    /// Metadata as it will be persisted once `overlay` replaces (or adds)
    /// its entries and `removed` is dropped. `self` is not touched, so a
    /// failed save leaves nothing to undo.
    pub fn staged_metadata(
        &self,
        overlay: &[CurationMetadata],
        removed: &HashSet<TrajectoryId>,
    ) -> Vec<CurationMetadata> {
        let mut merged: HashMap<&TrajectoryId, &CurationMetadata> = self
            .metadata
            .iter()
            .filter(|(id, _)| !removed.contains(*id))
            .collect();
        for meta in overlay {
            merged.insert(&meta.trajectory_id, meta);
        }
        let mut entries: Vec<&CurationMetadata> = merged.into_values().collect();
        entries.sort_by(|a, b| insertion_order(a, b));
        entries.into_iter().cloned().collect()
    }

    /// Replace metadata entries after they were persisted.
    pub fn commit_metadata(&mut self, updated: Vec<CurationMetadata>) {
        for meta in updated {
            self.metadata.insert(meta.trajectory_id.clone(), meta);
        }
    }

    /// Trajectories whose metadata satisfies `pred`, in insertion order.
    pub fn trajectories_where(&self, pred: impl Fn(&CurationMetadata) -> bool) -> Vec<Trajectory> {
        self.ordered_ids()
            .iter()
            .filter(|id| self.metadata.get(*id).is_some_and(&pred))
            .filter_map(|id| self.trajectories.get(id).cloned())
            .collect()
    }

    pub fn is_deprecated(&self, id: &TrajectoryId) -> bool {
        self.metadata.get(id).is_some_and(CurationMetadata::is_deprecated)
    }

    /// Drop trajectories from memory and from both indices. The retained
    /// vectors are reused as-is.
    pub fn forget(&mut self, ids: &HashSet<TrajectoryId>) {
        for id in ids {
            self.trajectories.remove(id);
            self.metadata.remove(id);
        }
        self.trajectory_index.retain(&mut |id| !ids.contains(id));
        self.step_index.retain(&mut |key| !ids.contains(&key.trajectory_id));
    }

    /// Drop one trajectory's rows from both indices only.
    pub fn unindex(&mut self, id: &TrajectoryId) {
        self.trajectory_index.retain(&mut |other| other != id);
        self.step_index.retain(&mut |key| &key.trajectory_id != id);
    }
}

fn insertion_order(a: &CurationMetadata, b: &CurationMetadata) -> std::cmp::Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.trajectory_id.cmp(&b.trajectory_id))
}

pub(crate) fn ordered_ids(metadata: &HashMap<TrajectoryId, CurationMetadata>) -> Vec<TrajectoryId> {
    let mut entries: Vec<&CurationMetadata> = metadata.values().collect();
    entries.sort_by(|a, b| insertion_order(a, b));
    entries.into_iter().map(|m| m.trajectory_id.clone()).collect()
}

/// Pair stored metadata with the trajectory set.
///
/// Trajectories without metadata get fresh metadata; metadata without a
/// trajectory is dropped. Returns whether anything had to be repaired.
pub(crate) fn reconcile_metadata(
    trajectories: &HashMap<TrajectoryId, Trajectory>,
    stored: Option<Vec<CurationMetadata>>,
) -> (HashMap<TrajectoryId, CurationMetadata>, bool) {
    let stored_was_present = stored.is_some();
    let mut metadata: HashMap<TrajectoryId, CurationMetadata> = HashMap::new();
    let mut repaired = false;

    for meta in stored.unwrap_or_default() {
        if trajectories.contains_key(&meta.trajectory_id) {
            metadata.insert(meta.trajectory_id.clone(), meta);
        } else {
            tracing::warn!(trajectory_id = %meta.trajectory_id, "dropping metadata without trajectory");
            repaired = true;
        }
    }

    // UUID v7 order stands in for insertion order when metadata was lost
    let mut missing: Vec<&TrajectoryId> = trajectories
        .keys()
        .filter(|id| !metadata.contains_key(*id))
        .collect();
    missing.sort();
    for id in missing {
        if stored_was_present {
            tracing::warn!(trajectory_id = %id, "trajectory without metadata, starting fresh");
        }
        metadata.insert(id.clone(), CurationMetadata::new(id.clone(), Vec::new()));
        repaired = true;
    }

    (metadata, repaired)
}

/// Texts embedded for one trajectory: goal + plan first, then each step.
pub(crate) fn embedding_texts(trajectory: &Trajectory) -> Vec<String> {
    std::iter::once(trajectory.embedding_text())
        .chain(trajectory.steps.iter().map(|s| s.embedding_text()))
        .collect()
}

/// Index entries for one trajectory from the vectors of [`embedding_texts`].
pub(crate) fn index_entries(
    trajectory: &Trajectory,
    vectors: Vec<Vec<f32>>,
) -> Result<((TrajectoryId, Vec<f32>), Vec<(StepKey, Vec<f32>)>), EmbedError> {
    let expected = trajectory.steps.len() + 1;
    if vectors.len() != expected {
        return Err(EmbedError::CountMismatch {
            expected,
            actual: vectors.len(),
        });
    }

    let mut vectors = vectors.into_iter();
    let head = vectors.next().ok_or(EmbedError::CountMismatch {
        expected,
        actual: 0,
    })?;
    let steps = vectors
        .enumerate()
        .map(|(step_index, v)| {
            (
                StepKey {
                    trajectory_id: trajectory.id.clone(),
                    step_index,
                },
                v,
            )
        })
        .collect();

    Ok(((trajectory.id.clone(), head), steps))
}

/// Re-embed every trajectory and build both indices from scratch.
///
/// One embedder call per trajectory, in insertion order.
pub(crate) async fn rebuild_indices(
    embedder: &BoxEmbedder,
    trajectories: &HashMap<TrajectoryId, Trajectory>,
    order: &[TrajectoryId],
) -> Result<(FlatIndex<TrajectoryId>, FlatIndex<StepKey>), StoreError> {
    let dimension = embedder.dimension();
    let mut trajectory_index = FlatIndex::new(dimension);
    let mut step_index = FlatIndex::new(dimension);

    for id in order {
        let Some(trajectory) = trajectories.get(id) else {
            continue;
        };
        let vectors = embedder.embed(&embedding_texts(trajectory)).await?;
        let (head, steps) = index_entries(trajectory, vectors)?;
        trajectory_index.add(vec![head])?;
        step_index.add(steps)?;
    }

    Ok((trajectory_index, step_index))
}

/// Restore both indices from snapshots if they exactly cover the
/// trajectory set at the expected dimension.
///
/// Returns `None`, with the reason logged, when a rebuild is needed.
pub(crate) fn restore_indices(
    trajectory_snapshot: Option<IndexSnapshot<TrajectoryId>>,
    step_snapshot: Option<IndexSnapshot<StepKey>>,
    trajectories: &HashMap<TrajectoryId, Trajectory>,
    dimension: usize,
) -> Option<(FlatIndex<TrajectoryId>, FlatIndex<StepKey>)> {
    let (Some(trajectory_snapshot), Some(step_snapshot)) = (trajectory_snapshot, step_snapshot) else {
        tracing::info!("persisted index missing, rebuilding");
        return None;
    };

    let trajectory_index = match FlatIndex::from_snapshot(trajectory_snapshot, dimension) {
        Ok(index) => index,
        Err(e) => {
            tracing::warn!(error = %e, "trajectory index unusable, rebuilding");
            return None;
        }
    };
    let step_index = match FlatIndex::from_snapshot(step_snapshot, dimension) {
        Ok(index) => index,
        Err(e) => {
            tracing::warn!(error = %e, "step index unusable, rebuilding");
            return None;
        }
    };

    let indexed: HashSet<&TrajectoryId> = trajectory_index.keys().collect();
    let covers_trajectories = trajectory_index.len() == trajectories.len()
        && indexed.len() == trajectories.len()
        && trajectories.keys().all(|id| indexed.contains(id));
    if !covers_trajectories {
        tracing::warn!(
            indexed = trajectory_index.len(),
            stored = trajectories.len(),
            "trajectory index out of sync, rebuilding"
        );
        return None;
    }

    let expected_steps: usize = trajectories.values().map(|t| t.steps.len()).sum();
    let step_keys: HashSet<&StepKey> = step_index.keys().collect();
    let covers_steps = step_index.len() == expected_steps
        && step_keys.len() == expected_steps
        && step_keys.iter().all(|key| {
            trajectories
                .get(&key.trajectory_id)
                .is_some_and(|t| key.step_index < t.steps.len())
        });
    if !covers_steps {
        tracing::warn!(
            indexed = step_index.len(),
            stored = expected_steps,
            "step index out of sync, rebuilding"
        );
        return None;
    }

    Some((trajectory_index, step_index))
}
