//! TrajectoryRepository trait definition.
//!
//! Persistence port of the trajectory store. Trajectories are the ground
//! truth; metadata survives index loss; indices and the embedder
//! fingerprint are caches that can always be rebuilt.

use serde::Serialize;
use serde::de::DeserializeOwned;

use hindsight_types::curation::CurationMetadata;
use hindsight_types::error::RepositoryError;
use hindsight_types::index::{EmbedderFingerprint, IndexKind, IndexSnapshot};
use hindsight_types::trajectory::{Trajectory, TrajectoryId};

/// Repository trait for trajectory store persistence.
///
/// Implementations live in hindsight-infra (e.g., `FileTrajectoryRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
///
/// Loaders of cache data (`load_metadata`, `load_index`, `load_fingerprint`)
/// return `Ok(None)` for absent records. Corrupt records may surface as
/// errors; the store treats those as absent too.
pub trait TrajectoryRepository: Send + Sync {
    /// Persist one trajectory record, replacing any record with the same id.
    fn save_trajectory(
        &self,
        trajectory: &Trajectory,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a trajectory record. Returns false if it did not exist.
    fn delete_trajectory(
        &self,
        id: &TrajectoryId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Load every readable trajectory record. Corrupt records are skipped.
    fn load_trajectories(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Trajectory>, RepositoryError>> + Send;

    /// Replace the whole metadata collection.
    fn save_metadata(
        &self,
        metadata: &[CurationMetadata],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn load_metadata(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<Vec<CurationMetadata>>, RepositoryError>> + Send;

    /// Replace the persisted index of one granularity.
    fn save_index<K: Serialize + Sync>(
        &self,
        kind: IndexKind,
        snapshot: &IndexSnapshot<K>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn load_index<K: DeserializeOwned + Send>(
        &self,
        kind: IndexKind,
    ) -> impl std::future::Future<Output = Result<Option<IndexSnapshot<K>>, RepositoryError>> + Send;

    fn save_fingerprint(
        &self,
        fingerprint: &EmbedderFingerprint,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn load_fingerprint(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<EmbedderFingerprint>, RepositoryError>> + Send;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory repository for store tests.
    //!
    //! Records are kept serialized, so every save/load goes through serde
    //! just like the file-backed adapter.

    use super::*;

    use std::collections::{BTreeMap, HashMap};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Records {
        trajectories: BTreeMap<String, String>,
        metadata: Option<String>,
        indices: HashMap<IndexKind, String>,
        fingerprint: Option<String>,
        index_saves: usize,
        fail_metadata_saves: bool,
        fail_deletes: bool,
    }

    /// Cloneable handle; clones share the same records so a test can
    /// "reopen" a store over the state a previous store left behind.
    #[derive(Clone, Default)]
    pub struct MemoryRepository {
        records: Arc<Mutex<Records>>,
    }

    fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, RepositoryError> {
        serde_json::to_string(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
    }

    fn disk_full() -> RepositoryError {
        RepositoryError::Io("disk full".to_string())
    }

    fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, RepositoryError> {
        serde_json::from_str(json).map_err(|e| RepositoryError::Serialization(e.to_string()))
    }

    impl MemoryRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn corrupt_index(&self, kind: IndexKind) {
            self.records.lock().unwrap().indices.insert(kind, "{broken".to_string());
        }

        pub fn corrupt_metadata(&self) {
            self.records.lock().unwrap().metadata = Some("[{".to_string());
        }

        pub fn clear_indices(&self) {
            self.records.lock().unwrap().indices.clear();
        }

        /// Make every `save_metadata` fail until switched back.
        pub fn fail_metadata_saves(&self, fail: bool) {
            self.records.lock().unwrap().fail_metadata_saves = fail;
        }

        /// Make every `delete_trajectory` fail until switched back.
        pub fn fail_deletes(&self, fail: bool) {
            self.records.lock().unwrap().fail_deletes = fail;
        }

        pub fn index_saves(&self) -> usize {
            self.records.lock().unwrap().index_saves
        }

        pub fn trajectory_count(&self) -> usize {
            self.records.lock().unwrap().trajectories.len()
        }

        /// Store a raw trajectory record, bypassing the store.
        pub fn insert_raw_trajectory(&self, key: &str, json: &str) {
            self.records
                .lock()
                .unwrap()
                .trajectories
                .insert(key.to_string(), json.to_string());
        }
    }

    impl TrajectoryRepository for MemoryRepository {
        async fn save_trajectory(&self, trajectory: &Trajectory) -> Result<(), RepositoryError> {
            let json = to_json(trajectory)?;
            self.records
                .lock()
                .unwrap()
                .trajectories
                .insert(trajectory.id.to_string(), json);
            Ok(())
        }

        async fn delete_trajectory(&self, id: &TrajectoryId) -> Result<bool, RepositoryError> {
            let mut records = self.records.lock().unwrap();
            if records.fail_deletes {
                return Err(disk_full());
            }
            Ok(records.trajectories.remove(&id.to_string()).is_some())
        }

        async fn load_trajectories(&self) -> Result<Vec<Trajectory>, RepositoryError> {
            let records = self.records.lock().unwrap();
            Ok(records
                .trajectories
                .values()
                .filter_map(|json| from_json(json).ok())
                .collect())
        }

        async fn save_metadata(&self, metadata: &[CurationMetadata]) -> Result<(), RepositoryError> {
            let json = to_json(metadata)?;
            let mut records = self.records.lock().unwrap();
            if records.fail_metadata_saves {
                return Err(disk_full());
            }
            records.metadata = Some(json);
            Ok(())
        }

        async fn load_metadata(&self) -> Result<Option<Vec<CurationMetadata>>, RepositoryError> {
            let records = self.records.lock().unwrap();
            records.metadata.as_deref().map(from_json).transpose()
        }

        async fn save_index<K: Serialize + Sync>(
            &self,
            kind: IndexKind,
            snapshot: &IndexSnapshot<K>,
        ) -> Result<(), RepositoryError> {
            let json = to_json(snapshot)?;
            let mut records = self.records.lock().unwrap();
            records.indices.insert(kind, json);
            records.index_saves += 1;
            Ok(())
        }

        async fn load_index<K: DeserializeOwned + Send>(
            &self,
            kind: IndexKind,
        ) -> Result<Option<IndexSnapshot<K>>, RepositoryError> {
            let records = self.records.lock().unwrap();
            records.indices.get(&kind).map(|json| from_json(json)).transpose()
        }

        async fn save_fingerprint(&self, fingerprint: &EmbedderFingerprint) -> Result<(), RepositoryError> {
            let json = to_json(fingerprint)?;
            self.records.lock().unwrap().fingerprint = Some(json);
            Ok(())
        }

        async fn load_fingerprint(&self) -> Result<Option<EmbedderFingerprint>, RepositoryError> {
            let records = self.records.lock().unwrap();
            records.fingerprint.as_deref().map(from_json).transpose()
        }
    }
}
