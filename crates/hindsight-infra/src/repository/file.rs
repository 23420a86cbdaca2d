//! File-backed implementation of `TrajectoryRepository`.
//!
//! Layout under the store root:
//!
//! ```text
//! trajectories/{id}.json      one record per trajectory
//! metadata.json               curation metadata for all trajectories
//! index/{kind}.vectors.bin    bincode vector blob (dimension + row-major f32)
//! index/{kind}.ids.json       keys of the blob rows, in order
//! embedder.json               fingerprint of the embedder that wrote the blobs
//! ```
//!
//! Every write goes to a sibling temp file that is then renamed over the
//! target, so a crash never leaves a half-written record behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use hindsight_core::repository::TrajectoryRepository;
use hindsight_types::curation::CurationMetadata;
use hindsight_types::error::RepositoryError;
use hindsight_types::index::{EmbedderFingerprint, IndexKind, IndexSnapshot};
use hindsight_types::trajectory::{Trajectory, TrajectoryId};

/// On-disk form of an index's vector blob.
#[derive(Serialize, Deserialize)]
struct VectorBlob {
    dimension: usize,
    vectors: Vec<f32>,
}

/// Trajectory repository over a directory tree.
pub struct FileTrajectoryRepository {
    root: PathBuf,
}

impl FileTrajectoryRepository {
    /// Repository rooted at `root`. Directories are created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn trajectories_dir(&self) -> PathBuf {
        self.root.join("trajectories")
    }

    fn trajectory_path(&self, id: &TrajectoryId) -> PathBuf {
        self.trajectories_dir().join(format!("{id}.json"))
    }

    fn metadata_path(&self) -> PathBuf {
        self.root.join("metadata.json")
    }

    fn vectors_path(&self, kind: IndexKind) -> PathBuf {
        self.root.join("index").join(format!("{kind}.vectors.bin"))
    }

    fn ids_path(&self, kind: IndexKind) -> PathBuf {
        self.root.join("index").join(format!("{kind}.ids.json"))
    }

    fn fingerprint_path(&self) -> PathBuf {
        self.root.join("embedder.json")
    }
}

fn io_err(e: std::io::Error) -> RepositoryError {
    RepositoryError::Io(e.to_string())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, RepositoryError> {
    serde_json::to_vec_pretty(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RepositoryError> {
    serde_json::from_slice(bytes).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

/// Write `bytes` to `path` via a sibling temp file and rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RepositoryError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)
}

/// Read a file, mapping "missing" to `None`.
async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, RepositoryError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(e)),
    }
}

impl TrajectoryRepository for FileTrajectoryRepository {
    async fn save_trajectory(&self, trajectory: &Trajectory) -> Result<(), RepositoryError> {
        write_atomic(&self.trajectory_path(&trajectory.id), &to_json(trajectory)?).await
    }

    async fn delete_trajectory(&self, id: &TrajectoryId) -> Result<bool, RepositoryError> {
        match tokio::fs::remove_file(self.trajectory_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(e)),
        }
    }

    async fn load_trajectories(&self) -> Result<Vec<Trajectory>, RepositoryError> {
        let dir = self.trajectories_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut trajectories = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let parsed = match tokio::fs::read(&path).await {
                Ok(bytes) => from_json::<Trajectory>(&bytes),
                Err(e) => Err(io_err(e)),
            };
            match parsed {
                Ok(trajectory) => trajectories.push(trajectory),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping corrupt trajectory record");
                }
            }
        }

        tracing::debug!(count = trajectories.len(), root = %self.root.display(), "loaded trajectories");
        Ok(trajectories)
    }

    async fn save_metadata(&self, metadata: &[CurationMetadata]) -> Result<(), RepositoryError> {
        write_atomic(&self.metadata_path(), &to_json(metadata)?).await
    }

    async fn load_metadata(&self) -> Result<Option<Vec<CurationMetadata>>, RepositoryError> {
        read_optional(&self.metadata_path())
            .await?
            .map(|bytes| from_json(&bytes))
            .transpose()
    }

    async fn save_index<K: Serialize + Sync>(
        &self,
        kind: IndexKind,
        snapshot: &IndexSnapshot<K>,
    ) -> Result<(), RepositoryError> {
        let blob = VectorBlob {
            dimension: snapshot.dimension,
            vectors: snapshot.vectors.clone(),
        };
        let bytes = bincode::serialize(&blob).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        write_atomic(&self.vectors_path(kind), &bytes).await?;
        write_atomic(&self.ids_path(kind), &to_json(&snapshot.ids)?).await
    }

    async fn load_index<K: DeserializeOwned + Send>(
        &self,
        kind: IndexKind,
    ) -> Result<Option<IndexSnapshot<K>>, RepositoryError> {
        let Some(blob_bytes) = read_optional(&self.vectors_path(kind)).await? else {
            return Ok(None);
        };
        let Some(id_bytes) = read_optional(&self.ids_path(kind)).await? else {
            return Ok(None);
        };

        let blob: VectorBlob =
            bincode::deserialize(&blob_bytes).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let ids: Vec<K> = from_json(&id_bytes)?;

        Ok(Some(IndexSnapshot {
            dimension: blob.dimension,
            ids,
            vectors: blob.vectors,
        }))
    }

    async fn save_fingerprint(&self, fingerprint: &EmbedderFingerprint) -> Result<(), RepositoryError> {
        write_atomic(&self.fingerprint_path(), &to_json(fingerprint)?).await
    }

    async fn load_fingerprint(&self) -> Result<Option<EmbedderFingerprint>, RepositoryError> {
        read_optional(&self.fingerprint_path())
            .await?
            .map(|bytes| from_json(&bytes))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hindsight_types::trajectory::{Step, StepKey};
    use tempfile::tempdir;

    fn sample() -> Trajectory {
        Trajectory::new(
            "rename a function",
            "update definition then call sites",
            vec![Step::new("old name everywhere", "start with the definition", "edit")],
            true,
        )
    }

    #[tokio::test]
    async fn test_trajectory_roundtrip_and_delete() {
        let dir = tempdir().unwrap();
        let repo = FileTrajectoryRepository::new(dir.path());
        let t = sample();

        repo.save_trajectory(&t).await.unwrap();
        assert!(dir.path().join("trajectories").join(format!("{}.json", t.id)).exists());
        assert_eq!(repo.load_trajectories().await.unwrap(), vec![t.clone()]);

        assert!(repo.delete_trajectory(&t.id).await.unwrap());
        assert!(!repo.delete_trajectory(&t.id).await.unwrap());
        assert!(repo.load_trajectories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_root_loads_nothing() {
        let dir = tempdir().unwrap();
        let repo = FileTrajectoryRepository::new(dir.path().join("fresh"));
        assert!(repo.load_trajectories().await.unwrap().is_empty());
        assert!(repo.load_metadata().await.unwrap().is_none());
        assert!(repo.load_fingerprint().await.unwrap().is_none());
        assert!(
            repo.load_index::<TrajectoryId>(IndexKind::Trajectories)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_corrupt_trajectory_is_skipped() {
        let dir = tempdir().unwrap();
        let repo = FileTrajectoryRepository::new(dir.path());
        let t = sample();
        repo.save_trajectory(&t).await.unwrap();
        tokio::fs::write(dir.path().join("trajectories").join("broken.json"), "{\"goal\":")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("trajectories").join("notes.txt"), "ignored")
            .await
            .unwrap();

        assert_eq!(repo.load_trajectories().await.unwrap(), vec![t]);
    }

    #[tokio::test]
    async fn test_metadata_roundtrip_and_corruption() {
        let dir = tempdir().unwrap();
        let repo = FileTrajectoryRepository::new(dir.path());
        let meta = vec![CurationMetadata::new(TrajectoryId::new(), Vec::new())];

        repo.save_metadata(&meta).await.unwrap();
        assert_eq!(repo.load_metadata().await.unwrap(), Some(meta));

        tokio::fs::write(dir.path().join("metadata.json"), "[{").await.unwrap();
        assert!(matches!(
            repo.load_metadata().await,
            Err(RepositoryError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_index_roundtrip() {
        let dir = tempdir().unwrap();
        let repo = FileTrajectoryRepository::new(dir.path());
        let id = TrajectoryId::new();
        let snapshot = IndexSnapshot {
            dimension: 2,
            ids: vec![
                StepKey { trajectory_id: id.clone(), step_index: 0 },
                StepKey { trajectory_id: id, step_index: 1 },
            ],
            vectors: vec![1.0, 0.0, 0.6, 0.8],
        };

        repo.save_index(IndexKind::Steps, &snapshot).await.unwrap();
        assert!(dir.path().join("index").join("steps.vectors.bin").exists());
        assert!(dir.path().join("index").join("steps.ids.json").exists());
        assert!(!dir.path().join("index").join("steps.ids.json.tmp").exists());

        let loaded = repo.load_index::<StepKey>(IndexKind::Steps).await.unwrap();
        assert_eq!(loaded, Some(snapshot));
        assert!(
            repo.load_index::<TrajectoryId>(IndexKind::Trajectories)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_truncated_vector_blob_is_an_error() {
        let dir = tempdir().unwrap();
        let repo = FileTrajectoryRepository::new(dir.path());
        let snapshot = IndexSnapshot {
            dimension: 2,
            ids: vec![TrajectoryId::new()],
            vectors: vec![1.0, 0.0],
        };
        repo.save_index(IndexKind::Trajectories, &snapshot).await.unwrap();

        let path = dir.path().join("index").join("trajectories.vectors.bin");
        let bytes = tokio::fs::read(&path).await.unwrap();
        tokio::fs::write(&path, &bytes[..bytes.len() - 3]).await.unwrap();

        assert!(
            repo.load_index::<TrajectoryId>(IndexKind::Trajectories)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_fingerprint_roundtrip() {
        let dir = tempdir().unwrap();
        let repo = FileTrajectoryRepository::new(dir.path());
        let fingerprint = EmbedderFingerprint {
            model_name: "feature-hash-v1-256".to_string(),
            dimension: 256,
            probe_digest: "abc123".to_string(),
        };
        repo.save_fingerprint(&fingerprint).await.unwrap();
        assert_eq!(repo.load_fingerprint().await.unwrap(), Some(fingerprint));
    }
}
