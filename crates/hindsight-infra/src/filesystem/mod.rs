//! Filesystem adapter for Hindsight.
//!
//! Implements the `FileSystem` trait from `hindsight-core` over the real
//! working tree, and resolves the store's data directory.

use std::path::{Path, PathBuf};

use hindsight_core::service::fs::FileSystem;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "HINDSIGHT_DATA_DIR";

/// Local filesystem implementation of the `FileSystem` trait.
///
/// Reads go through `tokio::fs`. Reads of non-UTF-8
/// files fail with `InvalidData`, which the validator reports as unreadable.
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for LocalFileSystem {
    async fn read_file(&self, path: &Path) -> Result<String, std::io::Error> {
        tokio::fs::read_to_string(path).await
    }
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `HINDSIGHT_DATA_DIR` environment variable
/// 2. `~/.hindsight`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".hindsight");
    }

    // Last resort: current directory
    PathBuf::from(".hindsight")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_read_nested_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("src").join("nested").join("lib.rs");
        tokio::fs::create_dir_all(file_path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&file_path, "pub fn answer() -> u32 { 42 }").await.unwrap();

        let content = LocalFileSystem::new().read_file(&file_path).await.unwrap();
        assert_eq!(content, "pub fn answer() -> u32 { 42 }");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = LocalFileSystem::new()
            .read_file(&dir.path().join("absent.py"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_non_utf8_file_is_not_reported_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        tokio::fs::write(&path, [0xff, 0xfe, 0x00]).await.unwrap();
        let err = LocalFileSystem::new().read_file(&path).await.unwrap_err();
        assert_ne!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is the only one touching this variable and restores it immediately.
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/tmp/test-hindsight");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-hindsight"));
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
        }
    }
}
