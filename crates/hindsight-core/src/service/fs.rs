//! FileSystem trait for abstracting file I/O.
//!
//! The persistence validator reads the target working tree through this
//! trait, so tests can run against an in-memory tree. The `LocalFileSystem`
//! adapter lives in hindsight-infra.

use std::path::Path;

/// Read-only view of the agent's working tree.
///
/// Implementations must surface a missing file as
/// `std::io::ErrorKind::NotFound`; every other error kind is treated as
/// "unreadable" rather than "removed".
pub trait FileSystem: Send + Sync {
    /// Read a file's content as UTF-8.
    fn read_file(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<String, std::io::Error>> + Send;
}
