//! Code artifact and deferred validation types.
//!
//! A code artifact is a content-addressed record of one file-level side
//! effect of a trajectory. Deferred validations record, after the fact,
//! whether those side effects still hold on disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How a trajectory changed a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Full-file write; the hash covers the whole content.
    Write,
    /// Targeted edit; the hash covers only the inserted text.
    Edit,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Write => write!(f, "write"),
            ChangeType::Edit => write!(f, "edit"),
        }
    }
}

impl FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "write" => Ok(ChangeType::Write),
            "edit" => Ok(ChangeType::Edit),
            other => Err(format!("invalid change type: '{other}'")),
        }
    }
}

/// One file-level side effect recorded from a trajectory's actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeArtifact {
    /// Path as written in the action (relative or absolute).
    pub file_path: String,
    pub change_type: ChangeType,
    /// Lowercase hex SHA-256 of the written content (write) or inserted text (edit).
    pub content_hash: String,
    /// Bounded prefix of the content, used for fuzzy matching.
    pub content_snippet: String,
    /// Working directory the action ran in.
    pub working_dir: String,
    pub created_at: DateTime<Utc>,
}

impl CodeArtifact {
    /// Resolve the artifact's file against an optional override root.
    ///
    /// Absolute paths are returned unchanged. Relative paths are joined to
    /// `root` when given, otherwise to the artifact's own working directory.
    pub fn resolve_path(&self, root: Option<&Path>) -> PathBuf {
        let path = Path::new(&self.file_path);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match root {
            Some(root) => root.join(path),
            None => Path::new(&self.working_dir).join(path),
        }
    }
}

/// Which validator produced a deferred validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorType {
    /// Checks whether a trajectory's code changes still exist on disk.
    CodePersistence,
}

impl fmt::Display for ValidatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidatorType::CodePersistence => write!(f, "code_persistence"),
        }
    }
}

/// Outcome of checking one artifact against the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Intact,
    Modified,
    Removed,
    /// The file exists but could not be read (permissions, encoding).
    Unreadable,
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactStatus::Intact => write!(f, "intact"),
            ArtifactStatus::Modified => write!(f, "modified"),
            ArtifactStatus::Removed => write!(f, "removed"),
            ArtifactStatus::Unreadable => write!(f, "unreadable"),
        }
    }
}

/// Per-artifact detail of a persistence validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactCheck {
    pub file_path: String,
    pub status: ArtifactStatus,
    pub score: f64,
    /// Fraction of non-trivial snippet lines still present, when computed.
    pub line_ratio: Option<f64>,
    /// Error text for unreadable files.
    pub error: Option<String>,
}

/// After-the-fact quality feedback for a trajectory. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredValidation {
    pub validator_type: ValidatorType,
    /// Score in [0, 1].
    pub score: f64,
    /// Aggregate reason, e.g. `all_changes_intact`.
    pub reason: String,
    pub details: Vec<ArtifactCheck>,
    pub validated_at: DateTime<Utc>,
}

/// Aggregate reasons reported by the code persistence validator.
pub mod reason {
    pub const NO_CODE_ARTIFACTS: &str = "no_code_artifacts";
    pub const ALL_CHANGES_INTACT: &str = "all_changes_intact";
    pub const ALL_CHANGES_REMOVED: &str = "all_changes_removed";
    pub const SOME_CHANGES_REMOVED: &str = "some_changes_removed";
    pub const SOME_CHANGES_MODIFIED: &str = "some_changes_modified";
    pub const MIXED_RESULTS: &str = "mixed_results";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(path: &str, working_dir: &str) -> CodeArtifact {
        CodeArtifact {
            file_path: path.to_string(),
            change_type: ChangeType::Edit,
            content_hash: String::new(),
            content_snippet: String::new(),
            working_dir: working_dir.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_change_type_roundtrip() {
        for ct in [ChangeType::Write, ChangeType::Edit] {
            let parsed: ChangeType = ct.to_string().parse().unwrap();
            assert_eq!(ct, parsed);
        }
        assert!("delete".parse::<ChangeType>().is_err());
    }

    #[test]
    fn test_validator_type_serde() {
        let json = serde_json::to_string(&ValidatorType::CodePersistence).unwrap();
        assert_eq!(json, "\"code_persistence\"");
    }

    #[test]
    fn test_artifact_status_serde() {
        let json = serde_json::to_string(&ArtifactStatus::Unreadable).unwrap();
        assert_eq!(json, "\"unreadable\"");
    }

    #[test]
    fn test_resolve_relative_uses_working_dir() {
        let a = artifact("src/lib.rs", "/work/repo");
        assert_eq!(a.resolve_path(None), PathBuf::from("/work/repo/src/lib.rs"));
    }

    #[test]
    fn test_resolve_relative_prefers_override() {
        let a = artifact("src/lib.rs", "/work/repo");
        assert_eq!(
            a.resolve_path(Some(Path::new("/checkout"))),
            PathBuf::from("/checkout/src/lib.rs")
        );
    }

    #[test]
    fn test_resolve_absolute_is_unchanged() {
        let a = artifact("/etc/app.conf", "/work/repo");
        assert_eq!(
            a.resolve_path(Some(Path::new("/checkout"))),
            PathBuf::from("/etc/app.conf")
        );
    }
}
