//! Supersession: detecting that a newer trajectory replaced older code.
//!
//! Two artifacts overlap when they touch the same file and their snippets
//! share enough non-trivial lines. Touching the same file in disjoint regions
//! is not overlap.

use std::path::{Component, PathBuf};

use hindsight_types::artifact::CodeArtifact;
use hindsight_types::config::ArtifactConfig;
use hindsight_types::trajectory::TrajectoryId;

use crate::artifact::lines::shared_line_count;

/// Whether two artifacts change the same code.
pub fn artifacts_overlap(a: &CodeArtifact, b: &CodeArtifact, config: &ArtifactConfig) -> bool {
    normalized_path(a) == normalized_path(b)
        && shared_line_count(&a.content_snippet, &b.content_snippet, config.min_line_chars)
            >= config.min_shared_lines
}

/// Candidates (id, artifacts) that any of `new_artifacts` supersedes.
///
/// Returned in candidate order, each id at most once.
pub fn find_superseded<'a, I>(
    new_artifacts: &[CodeArtifact],
    candidates: I,
    config: &ArtifactConfig,
) -> Vec<TrajectoryId>
where
    I: IntoIterator<Item = (&'a TrajectoryId, &'a [CodeArtifact])>,
{
    if new_artifacts.is_empty() {
        return Vec::new();
    }

    candidates
        .into_iter()
        .filter(|(_, old)| {
            old.iter().any(|old_artifact| {
                new_artifacts
                    .iter()
                    .any(|new_artifact| artifacts_overlap(new_artifact, old_artifact, config))
            })
        })
        .map(|(id, _)| id.clone())
        .collect()
}

/// Absolute path with `.` dropped and `..` folded lexically.
fn normalized_path(artifact: &CodeArtifact) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in artifact.resolve_path(None).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}
