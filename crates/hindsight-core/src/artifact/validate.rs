//! Deferred code persistence validation.
//!
//! Checks whether a trajectory's recorded file changes still exist in the
//! working tree. A change that survives is evidence the trajectory did
//! something worth keeping; a reverted change is evidence it did not.

use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::Utc;

use hindsight_types::artifact::{
    ArtifactCheck, ArtifactStatus, CodeArtifact, DeferredValidation, ValidatorType, reason,
};
use hindsight_types::config::ArtifactConfig;
use hindsight_types::trajectory::TrajectoryId;

use super::lines::line_persistence_ratio;
use crate::service::fs::FileSystem;
use crate::service::hash::ContentHasher;

/// Score given to a file that exists but cannot be read.
const UNREADABLE_SCORE: f64 = 0.5;

/// Where to resolve relative artifact paths during a validation run.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    /// Overrides each artifact's recorded working directory when set.
    pub working_dir: Option<PathBuf>,
}

impl ValidationContext {
    pub fn new(working_dir: Option<PathBuf>) -> Self {
        Self { working_dir }
    }
}

/// Validator for the `code_persistence` validator type.
pub struct PersistenceValidator<'a, F: FileSystem, H: ContentHasher> {
    fs: &'a F,
    hasher: &'a H,
    config: &'a ArtifactConfig,
}

impl<'a, F: FileSystem, H: ContentHasher> PersistenceValidator<'a, F, H> {
    pub fn new(fs: &'a F, hasher: &'a H, config: &'a ArtifactConfig) -> Self {
        Self { fs, hasher, config }
    }

    /// Check every artifact and fold the results into one validation.
    pub async fn validate(
        &self,
        trajectory_id: &TrajectoryId,
        artifacts: &[CodeArtifact],
        ctx: &ValidationContext,
    ) -> DeferredValidation {
        if artifacts.is_empty() {
            return DeferredValidation {
                validator_type: ValidatorType::CodePersistence,
                score: 1.0,
                reason: reason::NO_CODE_ARTIFACTS.to_string(),
                details: Vec::new(),
                validated_at: Utc::now(),
            };
        }

        let mut details = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            details.push(self.check(artifact, ctx).await);
        }

        let score = details.iter().map(|d| d.score).sum::<f64>() / details.len() as f64;
        let reason = aggregate_reason(&details);

        tracing::debug!(
            trajectory_id = %trajectory_id,
            artifacts = details.len(),
            score,
            reason,
            "code persistence validated"
        );

        DeferredValidation {
            validator_type: ValidatorType::CodePersistence,
            score,
            reason: reason.to_string(),
            details,
            validated_at: Utc::now(),
        }
    }

    async fn check(&self, artifact: &CodeArtifact, ctx: &ValidationContext) -> ArtifactCheck {
        let path = artifact.resolve_path(ctx.working_dir.as_deref());

        let content = match self.fs.read_file(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return ArtifactCheck {
                    file_path: artifact.file_path.clone(),
                    status: ArtifactStatus::Removed,
                    score: 0.0,
                    line_ratio: None,
                    error: None,
                };
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "artifact file unreadable");
                return ArtifactCheck {
                    file_path: artifact.file_path.clone(),
                    status: ArtifactStatus::Unreadable,
                    score: UNREADABLE_SCORE,
                    line_ratio: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let exact = self.hasher.compute_hash(&content) == artifact.content_hash
            || (!artifact.content_snippet.is_empty() && content.contains(&artifact.content_snippet));
        if exact {
            return ArtifactCheck {
                file_path: artifact.file_path.clone(),
                status: ArtifactStatus::Intact,
                score: 1.0,
                line_ratio: Some(1.0),
                error: None,
            };
        }

        let ratio = line_persistence_ratio(&artifact.content_snippet, &content, self.config.min_line_chars);
        let (status, score) = match ratio {
            Some(r) if r > self.config.intact_ratio => (ArtifactStatus::Intact, r),
            Some(r) if r > self.config.modified_ratio => (ArtifactStatus::Modified, r),
            _ => (ArtifactStatus::Removed, 0.0),
        };

        ArtifactCheck {
            file_path: artifact.file_path.clone(),
            status,
            score,
            line_ratio: ratio,
            error: None,
        }
    }
}

/// Summarize per-artifact statuses into one reason code.
fn aggregate_reason(details: &[ArtifactCheck]) -> &'static str {
    let count = |status| details.iter().filter(|d| d.status == status).count();
    let intact = count(ArtifactStatus::Intact);
    let modified = count(ArtifactStatus::Modified);
    let removed = count(ArtifactStatus::Removed);
    let total = details.len();

    if intact == total {
        reason::ALL_CHANGES_INTACT
    } else if removed == total {
        reason::ALL_CHANGES_REMOVED
    } else if removed + intact == total {
        reason::SOME_CHANGES_REMOVED
    } else if modified + intact == total {
        reason::SOME_CHANGES_MODIFIED
    } else {
        reason::MIXED_RESULTS
    }
}
