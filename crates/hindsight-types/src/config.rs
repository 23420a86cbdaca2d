//! Configuration types for Hindsight.
//!
//! `HindsightConfig` represents `config.toml` in the data directory. Every
//! field has a default, so an empty or missing file yields a working store.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the trajectory store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HindsightConfig {
    /// Over-fetch factor used when filtering deprecated search results.
    #[serde(default = "default_search_overfetch")]
    pub search_overfetch: usize,

    #[serde(default)]
    pub curation: CurationConfig,

    #[serde(default)]
    pub artifacts: ArtifactConfig,
}

fn default_search_overfetch() -> usize {
    3
}

impl Default for HindsightConfig {
    fn default() -> Self {
        Self {
            search_overfetch: default_search_overfetch(),
            curation: CurationConfig::default(),
            artifacts: ArtifactConfig::default(),
        }
    }
}

/// Utility model and eviction policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    /// Retrievals required before the retrieval channel counts as evidence.
    pub min_retrievals: u32,
    /// Weight of the retrieval-outcome channel.
    pub retrieval_weight: f64,
    /// Weight of the persistence-validation channel.
    pub persistence_weight: f64,
    /// Trajectories below this utility (with enough retrievals) are evicted.
    pub utility_threshold: f64,
    /// Run a curation sweep every N successful episodes.
    pub curate_every: u32,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            min_retrievals: 3,
            retrieval_weight: 1.0,
            persistence_weight: 2.0,
            utility_threshold: 0.3,
            curate_every: 10,
        }
    }
}

/// Artifact extraction, persistence validation and supersession tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Maximum characters of content kept as a snippet.
    pub snippet_max_chars: usize,
    /// Trimmed lines must be longer than this to count as non-trivial.
    pub min_line_chars: usize,
    /// Non-trivial lines two same-file snippets must share to overlap.
    pub min_shared_lines: usize,
    /// Line-persistence ratio above which an artifact is intact.
    pub intact_ratio: f64,
    /// Line-persistence ratio above which an artifact is modified.
    pub modified_ratio: f64,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            snippet_max_chars: 1000,
            min_line_chars: 3,
            min_shared_lines: 2,
            intact_ratio: 0.8,
            modified_ratio: 0.3,
        }
    }
}
