//! Curation metadata: the utility model and the deprecation state machine.
//!
//! Every stored trajectory carries exactly one `CurationMetadata`. Its
//! `utility_score` starts at the optimistic prior of 1.0 and is only ever
//! recomputed from accumulated evidence:
//!
//! - retrieval channel: success rate once `times_retrieved >= min_retrievals`
//! - persistence channel: the latest deferred validation score
//!
//! The two channels are combined as a weighted mean (1:2 by default).
//! Deprecation is a one-way transition; there is no way back to `Active`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::{CodeArtifact, DeferredValidation};
use crate::config::CurationConfig;
use crate::trajectory::TrajectoryId;

/// Utility of a trajectory with no evidence yet.
pub const UTILITY_PRIOR: f64 = 1.0;

/// Deprecation reason used when a newer trajectory replaced the same code.
pub const SUPERSEDED_REASON: &str = "superseded";

/// Lifecycle of a stored trajectory with respect to retrieval eligibility.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeprecationState {
    #[default]
    Active,
    Deprecated {
        reason: String,
        deprecated_at: DateTime<Utc>,
        /// Newer trajectory that replaced this one, if any.
        superseded_by: Option<TrajectoryId>,
    },
}

/// Curation record kept alongside each trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationMetadata {
    pub trajectory_id: TrajectoryId,
    /// When the trajectory was inserted; orders "older" vs "newer".
    pub created_at: DateTime<Utc>,
    pub times_retrieved: u32,
    pub times_led_to_success: u32,
    pub code_artifacts: Vec<CodeArtifact>,
    /// Append-only validation history.
    pub validations: Vec<DeferredValidation>,
    pub retrieval_score: Option<f64>,
    pub persistence_score: Option<f64>,
    pub utility_score: f64,
    #[serde(default)]
    pub deprecation: DeprecationState,
}

impl CurationMetadata {
    /// Fresh metadata for a newly stored trajectory.
    pub fn new(trajectory_id: TrajectoryId, code_artifacts: Vec<CodeArtifact>) -> Self {
        Self {
            trajectory_id,
            created_at: Utc::now(),
            times_retrieved: 0,
            times_led_to_success: 0,
            code_artifacts,
            validations: Vec::new(),
            retrieval_score: None,
            persistence_score: None,
            utility_score: UTILITY_PRIOR,
            deprecation: DeprecationState::Active,
        }
    }

    /// Count one episode in which this trajectory was shown.
    pub fn record_retrieval(&mut self, led_to_success: bool, config: &CurationConfig) {
        self.times_retrieved += 1;
        if led_to_success {
            self.times_led_to_success += 1;
        }
        self.recompute_utility(config);
    }

    /// Append a validation; only the latest one feeds the persistence channel.
    pub fn add_validation(&mut self, validation: DeferredValidation, config: &CurationConfig) {
        self.validations.push(validation);
        self.recompute_utility(config);
    }

    pub fn latest_validation(&self) -> Option<&DeferredValidation> {
        self.validations.last()
    }

    /// Recompute channel scores and the blended utility from evidence.
    pub fn recompute_utility(&mut self, config: &CurationConfig) {
        self.retrieval_score = if self.times_retrieved >= config.min_retrievals && self.times_retrieved > 0 {
            Some(self.times_led_to_success as f64 / self.times_retrieved as f64)
        } else {
            None
        };
        self.persistence_score = self.latest_validation().map(|v| v.score.clamp(0.0, 1.0));

        let channels = [
            (self.retrieval_score, config.retrieval_weight),
            (self.persistence_score, config.persistence_weight),
        ];
        let (weighted, total_weight) = channels
            .iter()
            .filter_map(|(score, weight)| score.map(|s| (s * weight, *weight)))
            .fold((0.0, 0.0), |(acc, w), (s, weight)| (acc + s, w + weight));

        self.utility_score = if total_weight > 0.0 {
            (weighted / total_weight).clamp(0.0, 1.0)
        } else {
            UTILITY_PRIOR
        };
    }

    /// Move to `Deprecated`. Returns `false` if already deprecated, in which
    /// case the original reason and successor are kept.
    pub fn deprecate(&mut self, reason: impl Into<String>, superseded_by: Option<TrajectoryId>) -> bool {
        if self.is_deprecated() {
            return false;
        }
        self.deprecation = DeprecationState::Deprecated {
            reason: reason.into(),
            deprecated_at: Utc::now(),
            superseded_by,
        };
        true
    }

    pub fn is_deprecated(&self) -> bool {
        matches!(self.deprecation, DeprecationState::Deprecated { .. })
    }

    pub fn deprecated_at(&self) -> Option<DateTime<Utc>> {
        match &self.deprecation {
            DeprecationState::Deprecated { deprecated_at, .. } => Some(*deprecated_at),
            DeprecationState::Active => None,
        }
    }

    pub fn deprecation_reason(&self) -> Option<&str> {
        match &self.deprecation {
            DeprecationState::Deprecated { reason, .. } => Some(reason),
            DeprecationState::Active => None,
        }
    }

    pub fn superseded_by(&self) -> Option<&TrajectoryId> {
        match &self.deprecation {
            DeprecationState::Deprecated { superseded_by, .. } => superseded_by.as_ref(),
            DeprecationState::Active => None,
        }
    }

    /// Eviction predicate: enough retrievals to judge, and utility below threshold.
    pub fn is_low_utility(&self, threshold: f64, config: &CurationConfig) -> bool {
        self.times_retrieved >= config.min_retrievals && self.utility_score < threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ValidatorType;

    fn validation(score: f64) -> DeferredValidation {
        DeferredValidation {
            validator_type: ValidatorType::CodePersistence,
            score,
            reason: "test".to_string(),
            details: Vec::new(),
            validated_at: Utc::now(),
        }
    }

    fn fresh() -> CurationMetadata {
        CurationMetadata::new(TrajectoryId::new(), Vec::new())
    }

    #[test]
    fn test_fresh_metadata_has_prior() {
        let meta = fresh();
        assert_eq!(meta.utility_score, UTILITY_PRIOR);
        assert!(meta.retrieval_score.is_none());
        assert!(meta.persistence_score.is_none());
        assert!(!meta.is_deprecated());
    }

    #[test]
    fn test_retrieval_channel_needs_min_sample() {
        let config = CurationConfig::default();
        let mut meta = fresh();
        meta.record_retrieval(false, &config);
        meta.record_retrieval(false, &config);
        assert!(meta.retrieval_score.is_none());
        assert_eq!(meta.utility_score, UTILITY_PRIOR);

        meta.record_retrieval(true, &config);
        let expected = 1.0 / 3.0;
        assert!((meta.retrieval_score.unwrap() - expected).abs() < 1e-9);
        assert!((meta.utility_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_persistence_outweighs_retrieval_two_to_one() {
        let config = CurationConfig::default();
        let mut meta = fresh();
        for _ in 0..4 {
            meta.record_retrieval(false, &config);
        }
        meta.add_validation(validation(1.0), &config);
        // (0.0 * 1 + 1.0 * 2) / 3
        assert!((meta.utility_score - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_only_latest_validation_counts() {
        let config = CurationConfig::default();
        let mut meta = fresh();
        meta.add_validation(validation(0.0), &config);
        meta.add_validation(validation(0.75), &config);
        assert_eq!(meta.validations.len(), 2);
        assert_eq!(meta.persistence_score, Some(0.75));
        assert!((meta.utility_score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_deprecate_is_one_way_and_idempotent() {
        let mut meta = fresh();
        let successor = TrajectoryId::new();
        assert!(meta.deprecate(SUPERSEDED_REASON, Some(successor.clone())));
        assert!(!meta.deprecate("manual", None));
        assert!(meta.is_deprecated());
        assert_eq!(meta.deprecation_reason(), Some(SUPERSEDED_REASON));
        assert_eq!(meta.superseded_by(), Some(&successor));
        assert!(meta.deprecated_at().is_some());

        // Evidence updates never reactivate
        meta.record_retrieval(true, &CurationConfig::default());
        assert!(meta.is_deprecated());
    }

    #[test]
    fn test_fresh_metadata_is_never_low_utility() {
        let config = CurationConfig::default();
        let meta = fresh();
        assert!(!meta.is_low_utility(1.1, &config));
    }

    #[test]
    fn test_low_utility_after_failed_retrievals() {
        let config = CurationConfig::default();
        let mut meta = fresh();
        for _ in 0..3 {
            meta.record_retrieval(false, &config);
        }
        assert_eq!(meta.utility_score, 0.0);
        assert!(meta.is_low_utility(config.utility_threshold, &config));
    }

    #[test]
    fn test_deprecation_state_serde_is_tagged() {
        let mut meta = fresh();
        meta.deprecate("manual", None);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["deprecation"]["state"], "deprecated");
        assert_eq!(json["deprecation"]["reason"], "manual");
        let parsed: CurationMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, meta);
    }
}
