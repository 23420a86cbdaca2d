//! Result and report types returned by the trajectory store.

use serde::{Deserialize, Serialize};

use crate::trajectory::{StepExample, Trajectory, TrajectoryId};

/// A trajectory returned by search, with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTrajectory {
    pub trajectory: Trajectory,
    pub similarity: f32,
}

/// A step example returned by step-level search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredStep {
    pub example: StepExample,
    pub similarity: f32,
}

/// What happened when a trajectory was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddReport {
    pub trajectory_id: TrajectoryId,
    /// Number of code artifacts extracted from the actions.
    pub artifact_count: usize,
    /// Older trajectories deprecated because this one replaced their code.
    pub superseded: Vec<TrajectoryId>,
}

/// Aggregate counters for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_trajectories: usize,
    pub active: usize,
    pub deprecated: usize,
    pub superseded: usize,
    pub total_steps: usize,
    pub total_artifacts: usize,
    /// Trajectories with at least one deferred validation.
    pub validated: usize,
    /// Mean utility over active trajectories (1.0 when there are none).
    pub mean_utility: f64,
    pub embedding_model: String,
}
