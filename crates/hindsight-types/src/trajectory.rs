//! Trajectory types for Hindsight.
//!
//! A trajectory is one recorded, completed agent episode: the goal it was
//! given, the plan it made, and every decision point (step) it went through.
//! Trajectories are immutable once stored.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a trajectory, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrajectoryId(pub Uuid);

impl TrajectoryId {
    /// Create a new TrajectoryId using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create a TrajectoryId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for TrajectoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrajectoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TrajectoryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// One decision point inside an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// What the agent saw before deciding.
    pub observation: String,
    /// Why it chose the action.
    pub reasoning: String,
    /// The action taken, usually a serialized tool call.
    pub action: String,
}

impl Step {
    pub fn new(
        observation: impl Into<String>,
        reasoning: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            observation: observation.into(),
            reasoning: reasoning.into(),
            action: action.into(),
        }
    }

    /// Text used for step-level embeddings. The action is never embedded.
    pub fn embedding_text(&self) -> String {
        format!("{}\n{}", self.observation, self.reasoning)
    }
}

/// A completed agent episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub id: TrajectoryId,
    /// The task the agent was given.
    pub goal: String,
    /// The plan it produced before acting.
    pub plan: String,
    pub steps: Vec<Step>,
    /// Whether the episode reached its goal.
    pub success: bool,
    /// Free-form caller metadata (model, task source, tags, ...).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Trajectory {
    /// Create a trajectory with a fresh id and no metadata.
    pub fn new(goal: impl Into<String>, plan: impl Into<String>, steps: Vec<Step>, success: bool) -> Self {
        Self {
            id: TrajectoryId::new(),
            goal: goal.into(),
            plan: plan.into(),
            steps,
            success,
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata value, builder style.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Text used for trajectory-level embeddings.
    pub fn embedding_text(&self) -> String {
        format!("{}\n{}", self.goal, self.plan)
    }

    /// Denormalize one step with its parent context.
    pub fn step_example(&self, step_index: usize) -> Option<StepExample> {
        let step = self.steps.get(step_index)?;
        Some(StepExample {
            trajectory_id: self.id.clone(),
            goal: self.goal.clone(),
            plan: self.plan.clone(),
            step_index,
            step: step.clone(),
        })
    }

    /// Render the trajectory as an in-context example for a planning prompt.
    pub fn to_prompt_example(&self) -> String {
        let mut out = format!("Goal: {}\nPlan: {}\n", self.goal, self.plan);
        for (i, step) in self.steps.iter().enumerate() {
            out.push_str(&format!(
                "Step {}:\n  Observation: {}\n  Reasoning: {}\n  Action: {}\n",
                i + 1,
                step.observation,
                step.reasoning,
                step.action
            ));
        }
        out.push_str(&format!(
            "Outcome: {}\n",
            if self.success { "success" } else { "failure" }
        ));
        out
    }
}

/// Key of a step vector in the step-level index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepKey {
    pub trajectory_id: TrajectoryId,
    pub step_index: usize,
}

/// One decision point denormalized with its parent's context.
///
/// The retrieval unit for mid-episode (step-level) search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExample {
    pub trajectory_id: TrajectoryId,
    pub goal: String,
    pub plan: String,
    pub step_index: usize,
    pub step: Step,
}

impl StepExample {
    /// Render the step as an in-context example for an acting prompt.
    pub fn to_prompt_example(&self) -> String {
        format!(
            "Goal: {}\nObservation: {}\nReasoning: {}\nAction: {}\n",
            self.goal, self.step.observation, self.step.reasoning, self.step.action
        )
    }
}
