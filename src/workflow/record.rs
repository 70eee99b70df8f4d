//! Workflow and step records.
//!
//! The mutable state a workflow execution accumulates: one
//! [`WorkflowRecord`] per run, owning an ordered sequence of
//! [`StepRecord`]s. The engine is the sole writer of both; everyone else
//! sees cloned snapshots.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::OrchestraError;

/// The closed set of known workflow kinds.
///
/// Dispatch in [`WorkflowEngine::start`](super::WorkflowEngine::start) is
/// exact-match on this set; anything else fails with
/// [`OrchestraError::UnknownWorkflowType`] before any step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Fixed ordered sequence of routed calls (research → plan → build);
    /// each step's prompt feeds on the prior step's result.
    Linear,
    /// Bounded test/fix loop escalating to human review on exhaustion.
    BoundedRetry,
}

impl FromStr for WorkflowKind {
    type Err = OrchestraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Self::Linear),
            "bounded_retry" => Ok(Self::BoundedRetry),
            other => Err(OrchestraError::UnknownWorkflowType(other.to_string())),
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::BoundedRetry => write!(f, "bounded_retry"),
        }
    }
}

/// Terminal and non-terminal workflow statuses.
///
/// `needs_human_review` is a designed terminal outcome — automation is
/// exhausted but the artifact may be salvageable — and must render distinctly
/// from `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Steps are still executing.
    Running,
    /// The workflow reached its goal.
    Completed,
    /// A fatal step failure ended the workflow.
    Failed,
    /// Automatic repair attempts are exhausted; a human should look.
    NeedsHumanReview,
}

impl WorkflowStatus {
    /// Whether this status ends the workflow.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Per-step statuses. `passed` is specific to test steps in the
/// bounded-retry workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step's routed call is in flight.
    Running,
    /// The step produced a result.
    Completed,
    /// The step did not produce a usable result.
    Failed,
    /// A test step met the auto-proceed bar.
    Passed,
}

/// One step of a workflow run.
///
/// Appended to its owning record as `running`, then rewritten exactly once
/// to a settled status. Never mutated after settling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step name (e.g. `research`, `test_attempt_3`).
    pub name: String,
    /// Current step status.
    pub status: StepStatus,
    /// The routed call's response, when one was produced.
    pub result: Option<String>,
    /// Issues reported by a failed test step.
    pub issues: Option<String>,
}

impl StepRecord {
    /// Create a step in the `running` state.
    pub fn running(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Running,
            result: None,
            issues: None,
        }
    }
}

/// The full record of one workflow run.
///
/// Created when the workflow starts, mutated in place by the engine while
/// `running`, retained (as snapshots) in the engine's process-wide table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    /// Unique id, generated at creation.
    pub id: String,
    /// Which workflow kind produced this record.
    pub kind: WorkflowKind,
    /// Current workflow status.
    pub status: WorkflowStatus,
    /// Ordered step sequence.
    pub steps: Vec<StepRecord>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl WorkflowRecord {
    /// Create a fresh `running` record with a generated id.
    pub fn new(kind: WorkflowKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            status: WorkflowStatus::Running,
            steps: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Append a new `running` step and return its index.
    pub fn begin_step(&mut self, name: impl Into<String>) -> usize {
        self.steps.push(StepRecord::running(name));
        self.steps.len() - 1
    }

    /// Mutable access to the most recently appended step.
    pub fn last_step_mut(&mut self) -> Option<&mut StepRecord> {
        self.steps.last_mut()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
