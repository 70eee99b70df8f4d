//! # Stage: Workflow Execution
//!
//! ## Responsibility
//! Drive named multi-step workflows composed of routed calls, record
//! per-step status into a workflow record, and retain records in a bounded
//! process-wide table queryable by id.
//!
//! ## Guarantees
//! - Strictly sequential steps: each step's prompt depends on the prior
//!   step's output; steps are awaited one at a time.
//! - Isolated runs: each record is exclusively owned by the execution that
//!   created it; concurrent workflows never cross-contaminate.
//! - Honest terminal states: a fatal step failure marks the record `failed`
//!   and propagates — never silently treated as success. Exhausting the
//!   bounded retry budget yields `needs_human_review`, which is not an error.
//! - Bounded retention: the table evicts the oldest terminal records past
//!   the configured ceiling; running workflows are never evicted.
//!
//! ## NOT Responsible For
//! - Backend selection and confidence judging (that belongs to `routing`)
//! - Persistence beyond process lifetime (delegate to an external store at
//!   the service boundary if needed)
//! - Cancellation: a started workflow runs to a terminal state

pub mod engine;
pub mod record;

// Re-exports for convenience
pub use engine::{OnLowConfidence, WorkflowConfig, WorkflowEngine};
pub use record::{StepRecord, StepStatus, WorkflowKind, WorkflowRecord, WorkflowStatus};
