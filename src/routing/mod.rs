//! # Stage: Request Routing
//!
//! ## Responsibility
//! Route each (task category, prompt) request to the optimal backend.
//! Bulk categories go to cheap backends; invocation failures substitute the
//! category's fallback; marginal-confidence answers escalate to the strong
//! backend; clearly degenerate answers are rejected outright.
//!
//! ## Guarantees
//! - Deterministic judging: the same response text always produces the same
//!   confidence score.
//! - Reentrant: `route()` touches no shared mutable state; concurrent calls
//!   never interfere.
//! - Total: every request resolves to a primary/fallback pair, even for task
//!   categories absent from the table (the `critical_decisions` entry).
//! - Fixed escalation constants: fallback answers carry 0.9, strong-backend
//!   answers 0.95 — never re-derived from the estimator.
//!
//! ## NOT Responsible For
//! - Backend wire formats (that belongs to `backend`)
//! - Multi-step sequencing and retry loops (that belongs to `workflow`)
//! - Semantic evaluation of response quality (heuristic-only)

pub mod config;
pub mod router;
pub mod scorer;

// Re-exports for convenience
pub use config::{ConfidenceThresholds, RouteEntry, RoutingConfig, RoutingTable, DEFAULT_CATEGORY};
pub use router::{RouteResult, Router};
pub use scorer::ConfidenceEstimator;
