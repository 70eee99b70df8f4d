//! # model-orchestra
//!
//! Cost-aware request routing and workflow execution across a catalog of
//! interchangeable text-generation backends.
//!
//! ## Architecture
//!
//! Three layers, leaf-first:
//! ```text
//! BackendRegistry (named adapters) → Router (select / score / escalate)
//!                                  → WorkflowEngine (linear, bounded-retry)
//! ```
//!
//! The [`routing::Router`] picks the cheapest adequate backend for a task
//! category, scores the answer with shallow heuristics, and escalates to a
//! stronger backend only when confidence is marginal. The
//! [`workflow::WorkflowEngine`] drives multi-step sequences of such routed
//! calls, recording per-step status into a process-wide workflow table.

// ── Lint policy (aerospace-grade) ─────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod backend;
pub mod config;
pub mod routing;
pub mod workflow;

#[cfg(feature = "web-api")]
pub mod web_api;

// Re-exports for convenience
pub use backend::{
    AnthropicBackend, BackendAdapter, BackendRegistry, EchoBackend, GeminiBackend, OpenAiBackend,
};
pub use config::EngineConfig;
pub use routing::{ConfidenceEstimator, RouteResult, Router};
pub use workflow::{WorkflowEngine, WorkflowKind, WorkflowRecord, WorkflowStatus};

/// Opaque per-request context, passed through untouched to backend adapters.
///
/// The engine never inspects these values; adapters may use them for
/// backend-specific knobs (user ids, trace tags, sampling hints).
pub type RequestContext = serde_json::Map<String, serde_json::Value>;

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"` — structured JSON output for production log aggregators
/// - anything else (including unset) — human-readable pretty output
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`OrchestraError::Config`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
pub fn init_tracing() -> Result<(), OrchestraError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| OrchestraError::Config(format!("tracing init failed: {e}")))
}

/// Top-level engine errors.
///
/// Every fatal surface in the engine maps to a variant here. Low-confidence
/// rejection is deliberately *not* an error — it is a normal
/// [`RouteResult`](routing::RouteResult) with `success == false`, and
/// `needs_human_review` is a designed terminal workflow status. Callers must
/// check those values explicitly.
#[derive(Error, Debug)]
pub enum OrchestraError {
    /// A backend name was referenced that the registry does not know.
    ///
    /// Fatal to the single Router call unless the fallback path also applies.
    #[error("backend `{0}` is not configured")]
    BackendNotConfigured(String),

    /// A backend invocation failed (transport, auth, quota, or API error).
    ///
    /// Triggers the Router's fallback substitution rather than immediate
    /// failure of the call.
    #[error("backend `{backend}` invocation failed: {message}")]
    BackendInvocation {
        /// Name of the backend whose invocation failed.
        backend: String,
        /// Human-readable description of the underlying failure.
        message: String,
    },

    /// `start()` was called with a workflow kind outside the closed set.
    ///
    /// Raised before any step runs and before any record is created.
    #[error("unknown workflow type `{0}`")]
    UnknownWorkflowType(String),

    /// A configuration value is missing or invalid.
    ///
    /// Returned at construction/load time so that misconfiguration surfaces
    /// immediately rather than at the first routed request.
    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_not_configured_display_includes_name() {
        let err = OrchestraError::BackendNotConfigured("gemini-ultra".to_string());
        assert!(err.to_string().contains("gemini-ultra"));
    }

    #[test]
    fn test_backend_invocation_display_includes_backend_and_message() {
        let err = OrchestraError::BackendInvocation {
            backend: "gpt-3.5-turbo".to_string(),
            message: "HTTP 429".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("gpt-3.5-turbo"));
        assert!(rendered.contains("HTTP 429"));
    }

    #[test]
    fn test_unknown_workflow_type_display_includes_kind() {
        let err = OrchestraError::UnknownWorkflowType("parallel".to_string());
        assert!(err.to_string().contains("parallel"));
    }

    #[test]
    fn test_config_error_display_includes_message() {
        let err = OrchestraError::Config("GEMINI_API_KEY not set".to_string());
        assert!(err.to_string().contains("GEMINI_API_KEY not set"));
    }

    #[test]
    fn test_init_tracing_second_call_returns_err() {
        // First call may succeed or fail depending on test execution order
        // (another test may have already installed a subscriber).
        let _ = init_tracing();
        // Second call must not panic — it should return Err.
        let result = init_tracing();
        assert!(result.is_err(), "double init must return Err, not panic");
    }
}
