//! Request routing logic.
//!
//! The [`Router`] combines a [`ConfidenceEstimator`](super::ConfidenceEstimator)
//! with a [`RoutingConfig`](super::RoutingConfig) and a
//! [`BackendRegistry`](crate::BackendRegistry) to decide which backend serves
//! each request, whether the answer is trustworthy enough to return, and when
//! to substitute a fallback or escalate to the strong backend.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::BackendRegistry;
use crate::{OrchestraError, RequestContext};

use super::config::{RoutingConfig, DEFAULT_CATEGORY};
use super::scorer::ConfidenceEstimator;

/// Confidence assigned when a fallback backend answers after a primary
/// invocation failure. A fixed constant, never re-derived from the estimator.
const FALLBACK_CONFIDENCE: f64 = 0.9;

/// Confidence assigned when the strong backend answers a marginal-confidence
/// escalation. A fixed constant, never re-derived from the estimator.
const ESCALATION_CONFIDENCE: f64 = 0.95;

/// The outcome of a single routed request.
///
/// Produced once per [`Router::route`] call; never persisted. A rejected
/// call (`success == false`) is a normal value, not an error — callers must
/// check `success` explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteResult {
    /// Whether a usable response was produced.
    pub success: bool,
    /// The generated text, when `success` is true.
    pub response: Option<String>,
    /// Confidence attached to the response, or the failing score on rejection.
    pub confidence: Option<f64>,
    /// Name of the backend whose response was returned.
    pub backend_used: Option<String>,
    /// Rejection reason, when `success` is false.
    pub error: Option<String>,
}

impl RouteResult {
    /// Build an accepted result.
    fn accepted(response: String, confidence: f64, backend: &str) -> Self {
        Self {
            success: true,
            response: Some(response),
            confidence: Some(confidence),
            backend_used: Some(backend.to_string()),
            error: None,
        }
    }

    /// Build a low-confidence rejection.
    fn rejected(confidence: f64) -> Self {
        Self {
            success: false,
            response: None,
            confidence: Some(confidence),
            backend_used: None,
            error: Some("confidence too low".to_string()),
        }
    }

    /// Confidence as a plain number, `0.0` when absent.
    pub fn confidence_or_zero(&self) -> f64 {
        self.confidence.unwrap_or(0.0)
    }
}

/// Cost-aware request router.
///
/// Two-tier cost optimisation: always try the cheapest adequate backend for
/// the category; substitute the fallback on transport failure; escalate to
/// the strong backend only on marginal confidence. Transport failures (swap
/// backend, fixed 0.9 confidence) are deliberately treated differently from
/// low-confidence-but-successful answers (re-judge with a better backend,
/// fixed 0.95 confidence).
///
/// Calls are independent and reentrant — the router holds no mutable state.
pub struct Router {
    registry: Arc<BackendRegistry>,
    config: RoutingConfig,
    estimator: ConfidenceEstimator,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("config", &self.config).finish()
    }
}

impl Router {
    /// Create a router over a registry and routing configuration.
    ///
    /// Checks the cross-reference invariant eagerly: every backend name in
    /// the routing table (primary and fallback) and the strong backend must
    /// exist in the registry, so a dangling name surfaces at startup rather
    /// than on the first unlucky request.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestraError::Config`] when the configuration violates its
    /// own invariants or references an unregistered backend.
    pub fn new(registry: Arc<BackendRegistry>, config: RoutingConfig) -> Result<Self, OrchestraError> {
        let errors = super::config::validate(&config);
        if !errors.is_empty() {
            return Err(OrchestraError::Config(errors.join("; ")));
        }

        for (category, entry) in &config.table {
            for name in [&entry.primary, &entry.fallback] {
                if !registry.contains(name) {
                    return Err(OrchestraError::Config(format!(
                        "category `{category}` references unregistered backend `{name}`"
                    )));
                }
            }
        }
        if !registry.contains(&config.strong_backend) {
            return Err(OrchestraError::Config(format!(
                "strong backend `{}` is not registered",
                config.strong_backend
            )));
        }

        Ok(Self {
            registry,
            config,
            estimator: ConfidenceEstimator::new(),
        })
    }

    /// Read access to the routing configuration.
    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Route a request: select a backend, invoke it, judge the answer.
    ///
    /// 1. Look up `task_category`; absent categories use the
    ///    [`DEFAULT_CATEGORY`] entry.
    /// 2. Invoke the primary backend, passing `context` through untouched.
    ///    On invocation failure, invoke the category's fallback; its success
    ///    returns with the fixed 0.9 confidence, its failure propagates.
    /// 3. On primary success, score the response:
    ///    accept / escalate-to-strong / reject per the thresholds.
    ///
    /// # Errors
    ///
    /// Propagates backend errors only when the substitution chain is
    /// exhausted: fallback failure after primary failure, or strong-backend
    /// failure during escalation. Low confidence is *not* an error.
    pub async fn route(
        &self,
        task_category: &str,
        prompt: &str,
        context: &RequestContext,
    ) -> Result<RouteResult, OrchestraError> {
        let (category, entry) = match self.config.table.get(task_category) {
            Some(entry) => (task_category, entry),
            None => {
                debug!(
                    category = task_category,
                    "unknown task category, routing as {DEFAULT_CATEGORY}"
                );
                let entry = self.config.table.get(DEFAULT_CATEGORY).ok_or_else(|| {
                    // Unreachable after construction-time validation.
                    OrchestraError::Config(format!(
                        "routing table lost the `{DEFAULT_CATEGORY}` entry"
                    ))
                })?;
                (DEFAULT_CATEGORY, entry)
            }
        };

        info!(
            category,
            backend = %entry.primary,
            savings = entry.cost_savings.as_deref().unwrap_or("n/a"),
            "routing request"
        );

        let primary_response = match self.registry.invoke(&entry.primary, prompt, context).await {
            Ok(response) => response,
            Err(primary_err) => {
                warn!(
                    category,
                    primary = %entry.primary,
                    fallback = %entry.fallback,
                    error = %primary_err,
                    "primary backend failed, substituting fallback"
                );
                let fallback_response =
                    self.registry.invoke(&entry.fallback, prompt, context).await?;
                return Ok(RouteResult::accepted(
                    fallback_response,
                    FALLBACK_CONFIDENCE,
                    &entry.fallback,
                ));
            }
        };

        let confidence = self.estimator.score(&primary_response);
        let thresholds = &self.config.thresholds;

        if confidence >= thresholds.auto_proceed {
            return Ok(RouteResult::accepted(
                primary_response,
                confidence,
                &entry.primary,
            ));
        }

        if confidence >= thresholds.retry_with_strong {
            warn!(
                category,
                confidence,
                strong = %self.config.strong_backend,
                "marginal confidence, escalating to strong backend"
            );
            let strong_response = self
                .registry
                .invoke(&self.config.strong_backend, prompt, context)
                .await?;
            return Ok(RouteResult::accepted(
                strong_response,
                ESCALATION_CONFIDENCE,
                &self.config.strong_backend,
            ));
        }

        info!(category, confidence, "rejecting low-confidence response");
        Ok(RouteResult::rejected(confidence))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendAdapter;
    use crate::routing::config::{RouteEntry, RoutingTable};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stub adapter returning a fixed response, counting invocations.
    struct FixedBackend {
        response: String,
        calls: AtomicUsize,
    }

    impl FixedBackend {
        fn new(response: &str) -> Arc<Self> {
            Arc::new(Self {
                response: response.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl BackendAdapter for FixedBackend {
        async fn generate(
            &self,
            _prompt: &str,
            _context: &RequestContext,
        ) -> Result<String, OrchestraError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    /// Stub adapter that always fails with an invocation error.
    struct FailingBackend;

    #[async_trait]
    impl BackendAdapter for FailingBackend {
        async fn generate(
            &self,
            _prompt: &str,
            _context: &RequestContext,
        ) -> Result<String, OrchestraError> {
            Err(OrchestraError::BackendInvocation {
                backend: "failing".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    /// Stub adapter that records the context it receives.
    struct ContextProbe {
        seen: std::sync::Mutex<Option<RequestContext>>,
    }

    #[async_trait]
    impl BackendAdapter for ContextProbe {
        async fn generate(
            &self,
            _prompt: &str,
            context: &RequestContext,
        ) -> Result<String, OrchestraError> {
            if let Ok(mut guard) = self.seen.lock() {
                *guard = Some(context.clone());
            }
            Ok("a long enough probe response".to_string())
        }
    }

    fn table(primary: &str, fallback: &str) -> RoutingTable {
        let mut t = RoutingTable::new();
        t.insert(
            DEFAULT_CATEGORY.to_string(),
            RouteEntry {
                primary: primary.to_string(),
                fallback: fallback.to_string(),
                cost_savings: Some("80%".to_string()),
            },
        );
        t
    }

    fn router_with(
        registry: BackendRegistry,
        table: RoutingTable,
        strong: &str,
    ) -> Router {
        let config = RoutingConfig {
            table,
            strong_backend: strong.to_string(),
            ..RoutingConfig::default()
        };
        match Router::new(Arc::new(registry), config) {
            Ok(r) => r,
            Err(e) => std::panic::panic_any(format!("test: router construction: {e}")),
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new()
    }

    // -- accept path ------------------------------------------------------

    #[tokio::test]
    async fn test_route_confident_primary_accepted_as_primary() {
        let mut registry = BackendRegistry::new();
        registry.register("cheap", FixedBackend::new("A thorough, usable answer."));
        registry.register("mid", FixedBackend::new("unused"));
        registry.register("strong", FixedBackend::new("unused"));
        let router = router_with(registry, table("cheap", "mid"), "strong");

        let result = match router.route(DEFAULT_CATEGORY, "prompt", &ctx()).await {
            Ok(r) => r,
            Err(e) => std::panic::panic_any(format!("test: route: {e}")),
        };
        assert!(result.success);
        assert_eq!(result.backend_used.as_deref(), Some("cheap"));
        assert!((result.confidence_or_zero() - 0.92).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_route_unknown_category_uses_default_entry() {
        let mut registry = BackendRegistry::new();
        registry.register("cheap", FixedBackend::new("A thorough, usable answer."));
        registry.register("mid", FixedBackend::new("unused"));
        registry.register("strong", FixedBackend::new("unused"));
        let router = router_with(registry, table("cheap", "mid"), "strong");

        let known = match router.route(DEFAULT_CATEGORY, "prompt", &ctx()).await {
            Ok(r) => r,
            Err(e) => std::panic::panic_any(format!("test: route: {e}")),
        };
        let unknown = match router.route("no_such_category", "prompt", &ctx()).await {
            Ok(r) => r,
            Err(e) => std::panic::panic_any(format!("test: route: {e}")),
        };
        assert_eq!(known, unknown);
    }

    // -- fallback path ----------------------------------------------------

    #[tokio::test]
    async fn test_route_primary_failure_uses_fallback_with_fixed_confidence() {
        let mut registry = BackendRegistry::new();
        registry.register("cheap", Arc::new(FailingBackend));
        // Fallback answer would score 0.92 if it were estimated; the fixed
        // 0.9 constant proves the estimator is bypassed on this path.
        registry.register("mid", FixedBackend::new("A thorough, usable answer."));
        registry.register("strong", FixedBackend::new("unused"));
        let router = router_with(registry, table("cheap", "mid"), "strong");

        let result = match router.route(DEFAULT_CATEGORY, "prompt", &ctx()).await {
            Ok(r) => r,
            Err(e) => std::panic::panic_any(format!("test: route: {e}")),
        };
        assert!(result.success);
        assert_eq!(result.backend_used.as_deref(), Some("mid"));
        assert!((result.confidence_or_zero() - 0.9).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_route_unregistered_primary_name_in_table_is_rejected_at_construction() {
        let mut registry = BackendRegistry::new();
        registry.register("mid", FixedBackend::new("x"));
        registry.register("strong", FixedBackend::new("x"));
        let config = RoutingConfig {
            table: table("ghost", "mid"),
            strong_backend: "strong".to_string(),
            ..RoutingConfig::default()
        };
        let result = Router::new(Arc::new(registry), config);
        assert!(matches!(result, Err(OrchestraError::Config(_))));
    }

    #[tokio::test]
    async fn test_route_fallback_failure_propagates() {
        let mut registry = BackendRegistry::new();
        registry.register("cheap", Arc::new(FailingBackend));
        registry.register("mid", Arc::new(FailingBackend));
        registry.register("strong", FixedBackend::new("unused"));
        let router = router_with(registry, table("cheap", "mid"), "strong");

        let result = router.route(DEFAULT_CATEGORY, "prompt", &ctx()).await;
        assert!(matches!(
            result,
            Err(OrchestraError::BackendInvocation { .. })
        ));
    }

    // -- escalation path --------------------------------------------------

    #[tokio::test]
    async fn test_route_marginal_confidence_escalates_to_strong_backend() {
        let mut registry = BackendRegistry::new();
        // "uncertain" marker → 0.6, inside [retry_with_strong, auto_proceed)
        registry.register("cheap", FixedBackend::new("The result is uncertain overall"));
        registry.register("mid", FixedBackend::new("unused"));
        let strong = FixedBackend::new("A definitive strong-model answer.");
        registry.register("strong", strong.clone() as Arc<dyn BackendAdapter>);
        let router = router_with(registry, table("cheap", "mid"), "strong");

        let result = match router.route(DEFAULT_CATEGORY, "prompt", &ctx()).await {
            Ok(r) => r,
            Err(e) => std::panic::panic_any(format!("test: route: {e}")),
        };
        assert!(result.success);
        assert_eq!(result.backend_used.as_deref(), Some("strong"));
        assert!((result.confidence_or_zero() - 0.95).abs() < f64::EPSILON);
        assert_eq!(
            result.response.as_deref(),
            Some("A definitive strong-model answer.")
        );
        assert_eq!(strong.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_route_escalation_failure_propagates() {
        let mut registry = BackendRegistry::new();
        registry.register("cheap", FixedBackend::new("The result is uncertain overall"));
        registry.register("mid", FixedBackend::new("unused"));
        registry.register("strong", Arc::new(FailingBackend));
        let router = router_with(registry, table("cheap", "mid"), "strong");

        let result = router.route(DEFAULT_CATEGORY, "prompt", &ctx()).await;
        assert!(matches!(
            result,
            Err(OrchestraError::BackendInvocation { .. })
        ));
    }

    // -- rejection path ---------------------------------------------------

    #[tokio::test]
    async fn test_route_degenerate_response_rejected_without_escalation() {
        let mut registry = BackendRegistry::new();
        registry.register("cheap", FixedBackend::new("meh")); // < 10 chars → 0.3
        registry.register("mid", FixedBackend::new("unused"));
        let strong = FixedBackend::new("unused");
        registry.register("strong", strong.clone() as Arc<dyn BackendAdapter>);
        let router = router_with(registry, table("cheap", "mid"), "strong");

        let result = match router.route(DEFAULT_CATEGORY, "prompt", &ctx()).await {
            Ok(r) => r,
            Err(e) => std::panic::panic_any(format!("test: route: {e}")),
        };
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("confidence too low"));
        assert!((result.confidence_or_zero() - 0.3).abs() < f64::EPSILON);
        assert!(result.response.is_none());
        // No further escalation on rejection.
        assert_eq!(strong.calls.load(Ordering::SeqCst), 0);
    }

    // -- context passthrough ----------------------------------------------

    #[tokio::test]
    async fn test_route_passes_context_through_untouched() {
        let probe = Arc::new(ContextProbe {
            seen: std::sync::Mutex::new(None),
        });
        let mut registry = BackendRegistry::new();
        registry.register("cheap", probe.clone() as Arc<dyn BackendAdapter>);
        registry.register("mid", FixedBackend::new("unused"));
        registry.register("strong", FixedBackend::new("unused"));
        let router = router_with(registry, table("cheap", "mid"), "strong");

        let mut context = RequestContext::new();
        context.insert("user".to_string(), serde_json::json!("u-42"));
        context.insert("trace".to_string(), serde_json::json!({"span": 7}));

        let _ = router.route(DEFAULT_CATEGORY, "prompt", &context).await;

        let seen = match probe.seen.lock() {
            Ok(guard) => guard.clone(),
            Err(e) => std::panic::panic_any(format!("test: lock: {e}")),
        };
        assert_eq!(seen, Some(context));
    }

    // -- RouteResult ------------------------------------------------------

    #[test]
    fn test_route_result_serialises_snake_case_fields() {
        let result = RouteResult::rejected(0.3);
        let json = serde_json::to_string(&result)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: serialize: {e}")));
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"backend_used\":null"));
        assert!(json.contains("confidence too low"));
    }

    #[test]
    fn test_confidence_or_zero_defaults_to_zero() {
        let result = RouteResult {
            success: false,
            response: None,
            confidence: None,
            backend_used: None,
            error: None,
        };
        assert!(result.confidence_or_zero().abs() < f64::EPSILON);
    }
}
