//! Workflow execution.
//!
//! The [`WorkflowEngine`] drives named multi-step workflows of routed calls:
//! a fixed linear sequence (research → plan → build) and a bounded test/fix
//! retry loop. Steps are strictly sequential — each step's prompt depends on
//! the prior step's output, so parallel execution would be incorrect, not
//! merely unneeded. Independent workflows may run concurrently; the only
//! shared state is the process-wide record table (per-key locking via
//! `DashMap`).

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::routing::{RouteResult, Router};
use crate::{OrchestraError, RequestContext};

use super::record::{StepStatus, WorkflowKind, WorkflowRecord, WorkflowStatus};

// ── Default value functions ────────────────────────────────────────────

/// Default maximum test/fix iterations before escalating to human review.
fn default_max_fix_attempts() -> u32 {
    5
}

/// Default retained-record ceiling for the process-wide table.
fn default_max_retained() -> usize {
    256
}

// ── Configuration ──────────────────────────────────────────────────────

/// How a linear workflow handles a non-throwing low-confidence route result.
///
/// An explicit option rather than an implicit behavior: a rejected call is a
/// normal value, and what a sequence should do with one is a policy choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnLowConfidence {
    /// Mark the step and the workflow `failed` and stop.
    #[default]
    Abort,
    /// Record the degraded response and continue with the next step.
    Proceed,
    /// Re-issue the identical call once, then abort if still rejected.
    RetryOnce,
}

/// Configuration for the workflow engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Maximum test/fix iterations in the bounded-retry workflow.
    #[serde(default = "default_max_fix_attempts")]
    pub max_fix_attempts: u32,

    /// Linear-workflow policy for rejected (low-confidence) route results.
    #[serde(default)]
    pub on_low_confidence: OnLowConfidence,

    /// Retained-record ceiling for the process-wide table. Once exceeded,
    /// the oldest *terminal* records are evicted; running workflows are
    /// never evicted.
    #[serde(default = "default_max_retained")]
    pub max_retained: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_fix_attempts: default_max_fix_attempts(),
            on_low_confidence: OnLowConfidence::default(),
            max_retained: default_max_retained(),
        }
    }
}

/// Validate a [`WorkflowConfig`], returning a list of human-readable errors.
pub fn validate(config: &WorkflowConfig) -> Vec<String> {
    let mut errors = Vec::new();
    if config.max_fix_attempts == 0 {
        errors.push("workflow.max_fix_attempts must be >= 1".to_string());
    }
    if config.max_retained == 0 {
        errors.push("workflow.max_retained must be >= 1".to_string());
    }
    errors
}

// ── Linear workflow shape ──────────────────────────────────────────────

/// One step of the linear workflow: a name, a task category, and a prompt
/// template applied to the step's input (the seed for step 1, the prior
/// step's result afterwards).
struct LinearStep {
    name: &'static str,
    category: &'static str,
    build_prompt: fn(&str) -> String,
}

const LINEAR_STEPS: [LinearStep; 3] = [
    LinearStep {
        name: "research",
        category: "research",
        build_prompt: |seed| {
            format!("Research requirements for: {seed}. Include technical constraints and dependencies.")
        },
    },
    LinearStep {
        name: "plan",
        category: "critical_decisions",
        build_prompt: |research| format!("Create implementation plan based on research: {research}"),
    },
    LinearStep {
        name: "build",
        category: "code_generation",
        build_prompt: |plan| format!("Generate code implementing this plan: {plan}"),
    },
];

// ── Engine ─────────────────────────────────────────────────────────────

/// Drives multi-step workflows of routed calls and retains their records.
///
/// `start()` is synchronous from the caller's view: it returns once the
/// workflow reaches a terminal status. The engine is the sole writer of
/// workflow records; `get()`/`list()` return cloned snapshots, never
/// mutable handles.
pub struct WorkflowEngine {
    router: Arc<Router>,
    config: WorkflowConfig,
    records: DashMap<String, WorkflowRecord>,
    /// Insertion order of record ids, for bounded eviction.
    order: Mutex<VecDeque<String>>,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("config", &self.config)
            .field("records", &self.records.len())
            .finish()
    }
}

impl WorkflowEngine {
    /// Create an engine over a router.
    pub fn new(router: Arc<Router>, config: WorkflowConfig) -> Self {
        Self {
            router,
            config,
            records: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
        }
    }

    /// Start a workflow and run it to a terminal status.
    ///
    /// `kind` must name a member of the closed set (`linear`,
    /// `bounded_retry`); anything else fails before a record is created.
    /// Required params: `seed` (linear), `artifact` (bounded retry) — both
    /// strings.
    ///
    /// # Errors
    ///
    /// - [`OrchestraError::UnknownWorkflowType`] for an unrecognised `kind`.
    /// - [`OrchestraError::Config`] for missing/mistyped params.
    /// - A fatal routed-call error propagates after the record is marked
    ///   `failed` and published — never silently treated as success.
    pub async fn start(
        &self,
        kind: &str,
        params: &RequestContext,
    ) -> Result<WorkflowRecord, OrchestraError> {
        let kind = WorkflowKind::from_str(kind)?;

        // Required params are checked before any record exists, so a bad
        // request leaves no trace in the table.
        let seed = match kind {
            WorkflowKind::Linear => require_str_param(params, "seed")?,
            WorkflowKind::BoundedRetry => require_str_param(params, "artifact")?,
        };

        let mut record = WorkflowRecord::new(kind);
        info!(workflow = %record.id, %kind, "starting workflow");
        self.insert_record(&record);

        let outcome = match kind {
            WorkflowKind::Linear => self.run_linear(&mut record, &seed).await,
            WorkflowKind::BoundedRetry => self.run_bounded_retry(&mut record, seed).await,
        };

        match outcome {
            Ok(()) => {
                info!(workflow = %record.id, status = ?record.status, "workflow finished");
                self.publish(&record);
                Ok(record)
            }
            Err(e) => {
                warn!(workflow = %record.id, error = %e, "workflow failed");
                record.status = WorkflowStatus::Failed;
                self.publish(&record);
                Err(e)
            }
        }
    }

    /// Snapshot of a single record by id.
    pub fn get(&self, id: &str) -> Option<WorkflowRecord> {
        self.records.get(id).map(|r| r.clone())
    }

    /// Snapshot of the whole table, oldest first.
    pub fn list(&self) -> Vec<WorkflowRecord> {
        let mut records: Vec<WorkflowRecord> =
            self.records.iter().map(|r| r.clone()).collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        records
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // ── Linear workflow ────────────────────────────────────────────────

    async fn run_linear(
        &self,
        record: &mut WorkflowRecord,
        seed: &str,
    ) -> Result<(), OrchestraError> {
        let context = RequestContext::new();
        let mut input = seed.to_string();

        for step in &LINEAR_STEPS {
            record.begin_step(step.name);
            self.publish(record);

            let prompt = (step.build_prompt)(&input);
            let result = self.router.route(step.category, &prompt, &context).await;

            let result = match result {
                Ok(r) => r,
                Err(e) => {
                    settle_step(record, StepStatus::Failed, None, Some(e.to_string()));
                    return Err(e);
                }
            };

            let result = if result.success {
                result
            } else {
                match self.config.on_low_confidence {
                    OnLowConfidence::Proceed => result,
                    OnLowConfidence::RetryOnce => {
                        warn!(
                            workflow = %record.id,
                            step = step.name,
                            confidence = result.confidence_or_zero(),
                            "low-confidence step, retrying once"
                        );
                        let retried = self.router.route(step.category, &prompt, &context).await;
                        match retried {
                            Ok(r) if r.success => r,
                            Ok(r) => {
                                self.abort_low_confidence(record, step.name, &r);
                                return Ok(());
                            }
                            Err(e) => {
                                settle_step(record, StepStatus::Failed, None, Some(e.to_string()));
                                return Err(e);
                            }
                        }
                    }
                    OnLowConfidence::Abort => {
                        self.abort_low_confidence(record, step.name, &result);
                        return Ok(());
                    }
                }
            };

            input = result.response.clone().unwrap_or_default();
            settle_step(record, StepStatus::Completed, result.response, None);
            self.publish(record);
        }

        record.status = WorkflowStatus::Completed;
        Ok(())
    }

    /// Apply abort semantics for a rejected route result: the step and the
    /// record become `failed`. Low confidence is not an exception, so the
    /// caller still receives the record rather than an error.
    fn abort_low_confidence(&self, record: &mut WorkflowRecord, step: &str, result: &RouteResult) {
        warn!(
            workflow = %record.id,
            step,
            confidence = result.confidence_or_zero(),
            "aborting workflow on low-confidence step"
        );
        settle_step(record, StepStatus::Failed, None, result.error.clone());
        record.status = WorkflowStatus::Failed;
    }

    // ── Bounded-retry workflow ─────────────────────────────────────────

    async fn run_bounded_retry(
        &self,
        record: &mut WorkflowRecord,
        mut artifact: String,
    ) -> Result<(), OrchestraError> {
        let context = RequestContext::new();
        let auto_proceed = self.router.config().thresholds.auto_proceed;

        for attempt in 1..=self.config.max_fix_attempts {
            record.begin_step(format!("test_attempt_{attempt}"));
            self.publish(record);

            let prompt = format!("Test this code and identify issues: {artifact}");
            let test = match self.router.route("testing", &prompt, &context).await {
                Ok(r) => r,
                Err(e) => {
                    settle_step(record, StepStatus::Failed, None, Some(e.to_string()));
                    return Err(e);
                }
            };

            if test.confidence_or_zero() >= auto_proceed {
                info!(workflow = %record.id, attempt, "test attempt passed");
                settle_step(record, StepStatus::Passed, test.response, None);
                record.status = WorkflowStatus::Completed;
                return Ok(());
            }

            let issues = test
                .response
                .clone()
                .or_else(|| test.error.clone())
                .unwrap_or_default();
            settle_step(record, StepStatus::Failed, None, Some(issues.clone()));
            self.publish(record);

            record.begin_step(format!("fix_attempt_{attempt}"));
            self.publish(record);

            let prompt = format!("Fix these issues: {issues}. Original code: {artifact}");
            let fix = match self.router.route("code_generation", &prompt, &context).await {
                Ok(r) => r,
                Err(e) => {
                    settle_step(record, StepStatus::Failed, None, Some(e.to_string()));
                    return Err(e);
                }
            };

            if let Some(fixed) = fix.response.clone() {
                artifact = fixed;
            }
            settle_step(record, StepStatus::Completed, fix.response, None);
            self.publish(record);
        }

        warn!(
            workflow = %record.id,
            attempts = self.config.max_fix_attempts,
            "fix attempts exhausted, escalating to human review"
        );
        record.status = WorkflowStatus::NeedsHumanReview;
        Ok(())
    }

    // ── Record table ───────────────────────────────────────────────────

    /// Insert a freshly created record and enforce the retention bound.
    fn insert_record(&self, record: &WorkflowRecord) {
        self.records.insert(record.id.clone(), record.clone());
        if let Ok(mut order) = self.order.lock() {
            order.push_back(record.id.clone());
            self.evict_locked(&mut order);
        }
    }

    /// Publish the current snapshot of a record.
    fn publish(&self, record: &WorkflowRecord) {
        self.records.insert(record.id.clone(), record.clone());
    }

    /// Evict the oldest terminal records until the table fits the bound.
    /// Running workflows are skipped — eviction never loses live state.
    fn evict_locked(&self, order: &mut VecDeque<String>) {
        while self.records.len() > self.config.max_retained {
            let victim = order.iter().position(|id| {
                self.records
                    .get(id)
                    .map(|r| r.status.is_terminal())
                    .unwrap_or(true)
            });
            match victim {
                Some(pos) => {
                    if let Some(id) = order.remove(pos) {
                        self.records.remove(&id);
                    }
                }
                None => break,
            }
        }
    }
}

/// Extract a required string param, with a precise error on absence.
fn require_str_param(params: &RequestContext, key: &str) -> Result<String, OrchestraError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| OrchestraError::Config(format!("missing required string param `{key}`")))
}

/// Rewrite the most recent step from `running` to a settled status.
fn settle_step(
    record: &mut WorkflowRecord,
    status: StepStatus,
    result: Option<String>,
    issues: Option<String>,
) {
    if let Some(step) = record.last_step_mut() {
        step.status = status;
        step.result = result;
        step.issues = issues;
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_config_defaults() {
        let cfg = WorkflowConfig::default();
        assert_eq!(cfg.max_fix_attempts, 5);
        assert_eq!(cfg.on_low_confidence, OnLowConfidence::Abort);
        assert_eq!(cfg.max_retained, 256);
    }

    #[test]
    fn test_workflow_config_deserializes_with_defaults() {
        let cfg: WorkflowConfig = toml::from_str("")
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: deserialize: {e}")));
        assert_eq!(cfg, WorkflowConfig::default());
    }

    #[test]
    fn test_on_low_confidence_serialises_snake_case() {
        let json = serde_json::to_string(&OnLowConfidence::RetryOnce)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: serialize: {e}")));
        assert_eq!(json, "\"retry_once\"");
    }

    #[test]
    fn test_validate_zero_attempts_fails() {
        let cfg = WorkflowConfig {
            max_fix_attempts: 0,
            ..WorkflowConfig::default()
        };
        let errors = validate(&cfg);
        assert!(errors.iter().any(|e| e.contains("max_fix_attempts")));
    }

    #[test]
    fn test_validate_zero_retention_fails() {
        let cfg = WorkflowConfig {
            max_retained: 0,
            ..WorkflowConfig::default()
        };
        let errors = validate(&cfg);
        assert!(errors.iter().any(|e| e.contains("max_retained")));
    }

    #[test]
    fn test_validate_default_config_passes() {
        assert!(validate(&WorkflowConfig::default()).is_empty());
    }

    #[test]
    fn test_require_str_param_missing_key_fails() {
        let params = RequestContext::new();
        let result = require_str_param(&params, "seed");
        assert!(matches!(result, Err(OrchestraError::Config(msg)) if msg.contains("seed")));
    }

    #[test]
    fn test_require_str_param_non_string_value_fails() {
        let mut params = RequestContext::new();
        params.insert("seed".to_string(), serde_json::json!(42));
        assert!(require_str_param(&params, "seed").is_err());
    }

    #[test]
    fn test_linear_steps_feed_forward() {
        // The plan prompt must embed the research output verbatim.
        let prompt = (LINEAR_STEPS[1].build_prompt)("RESEARCH-OUTPUT");
        assert!(prompt.contains("RESEARCH-OUTPUT"));
        assert_eq!(LINEAR_STEPS[1].category, "critical_decisions");
    }
}
