//! # Stage: Engine Configuration
//!
//! ## Responsibility
//! Parse and validate the engine's TOML configuration: the routing table,
//! confidence thresholds, strong-backend designation, and workflow settings.
//! Loaded once at startup; immutable for the process lifetime.
//!
//! ## Guarantees
//! - Deterministic: the same TOML input always produces the same config
//! - Validated: all semantic constraints are checked before a config is
//!   accepted
//! - Defaulted: every field has a documented default, so an empty file is a
//!   valid config
//!
//! ## NOT Responsible For
//! - Registering backend adapters (that belongs to `backend`; the
//!   cross-reference check runs at `Router` construction)
//! - Hot reloading: config changes require a restart

pub mod loader;

use serde::{Deserialize, Serialize};

use crate::routing::RoutingConfig;
use crate::workflow::WorkflowConfig;

pub use loader::{load_from_file, load_from_str};

/// Root configuration for the engine.
///
/// Deserialized from a TOML file and validated before use.
///
/// # Example
///
/// ```toml
/// strong_backend = "claude-3-sonnet"
///
/// [thresholds]
/// auto_proceed = 0.85
/// retry_with_strong = 0.6
///
/// [table.research]
/// primary = "gemini-flash"
/// fallback = "gpt-3.5-turbo"
/// cost_savings = "85%"
///
/// [workflow]
/// max_fix_attempts = 5
/// on_low_confidence = "abort"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EngineConfig {
    /// Routing table, thresholds, and strong-backend designation.
    #[serde(default, flatten)]
    pub routing: RoutingConfig,

    /// Workflow engine settings.
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// Validate an [`EngineConfig`], returning a list of human-readable errors.
///
/// An empty `Vec` means the config is acceptable.
pub fn validate(config: &EngineConfig) -> Vec<String> {
    let mut errors = crate::routing::config::validate(&config.routing);
    errors.extend(crate::workflow::engine::validate(&config.workflow));
    errors
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_engine_config_passes_validation() {
        let errors = validate(&EngineConfig::default());
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn test_engine_config_deserializes_from_empty_toml() {
        let cfg: EngineConfig = toml::from_str("")
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: deserialize: {e}")));
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn test_engine_config_overrides_apply() {
        let toml_src = r#"
            strong_backend = "claude-3-opus"

            [thresholds]
            auto_proceed = 0.8
            retry_with_strong = 0.5

            [workflow]
            max_fix_attempts = 3
            on_low_confidence = "proceed"
        "#;
        let cfg: EngineConfig = toml::from_str(toml_src)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: deserialize: {e}")));
        assert_eq!(cfg.routing.strong_backend, "claude-3-opus");
        assert!((cfg.routing.thresholds.auto_proceed - 0.8).abs() < f64::EPSILON);
        assert_eq!(cfg.workflow.max_fix_attempts, 3);
        assert_eq!(
            cfg.workflow.on_low_confidence,
            crate::workflow::OnLowConfidence::Proceed
        );
    }

    #[test]
    fn test_validate_aggregates_routing_and_workflow_errors() {
        let mut cfg = EngineConfig::default();
        cfg.routing.strong_backend = String::new();
        cfg.workflow.max_fix_attempts = 0;
        let errors = validate(&cfg);
        assert!(errors.iter().any(|e| e.contains("strong_backend")));
        assert!(errors.iter().any(|e| e.contains("max_fix_attempts")));
    }
}
