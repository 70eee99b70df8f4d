//! Routing configuration types.
//!
//! Provides the [`RoutingTable`] (task category → primary/fallback backend
//! pair) and [`ConfidenceThresholds`] that drive the routing decision. All
//! fields have sensible defaults and are (de)serialisable via serde for
//! TOML/JSON config files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The designated default task category.
///
/// Requests for categories absent from the routing table use this entry, so
/// every request has a primary/fallback pair even for unknown categories.
pub const DEFAULT_CATEGORY: &str = "critical_decisions";

// ── Default value functions ────────────────────────────────────────────

/// Default confidence at or above which a primary response is accepted as-is.
fn default_auto_proceed() -> f64 {
    0.85
}

/// Default confidence at or above which a marginal response is retried on the
/// strong backend instead of being rejected.
fn default_retry_with_strong() -> f64 {
    0.6
}

/// Default strong backend used for marginal-confidence escalation.
fn default_strong_backend() -> String {
    "claude-3-sonnet".to_string()
}

// ── Routing table ──────────────────────────────────────────────────────

/// One routing table entry: where a task category's requests go.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteEntry {
    /// Primary backend name — the cheapest backend adequate for the category.
    pub primary: String,
    /// Fallback backend name, substituted when the primary invocation fails.
    pub fallback: String,
    /// Human-readable cost-savings label for logs and dashboards
    /// (e.g. `"80%"`). Carried verbatim; never interpreted.
    #[serde(default)]
    pub cost_savings: Option<String>,
}

/// Static mapping of task category → backend pair.
///
/// Immutable after load. Invariants (checked by [`validate`] and at
/// [`Router`](super::Router) construction):
/// - the table contains the [`DEFAULT_CATEGORY`] entry
/// - every referenced backend name exists in the registry
pub type RoutingTable = HashMap<String, RouteEntry>;

/// Build the default routing table, mirroring the reference deployment:
/// cheap backends for bulk categories, the strong backend for critical
/// decisions, `gpt-3.5-turbo` as the universal fallback.
pub fn default_routing_table() -> RoutingTable {
    let mut table = RoutingTable::new();
    table.insert(
        "research".to_string(),
        RouteEntry {
            primary: "gemini-flash".to_string(),
            fallback: "gpt-3.5-turbo".to_string(),
            cost_savings: Some("85%".to_string()),
        },
    );
    table.insert(
        "code_generation".to_string(),
        RouteEntry {
            primary: "gemini-pro".to_string(),
            fallback: "gpt-3.5-turbo".to_string(),
            cost_savings: Some("75%".to_string()),
        },
    );
    table.insert(
        "testing".to_string(),
        RouteEntry {
            primary: "gemini-flash".to_string(),
            fallback: "gpt-3.5-turbo".to_string(),
            cost_savings: Some("85%".to_string()),
        },
    );
    table.insert(
        DEFAULT_CATEGORY.to_string(),
        RouteEntry {
            primary: "claude-3-sonnet".to_string(),
            fallback: "gpt-3.5-turbo".to_string(),
            cost_savings: None,
        },
    );
    table
}

// ── Confidence thresholds ──────────────────────────────────────────────

/// Confidence thresholds controlling the accept / escalate / reject decision.
///
/// Invariant: `0.0 <= retry_with_strong <= auto_proceed <= 1.0`.
///
/// The fixed fallback (0.9) and escalation (0.95) confidence constants in the
/// router must clear `auto_proceed` — downstream workflow completion checks
/// depend on it — so raising `auto_proceed` past 0.9 is rejected by
/// [`validate`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceThresholds {
    /// Confidence at or above which a scored response is accepted as-is.
    #[serde(default = "default_auto_proceed")]
    pub auto_proceed: f64,

    /// Confidence at or above which (but below `auto_proceed`) a response is
    /// retried on the strong backend. Below this the call is rejected.
    #[serde(default = "default_retry_with_strong")]
    pub retry_with_strong: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            auto_proceed: default_auto_proceed(),
            retry_with_strong: default_retry_with_strong(),
        }
    }
}

// ── RoutingConfig ──────────────────────────────────────────────────────

/// Configuration for the routing layer: the table, the thresholds, and the
/// designated strong backend for marginal-confidence escalation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingConfig {
    /// Task category → backend pair mapping.
    #[serde(default = "default_routing_table")]
    pub table: RoutingTable,

    /// Accept / escalate / reject thresholds.
    #[serde(default)]
    pub thresholds: ConfidenceThresholds,

    /// Backend re-invoked when primary confidence lands in the marginal zone.
    /// Distinct in role from a category's fallback, which covers invocation
    /// failure rather than low confidence.
    #[serde(default = "default_strong_backend")]
    pub strong_backend: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            table: default_routing_table(),
            thresholds: ConfidenceThresholds::default(),
            strong_backend: default_strong_backend(),
        }
    }
}

/// Validate a [`RoutingConfig`], returning a list of human-readable errors.
///
/// # Returns
///
/// An empty `Vec` on success, or one error string per violated constraint.
pub fn validate(config: &RoutingConfig) -> Vec<String> {
    let mut errors = Vec::new();

    let t = &config.thresholds;
    if t.auto_proceed < 0.0 || t.auto_proceed > 1.0 {
        errors.push(format!(
            "thresholds.auto_proceed must be in [0.0, 1.0], got {}",
            t.auto_proceed
        ));
    }
    if t.retry_with_strong < 0.0 || t.retry_with_strong > 1.0 {
        errors.push(format!(
            "thresholds.retry_with_strong must be in [0.0, 1.0], got {}",
            t.retry_with_strong
        ));
    }
    if t.retry_with_strong > t.auto_proceed {
        errors.push(format!(
            "thresholds.auto_proceed ({}) must be >= thresholds.retry_with_strong ({})",
            t.auto_proceed, t.retry_with_strong
        ));
    }
    // The fixed fallback confidence constant (0.9) must clear auto_proceed.
    if t.auto_proceed > 0.9 {
        errors.push(format!(
            "thresholds.auto_proceed must be <= 0.9 so fallback results auto-proceed, got {}",
            t.auto_proceed
        ));
    }

    if config.table.is_empty() {
        errors.push("routing table must not be empty".to_string());
    }
    if !config.table.contains_key(DEFAULT_CATEGORY) {
        errors.push(format!(
            "routing table must contain the default category `{DEFAULT_CATEGORY}`"
        ));
    }
    for (category, entry) in &config.table {
        if entry.primary.is_empty() {
            errors.push(format!("category `{category}` has an empty primary backend"));
        }
        if entry.fallback.is_empty() {
            errors.push(format!(
                "category `{category}` has an empty fallback backend"
            ));
        }
    }

    if config.strong_backend.is_empty() {
        errors.push("strong_backend must not be empty".to_string());
    }

    errors
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // -- defaults --------------------------------------------------------

    #[test]
    fn test_default_auto_proceed_returns_0_85() {
        assert!((default_auto_proceed() - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_retry_with_strong_returns_0_6() {
        assert!((default_retry_with_strong() - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_thresholds_satisfy_ordering_invariant() {
        let t = ConfidenceThresholds::default();
        assert!(0.0 <= t.retry_with_strong);
        assert!(t.retry_with_strong <= t.auto_proceed);
        assert!(t.auto_proceed <= 1.0);
    }

    #[test]
    fn test_default_routing_table_contains_default_category() {
        let table = default_routing_table();
        assert!(table.contains_key(DEFAULT_CATEGORY));
    }

    #[test]
    fn test_default_routing_config_passes_validation() {
        let errors = validate(&RoutingConfig::default());
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    // -- serde -----------------------------------------------------------

    #[test]
    fn test_routing_config_toml_roundtrip() {
        let cfg = RoutingConfig::default();
        let toml_str = toml::to_string_pretty(&cfg)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: serialize: {e}")));
        let parsed: RoutingConfig = toml::from_str(&toml_str)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: deserialize: {e}")));
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn test_routing_config_deserializes_with_defaults() {
        // Empty table → all defaults
        let cfg: RoutingConfig = toml::from_str("")
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: deserialize: {e}")));
        assert!((cfg.thresholds.auto_proceed - 0.85).abs() < f64::EPSILON);
        assert_eq!(cfg.strong_backend, "claude-3-sonnet");
        assert!(cfg.table.contains_key(DEFAULT_CATEGORY));
    }

    #[test]
    fn test_route_entry_cost_savings_defaults_to_none() {
        let entry: RouteEntry = toml::from_str(
            r#"
            primary = "gemini-flash"
            fallback = "gpt-3.5-turbo"
            "#,
        )
        .unwrap_or_else(|e| std::panic::panic_any(format!("test: deserialize: {e}")));
        assert!(entry.cost_savings.is_none());
    }

    // -- validation ------------------------------------------------------

    #[test]
    fn test_validate_auto_proceed_above_1_fails() {
        let mut cfg = RoutingConfig::default();
        cfg.thresholds.auto_proceed = 1.1;
        let errors = validate(&cfg);
        assert!(errors.iter().any(|e| e.contains("auto_proceed")));
    }

    #[test]
    fn test_validate_retry_negative_fails() {
        let mut cfg = RoutingConfig::default();
        cfg.thresholds.retry_with_strong = -0.2;
        let errors = validate(&cfg);
        assert!(errors.iter().any(|e| e.contains("retry_with_strong")));
    }

    #[test]
    fn test_validate_retry_above_auto_proceed_fails() {
        let mut cfg = RoutingConfig::default();
        cfg.thresholds.auto_proceed = 0.5;
        cfg.thresholds.retry_with_strong = 0.8;
        let errors = validate(&cfg);
        assert!(errors.iter().any(|e| e.contains(">=")));
    }

    #[test]
    fn test_validate_auto_proceed_above_fallback_constant_fails() {
        let mut cfg = RoutingConfig::default();
        cfg.thresholds.auto_proceed = 0.95;
        let errors = validate(&cfg);
        assert!(errors.iter().any(|e| e.contains("0.9")));
    }

    #[test]
    fn test_validate_missing_default_category_fails() {
        let mut cfg = RoutingConfig::default();
        cfg.table.remove(DEFAULT_CATEGORY);
        let errors = validate(&cfg);
        assert!(errors.iter().any(|e| e.contains(DEFAULT_CATEGORY)));
    }

    #[test]
    fn test_validate_empty_table_fails() {
        let cfg = RoutingConfig {
            table: RoutingTable::new(),
            ..RoutingConfig::default()
        };
        let errors = validate(&cfg);
        assert!(errors.iter().any(|e| e.contains("empty")));
    }

    #[test]
    fn test_validate_empty_backend_name_fails() {
        let mut cfg = RoutingConfig::default();
        cfg.table.insert(
            "summarisation".to_string(),
            RouteEntry {
                primary: String::new(),
                fallback: "gpt-3.5-turbo".to_string(),
                cost_savings: None,
            },
        );
        let errors = validate(&cfg);
        assert!(errors.iter().any(|e| e.contains("summarisation")));
    }

    #[test]
    fn test_validate_empty_strong_backend_fails() {
        let cfg = RoutingConfig {
            strong_backend: String::new(),
            ..RoutingConfig::default()
        };
        let errors = validate(&cfg);
        assert!(errors.iter().any(|e| e.contains("strong_backend")));
    }

    #[test]
    fn test_validate_collects_multiple_errors() {
        let cfg = RoutingConfig {
            table: RoutingTable::new(),
            thresholds: ConfidenceThresholds {
                auto_proceed: -1.0,
                retry_with_strong: 2.0,
            },
            strong_backend: String::new(),
        };
        let errors = validate(&cfg);
        assert!(
            errors.len() >= 4,
            "expected >=4 errors, got {}: {errors:?}",
            errors.len()
        );
    }

    #[test]
    fn test_validate_equal_thresholds_passes() {
        let cfg = RoutingConfig {
            thresholds: ConfidenceThresholds {
                auto_proceed: 0.6,
                retry_with_strong: 0.6,
            },
            ..RoutingConfig::default()
        };
        let errors = validate(&cfg);
        assert!(errors.is_empty(), "equal thresholds should pass: {errors:?}");
    }
}
