//! Response confidence estimation.
//!
//! Scores generated text in the range `0.0..=1.0` via shallow, deterministic
//! heuristics. The score drives the routing decision:
//!
//! | Confidence                      | Outcome                          |
//! |---------------------------------|----------------------------------|
//! | `>= auto_proceed`               | Accept the primary response      |
//! | `retry_with_strong..auto_proceed` | Re-invoke on the strong backend |
//! | `< retry_with_strong`           | Reject (`success:false`)         |
//!
//! ## Rules (first match wins)
//!
//! 1. Shorter than 10 characters (including empty) → **0.3**
//! 2. Contains an uncertainty marker (`"I don't know"`, `"uncertain"`) → **0.6**
//! 3. Contains a failure marker (`"error"`, `"failed"`) → **0.5**
//! 4. Otherwise → **0.92**
//!
//! This is a cheap syntactic proxy for usability, not a semantic judge —
//! tuned so only clearly degenerate answers fall below `retry_with_strong`.

/// Minimum response length (in characters) before the degenerate-answer rule
/// stops firing.
const MIN_RESPONSE_LEN: usize = 10;

/// Substrings treated as explicit uncertainty markers.
const UNCERTAINTY_MARKERS: [&str; 2] = ["I don't know", "uncertain"];

/// Substrings treated as explicit failure markers.
const FAILURE_MARKERS: [&str; 2] = ["error", "failed"];

/// A response confidence estimator.
///
/// Stateless, pure, and cheap to construct. All analysis runs in O(n) over
/// the response length with no I/O.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceEstimator;

impl ConfidenceEstimator {
    /// Create a new estimator.
    pub fn new() -> Self {
        Self
    }

    /// Score a generated response for usability.
    ///
    /// Deterministic: the same text always produces the same score. The
    /// rules are ordered and the first match wins — a short response scores
    /// 0.3 even if it also contains a marker, and an uncertain response
    /// scores 0.6 even if it also mentions an error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use model_orchestra::routing::ConfidenceEstimator;
    /// let estimator = ConfidenceEstimator::new();
    /// assert!((estimator.score("A thorough and complete answer.") - 0.92).abs() < f64::EPSILON);
    /// assert!((estimator.score("short") - 0.3).abs() < f64::EPSILON);
    /// ```
    pub fn score(&self, response: &str) -> f64 {
        if response.chars().count() < MIN_RESPONSE_LEN {
            return 0.3;
        }
        if UNCERTAINTY_MARKERS.iter().any(|m| response.contains(m)) {
            return 0.6;
        }
        if FAILURE_MARKERS.iter().any(|m| response.contains(m)) {
            return 0.5;
        }
        0.92
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
