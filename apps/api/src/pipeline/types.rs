//! Per-run value types shared by the orchestrator, validators and tasks.
//!
//! Everything here is created fresh for a single pipeline invocation and dropped
//! when it returns. Nothing is shared between runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::agent::Agent;

/// Hard cap applied to per-request iteration overrides at the HTTP boundary.
pub const MAX_ITERATIONS_CEILING: u32 = 5;

/// Roles taking part in a run and the retry bound.
///
/// Total generation attempts never exceed `max_iterations + 1`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub roles: Vec<Agent>,
    pub max_iterations: u32,
}

impl PipelineConfig {
    pub fn new(roles: Vec<Agent>, max_iterations: u32) -> Self {
        Self { roles, max_iterations }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_iterations + 1
    }

    pub fn role_names(&self) -> Vec<&'static str> {
        self.roles.iter().map(|r| r.name).collect()
    }
}

/// Pass/fail verdict of a domain validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub approved: bool,
    pub critique: Option<String>,
    pub violations: Vec<String>,
}

impl ValidationResult {
    pub fn approve() -> Self {
        Self {
            approved: true,
            critique: None,
            violations: vec![],
        }
    }

    /// Builds a result from collected violations. An empty list approves.
    ///
    /// The critique enumerates every violation so the next attempt gets complete feedback.
    pub fn from_violations(heading: &str, violations: Vec<String>) -> Self {
        if violations.is_empty() {
            return Self::approve();
        }
        let mut critique = format!("{heading} ({} issue(s)):", violations.len());
        for (i, v) in violations.iter().enumerate() {
            critique.push_str(&format!("\n{}. {}", i + 1, v));
        }
        Self {
            approved: false,
            critique: Some(critique),
            violations,
        }
    }

    /// A rejection that carries free-text feedback rather than enumerated rules
    /// (reviewer agents).
    pub fn reject(critique: impl Into<String>) -> Self {
        let critique = critique.into();
        Self {
            approved: false,
            violations: vec![critique.clone()],
            critique: Some(critique),
        }
    }

    /// Critique text, falling back to the violation list.
    pub fn critique_text(&self) -> String {
        self.critique
            .clone()
            .unwrap_or_else(|| self.violations.join("; "))
    }
}

/// Outcome of one loop pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    Critique { message: String, violations: Vec<String> },
    /// Extraction failed; no validator call was made.
    Unparseable,
}

/// Record of one generation attempt. Appended to the run history, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationAttempt {
    pub iteration: u32,
    pub raw_text: String,
    pub parsed: Option<Value>,
    pub verdict: Verdict,
}

/// What happens once the retry loop runs out without approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Lenient re-parse of the last output, or a fatal `ValidationExhausted`.
    Strict,
    /// Lenient re-parse of the last output, or the untouched input.
    Soft,
    /// Last output plus its violations as warnings. Never fails.
    BestEffort,
}

/// How a successful run arrived at its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Approved,
    /// Exhausted, but the lenient re-parse of the final output satisfied the invariant.
    Fallback,
    /// Exhausted; the original input is returned unchanged.
    Unchanged,
    /// Exhausted; the last output is returned with warnings.
    BestEffort,
}

impl Resolution {
    pub fn describe(&self) -> &'static str {
        match self {
            Resolution::Approved => "output approved",
            Resolution::Fallback => "recovered output from final attempt",
            Resolution::Unchanged => "returned original input unchanged",
            Resolution::BestEffort => "returned best-effort output with warnings",
        }
    }
}

/// Successful result of a pipeline run.
#[derive(Debug, Clone)]
pub struct RunOutcome<T> {
    pub output: T,
    pub warnings: Vec<String>,
    /// Generation calls made (backend calls to the generator role).
    pub attempts: u32,
    pub resolution: Resolution,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_violations_empty_approves() {
        let result = ValidationResult::from_violations("Rejected", vec![]);
        assert!(result.approved);
        assert!(result.critique.is_none());
    }

    #[test]
    fn test_from_violations_enumerates_every_rule() {
        let result = ValidationResult::from_violations(
            "Rejected",
            vec!["first".to_string(), "second".to_string()],
        );
        assert!(!result.approved);
        let critique = result.critique.unwrap();
        assert!(critique.starts_with("Rejected (2 issue(s)):"));
        assert!(critique.contains("1. first"));
        assert!(critique.contains("2. second"));
    }

    #[test]
    fn test_config_keeps_iterations_above_request_ceiling() {
        let config = PipelineConfig::new(vec![], 8);
        assert_eq!(config.max_iterations, 8);
        assert_eq!(config.max_attempts(), 9);
    }

    #[test]
    fn test_verdict_serializes_with_kind_tag() {
        let json = serde_json::to_value(Verdict::Unparseable).unwrap();
        assert_eq!(json["kind"], "unparseable");
    }
}
