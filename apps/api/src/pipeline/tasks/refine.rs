//! Job description refinement (best-effort, two roles).
//!
//! The refiner rewrites a raw posting into the fixed section grammar. Each draft is
//! checked deterministically first; only a grammatically valid draft goes to the
//! reviewer, whose feedback drives the next revision.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm_client::ModelBackend;
use crate::pipeline::agent::Agent;
use crate::pipeline::error::PipelineError;
use crate::pipeline::extractor;
use crate::pipeline::orchestrator::{self, CritiqueTask, IterationContext, RunOptions};
use crate::pipeline::progress::{ProgressEmitter, STAGE_REVIEWING};
use crate::pipeline::prompt_builder;
use crate::pipeline::prompts::{REFINER_SYSTEM, REVIEWER_SYSTEM};
use crate::pipeline::types::{ExhaustionPolicy, RunOutcome, ValidationResult};
use crate::pipeline::validators::validate_sections;

pub const REFINER: Agent = Agent::new("refiner", REFINER_SYSTEM);
pub const REVIEWER: Agent = Agent::new("reviewer", REVIEWER_SYSTEM);

const TASK_NAME: &str = "refine";

#[derive(Debug, Clone, Deserialize)]
pub struct RefineRequest {
    pub raw_text: String,
    #[serde(default)]
    pub max_iterations: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefineResponse {
    pub text: String,
    pub warnings: Vec<String>,
}

impl From<RunOutcome<String>> for RefineResponse {
    fn from(outcome: RunOutcome<String>) -> Self {
        Self {
            text: outcome.output,
            warnings: outcome.warnings,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReviewVerdict {
    approved: bool,
    #[serde(default)]
    feedback: String,
}

struct RefineTask {
    raw_text: String,
}

#[async_trait]
impl CritiqueTask for RefineTask {
    type Output = String;

    fn name(&self) -> &'static str {
        TASK_NAME
    }

    fn generator(&self) -> Agent {
        REFINER
    }

    fn roles(&self) -> Vec<Agent> {
        vec![REFINER, REVIEWER]
    }

    fn policy(&self) -> ExhaustionPolicy {
        ExhaustionPolicy::BestEffort
    }

    fn build_prompt(&self, ctx: &IterationContext) -> String {
        prompt_builder::refine_prompt(&self.raw_text, ctx)
    }

    fn extract(&self, raw: &str) -> Option<String> {
        extractor::extract_text(raw)
    }

    async fn validate(
        &self,
        output: &String,
        backend: &dyn ModelBackend,
        progress: &ProgressEmitter,
        ctx: &IterationContext,
    ) -> Result<ValidationResult, PipelineError> {
        let grammar = validate_sections(output);
        if !grammar.approved {
            debug!(violations = grammar.violations.len(), "draft failed format check");
            return Ok(grammar);
        }

        progress.emit(STAGE_REVIEWING, "format ok; reviewing content", Some(ctx.iteration));
        let reply = REVIEWER
            .invoke(backend, &prompt_builder::review_prompt(&self.raw_text, output))
            .await
            .map_err(|source| PipelineError::Backend {
                role: REVIEWER.name,
                source,
            })?;

        Ok(parse_review(&reply))
    }

    /// The raw posting, if not even one draft could be extracted.
    fn unchanged(&self) -> Option<String> {
        Some(self.raw_text.trim().to_string())
    }
}

/// Reads the reviewer's verdict: `{"approved": .., "feedback": ..}`, or plain text
/// that starts with `APPROVED`. Anything else is treated as feedback.
fn parse_review(reply: &str) -> ValidationResult {
    if let Some(verdict) = extractor::extract_as::<ReviewVerdict>(reply) {
        if verdict.approved {
            return ValidationResult::approve();
        }
        let feedback = verdict.feedback.trim();
        return if feedback.is_empty() {
            ValidationResult::reject("The reviewer rejected the draft without feedback; re-check it against the source posting.")
        } else {
            ValidationResult::reject(format!("Reviewer feedback: {feedback}"))
        };
    }

    let text = extractor::strip_code_fence(reply);
    let approved = text
        .get(..8)
        .is_some_and(|head| head.eq_ignore_ascii_case("approved"));
    if approved {
        ValidationResult::approve()
    } else {
        ValidationResult::reject(format!("Reviewer feedback: {text}"))
    }
}

/// Rewrites a raw job posting into the fixed section format.
///
/// Never fails on validation: if no draft is approved, the last one comes back with
/// its unresolved problems as warnings.
pub async fn refine_text(
    backend: &dyn ModelBackend,
    request: &RefineRequest,
    options: &RunOptions,
) -> Result<RunOutcome<String>, PipelineError> {
    if request.raw_text.trim().is_empty() {
        return orchestrator::reject(
            TASK_NAME,
            options,
            PipelineError::InvalidInput("raw_text is empty".to_string()),
        );
    }

    let task = RefineTask {
        raw_text: request.raw_text.clone(),
    };
    orchestrator::run(&task, backend, options).await
}
