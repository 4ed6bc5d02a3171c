//! Professional summary generation (best-effort).
//!
//! The writer streams its draft; the validator checks length, plain-text form and
//! runs the fabrication scan against the candidate's declared facts. Whatever is left
//! unresolved after the last attempt comes back as warnings.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::llm_client::ModelBackend;
use crate::models::resume::ResumeFacts;
use crate::pipeline::agent::Agent;
use crate::pipeline::error::PipelineError;
use crate::pipeline::extractor;
use crate::pipeline::orchestrator::{self, CritiqueTask, IterationContext, RunOptions};
use crate::pipeline::progress::ProgressEmitter;
use crate::pipeline::prompt_builder;
use crate::pipeline::prompts::SUMMARY_WRITER_SYSTEM;
use crate::pipeline::types::{ExhaustionPolicy, RunOutcome, ValidationResult};
use crate::pipeline::validators::{detect_fabrications, AllowList};

pub const SUMMARY_WRITER: Agent = Agent::new("summary_writer", SUMMARY_WRITER_SYSTEM);

pub const MIN_SUMMARY_WORDS: usize = 25;
pub const DEFAULT_MAX_SUMMARY_WORDS: usize = 90;

const TASK_NAME: &str = "summary";

static MARKDOWN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:#{1,6}\s|[-*+]\s|\d+\.\s|>)|\*\*|__|`|\[[^\]]*\]\(").unwrap()
});

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRequest {
    pub facts: ResumeFacts,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub max_words: Option<usize>,
    #[serde(default)]
    pub max_iterations: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryResponse {
    pub text: String,
    pub warnings: Vec<String>,
}

impl From<RunOutcome<String>> for SummaryResponse {
    fn from(outcome: RunOutcome<String>) -> Self {
        Self {
            text: outcome.output,
            warnings: outcome.warnings,
        }
    }
}

struct SummaryTask {
    facts: ResumeFacts,
    job_description: String,
    max_words: usize,
    allow: AllowList,
}

#[async_trait]
impl CritiqueTask for SummaryTask {
    type Output = String;

    fn name(&self) -> &'static str {
        TASK_NAME
    }

    fn generator(&self) -> Agent {
        SUMMARY_WRITER
    }

    fn policy(&self) -> ExhaustionPolicy {
        ExhaustionPolicy::BestEffort
    }

    fn streams_drafts(&self) -> bool {
        true
    }

    fn build_prompt(&self, ctx: &IterationContext) -> String {
        prompt_builder::summary_prompt(
            &self.facts,
            &self.job_description,
            MIN_SUMMARY_WORDS,
            self.max_words,
            ctx,
        )
    }

    /// Never fails: an empty reply is judged by the validator like any other draft.
    fn extract(&self, raw: &str) -> Option<String> {
        let text = extractor::extract_text(raw).unwrap_or_default();
        Some(strip_wrapping_quotes(&text).to_string())
    }

    async fn validate(
        &self,
        output: &String,
        _backend: &dyn ModelBackend,
        _progress: &ProgressEmitter,
        _ctx: &IterationContext,
    ) -> Result<ValidationResult, PipelineError> {
        Ok(check_summary(output, self.max_words, &self.allow))
    }
}

/// Length, form and grounding checks for one summary draft.
pub fn check_summary(text: &str, max_words: usize, allow: &AllowList) -> ValidationResult {
    let mut violations = Vec::new();
    let words = text.split_whitespace().count();

    if words == 0 {
        violations.push("the summary is empty".to_string());
    } else if words < MIN_SUMMARY_WORDS {
        violations.push(format!(
            "the summary has {words} words; write at least {MIN_SUMMARY_WORDS}"
        ));
    } else if words > max_words {
        violations.push(format!(
            "the summary has {words} words; use at most {max_words}"
        ));
    }

    if MARKDOWN_RE.is_match(text) {
        violations.push(
            "the summary must be plain prose; remove markdown headings, bullets, emphasis and links"
                .to_string(),
        );
    }

    for mention in detect_fabrications(text, allow) {
        violations.push(format!(
            "mentions \"{mention}\", which is not among the candidate's declared facts; remove it"
        ));
    }

    ValidationResult::from_violations("The summary was rejected", violations)
}

fn strip_wrapping_quotes(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .map(str::trim)
        .unwrap_or(text)
}

/// Writes a summary from the candidate's facts, tailored to the job description.
///
/// Never fails on validation: unresolved problems come back in `warnings`.
pub async fn generate_summary(
    backend: &dyn ModelBackend,
    request: &SummaryRequest,
    options: &RunOptions,
) -> Result<RunOutcome<String>, PipelineError> {
    let max_words = request.max_words.unwrap_or(DEFAULT_MAX_SUMMARY_WORDS);
    if max_words < MIN_SUMMARY_WORDS {
        return orchestrator::reject(
            TASK_NAME,
            options,
            PipelineError::InvalidInput(format!(
                "max_words must be at least {MIN_SUMMARY_WORDS}, got {max_words}"
            )),
        );
    }
    if request.facts.is_empty() {
        return orchestrator::reject(
            TASK_NAME,
            options,
            PipelineError::InvalidInput("no candidate facts supplied".to_string()),
        );
    }

    let task = SummaryTask {
        allow: AllowList::new(request.facts.declared_terms()),
        facts: request.facts.clone(),
        job_description: request.job_description.clone(),
        max_words,
    };
    orchestrator::run(&task, backend, options).await
}
