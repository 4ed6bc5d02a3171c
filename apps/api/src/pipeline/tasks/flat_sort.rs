//! Flat technology-list sort (soft).
//!
//! Same permutation contract as the grouped sort, but exhaustion never fails the
//! caller: a recoverable final answer is used if it is an exact permutation, and the
//! original list comes back untouched otherwise.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm_client::ModelBackend;
use crate::pipeline::agent::Agent;
use crate::pipeline::error::PipelineError;
use crate::pipeline::extractor;
use crate::pipeline::orchestrator::{self, CritiqueTask, IterationContext, RunOptions};
use crate::pipeline::progress::ProgressEmitter;
use crate::pipeline::prompt_builder;
use crate::pipeline::prompts::TECH_SORTER_SYSTEM;
use crate::pipeline::types::{ExhaustionPolicy, RunOutcome, ValidationResult};
use crate::pipeline::validators::FlatSnapshot;

pub const TECH_SORTER: Agent = Agent::new("tech_sorter", TECH_SORTER_SYSTEM);

const TASK_NAME: &str = "flat_sort";

/// Object keys a model sometimes wraps the array in.
const WRAPPER_KEYS: [&str; 3] = ["items", "technologies", "sorted"];

#[derive(Debug, Clone, Deserialize)]
pub struct FlatSortRequest {
    pub items: Vec<String>,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub max_iterations: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlatSortResponse {
    pub items: Vec<String>,
    pub warnings: Vec<String>,
}

impl From<RunOutcome<Vec<String>>> for FlatSortResponse {
    fn from(outcome: RunOutcome<Vec<String>>) -> Self {
        Self {
            items: outcome.output,
            warnings: outcome.warnings,
        }
    }
}

struct FlatSortTask {
    job_description: String,
    snapshot: FlatSnapshot,
}

#[async_trait]
impl CritiqueTask for FlatSortTask {
    type Output = Vec<String>;

    fn name(&self) -> &'static str {
        TASK_NAME
    }

    fn generator(&self) -> Agent {
        TECH_SORTER
    }

    fn policy(&self) -> ExhaustionPolicy {
        ExhaustionPolicy::Soft
    }

    fn build_prompt(&self, ctx: &IterationContext) -> String {
        prompt_builder::flat_sort_prompt(self.snapshot.items(), &self.job_description, ctx)
    }

    fn extract(&self, raw: &str) -> Option<Vec<String>> {
        extractor::extract(raw).and_then(string_list)
    }

    async fn validate(
        &self,
        output: &Vec<String>,
        _backend: &dyn ModelBackend,
        _progress: &ProgressEmitter,
        _ctx: &IterationContext,
    ) -> Result<ValidationResult, PipelineError> {
        Ok(self.snapshot.validate(output))
    }

    fn fallback(&self, raw: &str) -> Option<Vec<String>> {
        extractor::extract_lenient(raw)
            .and_then(string_list)
            .filter(|items| self.snapshot.validate(items).approved)
    }

    fn unchanged(&self) -> Option<Vec<String>> {
        Some(self.snapshot.items().to_vec())
    }
}

/// Accepts a bare array of strings, or an object holding one under a known key.
fn string_list(value: Value) -> Option<Vec<String>> {
    let array = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match WRAPPER_KEYS.iter().find_map(|k| map.remove(*k)) {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };
    array
        .into_iter()
        .map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

/// Sorts a flat list by relevance. Always returns the same items: reordered, or
/// in their original order if no valid ordering was produced.
pub async fn sort_flat_list(
    backend: &dyn ModelBackend,
    request: &FlatSortRequest,
    options: &RunOptions,
) -> Result<RunOutcome<Vec<String>>, PipelineError> {
    let snapshot = match FlatSnapshot::capture(&request.items) {
        Ok(snapshot) => snapshot,
        Err(e) => return orchestrator::reject(TASK_NAME, options, e),
    };

    if snapshot.items().len() <= 1 {
        let items = snapshot.items().to_vec();
        return Ok(orchestrator::short_circuit(TASK_NAME, options, items, "nothing to reorder"));
    }

    let task = FlatSortTask {
        job_description: request.job_description.clone(),
        snapshot,
    };
    orchestrator::run(&task, backend, options).await
}
