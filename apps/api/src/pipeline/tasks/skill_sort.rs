//! Skill-group sort (strict).
//!
//! Reorders groups and the skills within each group by relevance to a job description.
//! The result must be an exact permutation at both levels; if no attempt manages that,
//! the run fails with the full attempt history.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm_client::ModelBackend;
use crate::models::resume::SkillGroup;
use crate::pipeline::agent::Agent;
use crate::pipeline::error::PipelineError;
use crate::pipeline::extractor;
use crate::pipeline::orchestrator::{self, CritiqueTask, IterationContext, RunOptions};
use crate::pipeline::progress::ProgressEmitter;
use crate::pipeline::prompt_builder;
use crate::pipeline::prompts::SKILL_SORTER_SYSTEM;
use crate::pipeline::types::{ExhaustionPolicy, RunOutcome, ValidationResult};
use crate::pipeline::validators::GroupedSnapshot;

pub const SKILL_SORTER: Agent = Agent::new("skill_sorter", SKILL_SORTER_SYSTEM);

const TASK_NAME: &str = "skill_sort";

#[derive(Debug, Clone, Deserialize)]
pub struct SkillSortRequest {
    pub groups: Vec<SkillGroup>,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub max_iterations: Option<u32>,
}

/// Model output and endpoint response: group order plus per-group skill order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillOrdering {
    pub group_order: Vec<String>,
    pub skill_order: BTreeMap<String, Vec<String>>,
}

impl SkillOrdering {
    /// The input order, unchanged.
    pub fn identity(snapshot: &GroupedSnapshot) -> Self {
        let skill_order = snapshot
            .group_names()
            .iter()
            .map(|g| (g.clone(), snapshot.skills_of(g).unwrap_or_default().to_vec()))
            .collect();
        Self {
            group_order: snapshot.group_names().to_vec(),
            skill_order,
        }
    }
}

struct SkillSortTask {
    groups: Vec<SkillGroup>,
    job_description: String,
    snapshot: GroupedSnapshot,
}

#[async_trait]
impl CritiqueTask for SkillSortTask {
    type Output = SkillOrdering;

    fn name(&self) -> &'static str {
        TASK_NAME
    }

    fn generator(&self) -> Agent {
        SKILL_SORTER
    }

    fn policy(&self) -> ExhaustionPolicy {
        ExhaustionPolicy::Strict
    }

    fn build_prompt(&self, ctx: &IterationContext) -> String {
        prompt_builder::skill_sort_prompt(&self.groups, &self.job_description, ctx)
    }

    fn extract(&self, raw: &str) -> Option<SkillOrdering> {
        extractor::extract_as(raw)
    }

    async fn validate(
        &self,
        output: &SkillOrdering,
        _backend: &dyn ModelBackend,
        _progress: &ProgressEmitter,
        _ctx: &IterationContext,
    ) -> Result<ValidationResult, PipelineError> {
        Ok(self.snapshot.validate(&output.group_order, &output.skill_order))
    }

    fn fallback(&self, raw: &str) -> Option<SkillOrdering> {
        extractor::extract_lenient_as::<SkillOrdering>(raw)
            .filter(|o| self.snapshot.validate(&o.group_order, &o.skill_order).approved)
    }
}

/// Sorts skill groups, and the skills inside each group, by relevance.
///
/// Fails with `InvalidInput` on duplicate group names or duplicate skills within a
/// group, and with `ValidationExhausted` if no attempt yields an exact permutation.
pub async fn sort_skill_groups(
    backend: &dyn ModelBackend,
    request: &SkillSortRequest,
    options: &RunOptions,
) -> Result<RunOutcome<SkillOrdering>, PipelineError> {
    let snapshot = match GroupedSnapshot::capture(&request.groups) {
        Ok(snapshot) => snapshot,
        Err(e) => return orchestrator::reject(TASK_NAME, options, e),
    };

    if snapshot.is_empty() {
        let identity = SkillOrdering::identity(&snapshot);
        return Ok(orchestrator::short_circuit(TASK_NAME, options, identity, "no skill groups to sort"));
    }

    let task = SkillSortTask {
        groups: request.groups.clone(),
        job_description: request.job_description.clone(),
        snapshot,
    };
    orchestrator::run(&task, backend, options).await
}
