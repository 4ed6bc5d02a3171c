//! Prompt Builder — pure functions from task input + iteration context to prompt text.
//!
//! On a retry the previous attempt's critique is appended to the generator prompt.

use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, PERMUTATION_INSTRUCTION};
use crate::models::resume::{ResumeFacts, SkillGroup};
use crate::pipeline::orchestrator::IterationContext;
use crate::pipeline::prompts::{
    REFINE_PROMPT_TEMPLATE, REVIEW_PROMPT_TEMPLATE, REVISION_TEMPLATE, SKILL_SORT_PROMPT_TEMPLATE,
    SUMMARY_PROMPT_TEMPLATE, TECH_SORT_PROMPT_TEMPLATE,
};
use crate::pipeline::validators::section_grammar::{
    MAX_LIST_BULLETS, MAX_TECH_CHARS, MAX_TECH_WORDS, SECTIONS,
};

const NO_JOB_DESCRIPTION: &str = "(none provided; order by general industry relevance)";

pub fn summary_prompt(
    facts: &ResumeFacts,
    job_description: &str,
    min_words: usize,
    max_words: usize,
    ctx: &IterationContext,
) -> String {
    let facts_json = serde_json::to_string_pretty(facts).unwrap_or_default();
    let allowed = facts.declared_terms().join(", ");

    let prompt = fill(
        SUMMARY_PROMPT_TEMPLATE,
        &[
            ("grounding_instruction", GROUNDING_INSTRUCTION),
            ("min_words", &min_words.to_string()),
            ("max_words", &max_words.to_string()),
            ("allowed_terms", &allowed),
            ("facts_json", &facts_json),
            ("job_description", job_description_or_default(job_description)),
        ],
    );
    with_critique(prompt, ctx)
}

pub fn skill_sort_prompt(groups: &[SkillGroup], job_description: &str, ctx: &IterationContext) -> String {
    let groups_json = serde_json::to_string_pretty(groups).unwrap_or_default();

    let prompt = fill(
        SKILL_SORT_PROMPT_TEMPLATE,
        &[
            ("permutation_instruction", PERMUTATION_INSTRUCTION),
            ("groups_json", &groups_json),
            ("job_description", job_description_or_default(job_description)),
        ],
    );
    with_critique(prompt, ctx)
}

pub fn flat_sort_prompt(items: &[String], job_description: &str, ctx: &IterationContext) -> String {
    let items_json = serde_json::to_string(items).unwrap_or_default();

    let prompt = fill(
        TECH_SORT_PROMPT_TEMPLATE,
        &[
            ("permutation_instruction", PERMUTATION_INSTRUCTION),
            ("count", &items.len().to_string()),
            ("items_json", &items_json),
            ("job_description", job_description_or_default(job_description)),
        ],
    );
    with_critique(prompt, ctx)
}

pub fn refine_prompt(raw_text: &str, ctx: &IterationContext) -> String {
    let sections = SECTIONS
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {s}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = fill(
        REFINE_PROMPT_TEMPLATE,
        &[
            ("sections", &sections),
            ("max_bullets", &MAX_LIST_BULLETS.to_string()),
            ("tech_words", &MAX_TECH_WORDS.to_string()),
            ("tech_chars", &MAX_TECH_CHARS.to_string()),
            ("raw_text", raw_text.trim()),
        ],
    );
    with_critique(prompt, ctx)
}

/// Reviewer prompt. Never carries a critique: the reviewer judges each draft fresh.
pub fn review_prompt(raw_text: &str, draft: &str) -> String {
    fill(REVIEW_PROMPT_TEMPLATE, &[("raw_text", raw_text.trim()), ("draft", draft)])
}

/// Appends the previous attempt's critique on a retry; returns `prompt` unchanged otherwise.
pub fn with_critique(prompt: String, ctx: &IterationContext) -> String {
    match ctx.last_critique() {
        Some(critique) if ctx.iteration > 0 => {
            let revision = fill(
                REVISION_TEMPLATE,
                &[("attempt", &ctx.iteration.to_string()), ("critique", critique)],
            );
            prompt + &revision
        }
        _ => prompt,
    }
}

/// Substitutes `{key}` placeholders in one pass over the template.
///
/// Substituted values are never rescanned, so user text containing `{draft}` or similar
/// stays literal. Braces that do not name a known key are copied through.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let hit = values.iter().find(|(key, _)| {
            tail.strip_prefix(key).is_some_and(|after| after.starts_with('}'))
        });
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn job_description_or_default(job_description: &str) -> &str {
    let trimmed = job_description.trim();
    if trimmed.is_empty() {
        NO_JOB_DESCRIPTION
    } else {
        trimmed
    }
}
