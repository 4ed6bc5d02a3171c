// Critique-revise pipelines: generate → validate → critique → regenerate, bounded.
// All model calls go through the ModelBackend trait, never through LlmClient directly.

pub mod agent;
pub mod error;
pub mod extractor;
pub mod handlers;
pub mod orchestrator;
pub mod progress;
pub mod prompt_builder;
pub mod prompts;
pub mod tasks;
pub mod types;
pub mod validators;
