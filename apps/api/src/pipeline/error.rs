use thiserror::Error;

use crate::llm_client::LlmError;
use crate::pipeline::types::GenerationAttempt;

/// Errors surfaced by a pipeline run.
///
/// Parse failures never appear here: they are recovered inside the loop as an
/// implicit critique. Soft degradations are successful results with warnings.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Strict tasks only. Carries every attempt so the failure can be reproduced.
    #[error("{task}: no valid output after {} attempts", .attempts.len())]
    ValidationExhausted {
        task: &'static str,
        attempts: Vec<GenerationAttempt>,
    },

    /// Not retried here; transport retry belongs to the backend adapter.
    #[error("{role} call failed: {source}")]
    Backend {
        role: &'static str,
        #[source]
        source: LlmError,
    },

    #[error("{task} cancelled before iteration {iteration}")]
    Cancelled { task: &'static str, iteration: u32 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PipelineError {
    /// Progress stage for the terminal event of a run that ended with this error.
    pub fn terminal_stage(&self) -> &'static str {
        match self {
            PipelineError::Cancelled { .. } => crate::pipeline::progress::STAGE_CANCELLED,
            _ => crate::pipeline::progress::STAGE_FAILED,
        }
    }
}
