use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::llm_client::ModelBackend;
use crate::pipeline::orchestrator::RunOptions;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The model backend. `LlmClient` in production, scripted in tests.
    pub llm: Arc<dyn ModelBackend>,
    pub config: Config,
    /// Cancelled on shutdown; every run holds a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(llm: Arc<dyn ModelBackend>, config: Config) -> Self {
        Self {
            llm,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Run options for one request: configured retry bound (or the request's
    /// override), no progress sink, cancelled on shutdown.
    pub fn run_options(&self, max_iterations: Option<u32>) -> RunOptions {
        RunOptions::new(self.config.iterations_for(max_iterations))
            .with_cancellation(self.shutdown.child_token())
    }
}
