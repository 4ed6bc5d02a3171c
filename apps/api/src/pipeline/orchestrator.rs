//! Critique-Revise Orchestrator — the bounded generate → validate → critique loop.
//!
//! Flow per run:
//!   INIT → GENERATE → VALIDATE → APPROVED
//!                        ↓
//!                     CRITIQUE → GENERATE (while iteration < max_iterations)
//!                        ↓
//!                     EXHAUSTED → policy (fallback / unchanged / best-effort / error)
//!
//! A run is strictly sequential: one backend call in flight at a time. All state lives
//! in locals of `run` plus an immutable `IterationContext` rebuilt on every pass, so
//! concurrent runs share nothing. Cancellation is checked at stage boundaries only.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::llm_client::ModelBackend;
use crate::pipeline::agent::Agent;
use crate::pipeline::error::PipelineError;
use crate::pipeline::progress::{
    NoopSink, ProgressEmitter, ProgressSink, STAGE_COMPLETE, STAGE_DRAFT, STAGE_EXHAUSTED,
    STAGE_GENERATING, STAGE_REVISING, STAGE_STARTED, STAGE_VALIDATING,
};
use crate::pipeline::types::{
    ExhaustionPolicy, GenerationAttempt, PipelineConfig, Resolution, RunOutcome,
    ValidationResult, Verdict,
};

/// Retry bound used when the caller does not pick one.
pub const DEFAULT_MAX_ITERATIONS: u32 = 2;

const PARSE_FAILURE_CRITIQUE: &str = "Your previous response could not be parsed. \
    Respond in exactly the format requested, with nothing before or after it.";

// ────────────────────────────────────────────────────────────────────────────
// Per-run values
// ────────────────────────────────────────────────────────────────────────────

/// Where the loop is. Never mutated: `next` builds the context for the following pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationContext {
    pub iteration: u32,
    pub max_iterations: u32,
    /// Critiques of every previous attempt, oldest first.
    pub critiques: Vec<String>,
}

impl IterationContext {
    pub fn first(max_iterations: u32) -> Self {
        Self {
            iteration: 0,
            max_iterations,
            critiques: Vec::new(),
        }
    }

    pub fn next(&self, critique: String) -> Self {
        let mut critiques = self.critiques.clone();
        critiques.push(critique);
        Self {
            iteration: self.iteration + 1,
            max_iterations: self.max_iterations,
            critiques,
        }
    }

    /// Critique of the immediately preceding attempt, if this is a retry.
    pub fn last_critique(&self) -> Option<&str> {
        self.critiques.last().map(String::as_str)
    }

    pub fn is_final(&self) -> bool {
        self.iteration >= self.max_iterations
    }
}

/// Caller-side controls for one run.
#[derive(Clone)]
pub struct RunOptions {
    pub max_iterations: u32,
    pub progress: Arc<dyn ProgressSink>,
    pub cancel: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            progress: Arc::new(NoopSink),
            cancel: CancellationToken::new(),
        }
    }
}

impl RunOptions {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            max_iterations,
            ..Self::default()
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Task seam
// ────────────────────────────────────────────────────────────────────────────

/// One kind of critique-revise job: how to prompt, parse, judge and recover.
#[async_trait]
pub trait CritiqueTask: Send + Sync {
    type Output: Clone + Serialize + Send + Sync;

    fn name(&self) -> &'static str;

    /// The role whose output is being revised.
    fn generator(&self) -> Agent;

    /// Every role taking part in the run. The generator comes first.
    fn roles(&self) -> Vec<Agent> {
        vec![self.generator()]
    }

    fn policy(&self) -> ExhaustionPolicy;

    /// Stream generation and forward each delta as a `draft` progress event.
    fn streams_drafts(&self) -> bool {
        false
    }

    fn build_prompt(&self, ctx: &IterationContext) -> String;

    /// Strict parse of one raw reply. `None` becomes an implicit critique.
    fn extract(&self, raw: &str) -> Option<Self::Output>;

    /// Judges a parsed output. May call further roles through `backend`.
    async fn validate(
        &self,
        output: &Self::Output,
        backend: &dyn ModelBackend,
        progress: &ProgressEmitter,
        ctx: &IterationContext,
    ) -> Result<ValidationResult, PipelineError>;

    /// Last-chance lenient parse of the final reply. Must only return output that
    /// satisfies the task's invariant.
    fn fallback(&self, _raw: &str) -> Option<Self::Output> {
        None
    }

    /// The input returned as-is when nothing better is available.
    fn unchanged(&self) -> Option<Self::Output> {
        None
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Run
// ────────────────────────────────────────────────────────────────────────────

/// Drives `task` to an outcome. The terminal progress event is emitted on every path.
pub async fn run<T: CritiqueTask>(
    task: &T,
    backend: &dyn ModelBackend,
    options: &RunOptions,
) -> Result<RunOutcome<T::Output>, PipelineError> {
    let run_id = Uuid::new_v4();
    let span = info_span!("pipeline", task = task.name(), %run_id);
    let emitter = ProgressEmitter::new(options.progress.clone());

    async {
        let result = drive(task, backend, options, &emitter).await;
        match &result {
            Ok(outcome) => {
                info!(
                    attempts = outcome.attempts,
                    warnings = outcome.warnings.len(),
                    resolution = ?outcome.resolution,
                    "pipeline finished"
                );
                emitter.finish(STAGE_COMPLETE, outcome.resolution.describe());
            }
            Err(e) => {
                warn!(error = %e, "pipeline failed");
                emitter.finish(e.terminal_stage(), e.to_string());
            }
        }
        result
    }
    .instrument(span)
    .await
}

async fn drive<T: CritiqueTask>(
    task: &T,
    backend: &dyn ModelBackend,
    options: &RunOptions,
    emitter: &ProgressEmitter,
) -> Result<RunOutcome<T::Output>, PipelineError> {
    let config = PipelineConfig::new(task.roles(), options.max_iterations);
    let mut ctx = IterationContext::first(config.max_iterations);
    let mut history: Vec<GenerationAttempt> = Vec::new();
    let mut last_output: Option<(T::Output, Vec<String>)> = None;
    let mut last_raw: String;

    info!(
        roles = ?config.role_names(),
        max_iterations = config.max_iterations,
        "pipeline started"
    );
    emitter.emit(
        STAGE_STARTED,
        format!("{}: up to {} attempt(s)", task.name(), config.max_attempts()),
        None,
    );

    loop {
        ensure_live(task, options, ctx.iteration)?;

        let stage = if ctx.iteration == 0 {
            STAGE_GENERATING
        } else {
            STAGE_REVISING
        };
        emitter.emit(
            stage,
            format!("attempt {} of {}", ctx.iteration + 1, config.max_attempts()),
            Some(ctx.iteration),
        );

        let raw = generate(task, backend, emitter, &ctx).await?;
        ensure_live(task, options, ctx.iteration)?;

        let critique = match task.extract(&raw) {
            None => {
                warn!(iteration = ctx.iteration, raw_chars = raw.len(), "unparseable output");
                history.push(GenerationAttempt {
                    iteration: ctx.iteration,
                    raw_text: raw.clone(),
                    parsed: None,
                    verdict: Verdict::Unparseable,
                });
                PARSE_FAILURE_CRITIQUE.to_string()
            }
            Some(output) => {
                emitter.emit(STAGE_VALIDATING, "checking output", Some(ctx.iteration));
                let result = task.validate(&output, backend, emitter, &ctx).await?;
                let parsed = serde_json::to_value(&output).ok();

                if result.approved {
                    history.push(GenerationAttempt {
                        iteration: ctx.iteration,
                        raw_text: raw,
                        parsed,
                        verdict: Verdict::Approved,
                    });
                    return Ok(RunOutcome {
                        output,
                        warnings: Vec::new(),
                        attempts: history.len() as u32,
                        resolution: Resolution::Approved,
                    });
                }

                let message = result.critique_text();
                info!(
                    iteration = ctx.iteration,
                    violations = result.violations.len(),
                    "output rejected"
                );
                history.push(GenerationAttempt {
                    iteration: ctx.iteration,
                    raw_text: raw.clone(),
                    parsed,
                    verdict: Verdict::Critique {
                        message: message.clone(),
                        violations: result.violations.clone(),
                    },
                });
                last_output = Some((output, result.violations));
                message
            }
        };

        last_raw = raw;
        if ctx.is_final() {
            break;
        }
        ctx = ctx.next(critique);
    }

    emitter.emit(
        STAGE_EXHAUSTED,
        format!("no approved output after {} attempt(s)", history.len()),
        Some(ctx.iteration),
    );
    exhaust(task, history, last_output, &last_raw)
}

/// Applies the task's exhaustion policy.
fn exhaust<T: CritiqueTask>(
    task: &T,
    history: Vec<GenerationAttempt>,
    last_output: Option<(T::Output, Vec<String>)>,
    last_raw: &str,
) -> Result<RunOutcome<T::Output>, PipelineError> {
    let attempts = history.len() as u32;
    let policy = task.policy();
    warn!(?policy, attempts, "retry budget exhausted");

    let outcome = |output, warnings, resolution| RunOutcome {
        output,
        warnings,
        attempts,
        resolution,
    };

    match policy {
        ExhaustionPolicy::Strict => match task.fallback(last_raw) {
            Some(output) => Ok(outcome(output, Vec::new(), Resolution::Fallback)),
            None => Err(PipelineError::ValidationExhausted {
                task: task.name(),
                attempts: history,
            }),
        },
        ExhaustionPolicy::Soft => {
            if let Some(output) = task.fallback(last_raw) {
                return Ok(outcome(output, Vec::new(), Resolution::Fallback));
            }
            match task.unchanged() {
                Some(original) => Ok(outcome(
                    original,
                    vec![format!(
                        "could not produce a valid ordering after {attempts} attempt(s); original order kept"
                    )],
                    Resolution::Unchanged,
                )),
                None => Err(PipelineError::ValidationExhausted {
                    task: task.name(),
                    attempts: history,
                }),
            }
        }
        ExhaustionPolicy::BestEffort => match (last_output, task.unchanged()) {
            (Some((output, violations)), _) => Ok(outcome(output, violations, Resolution::BestEffort)),
            (None, Some(original)) => Ok(outcome(
                original,
                vec![format!("no usable output after {attempts} attempt(s); input returned unchanged")],
                Resolution::Unchanged,
            )),
            (None, None) => Err(PipelineError::ValidationExhausted {
                task: task.name(),
                attempts: history,
            }),
        },
    }
}

async fn generate<T: CritiqueTask>(
    task: &T,
    backend: &dyn ModelBackend,
    emitter: &ProgressEmitter,
    ctx: &IterationContext,
) -> Result<String, PipelineError> {
    let agent = task.generator();
    let prompt = task.build_prompt(ctx);

    let result = if task.streams_drafts() {
        let iteration = ctx.iteration;
        agent
            .invoke_streaming(backend, &prompt, |delta| {
                emitter.emit(STAGE_DRAFT, delta, Some(iteration))
            })
            .await
    } else {
        agent.invoke(backend, &prompt).await
    };

    result.map_err(|source| PipelineError::Backend {
        role: agent.name,
        source,
    })
}

fn ensure_live<T: CritiqueTask>(
    task: &T,
    options: &RunOptions,
    iteration: u32,
) -> Result<(), PipelineError> {
    if options.cancel.is_cancelled() {
        info!(iteration, "run cancelled");
        return Err(PipelineError::Cancelled {
            task: task.name(),
            iteration,
        });
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Runs that end before the loop
// ────────────────────────────────────────────────────────────────────────────

/// Completes a run that needs no model call (nothing to reorder).
pub fn short_circuit<T>(task: &'static str, options: &RunOptions, output: T, reason: &str) -> RunOutcome<T> {
    info!(task, reason, "pipeline short-circuited");
    ProgressEmitter::new(options.progress.clone()).finish(STAGE_COMPLETE, reason);
    RunOutcome {
        output,
        warnings: Vec::new(),
        attempts: 0,
        resolution: Resolution::Unchanged,
    }
}

/// Fails a run whose input was rejected before any model call.
pub fn reject<T>(task: &'static str, options: &RunOptions, error: PipelineError) -> Result<T, PipelineError> {
    warn!(task, error = %error, "pipeline input rejected");
    ProgressEmitter::new(options.progress.clone()).finish(error.terminal_stage(), error.to_string());
    Err(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extractor;
    use crate::pipeline::progress::{STAGE_CANCELLED, STAGE_FAILED};
    use crate::test_support::{RecordingSink, ScriptedBackend};

    const WRITER: Agent = Agent::new("writer", "You write numbers.");

    /// Accepts a JSON number equal to `target`.
    struct NumberTask {
        target: i64,
        policy: ExhaustionPolicy,
    }

    #[async_trait]
    impl CritiqueTask for NumberTask {
        type Output = i64;

        fn name(&self) -> &'static str {
            "number"
        }

        fn generator(&self) -> Agent {
            WRITER
        }

        fn policy(&self) -> ExhaustionPolicy {
            self.policy
        }

        fn build_prompt(&self, ctx: &IterationContext) -> String {
            match ctx.last_critique() {
                Some(c) => format!("pick a number\n{c}"),
                None => "pick a number".to_string(),
            }
        }

        fn extract(&self, raw: &str) -> Option<i64> {
            extractor::extract_as(raw)
        }

        async fn validate(
            &self,
            output: &i64,
            _backend: &dyn ModelBackend,
            _progress: &ProgressEmitter,
            _ctx: &IterationContext,
        ) -> Result<ValidationResult, PipelineError> {
            if *output == self.target {
                Ok(ValidationResult::approve())
            } else {
                Ok(ValidationResult::from_violations(
                    "Wrong number",
                    vec![format!("{output} is not {}", self.target)],
                ))
            }
        }

        fn fallback(&self, raw: &str) -> Option<i64> {
            extractor::extract_lenient_as::<Vec<i64>>(raw)
                .and_then(|v| v.first().copied())
                .filter(|n| *n == self.target)
        }

        fn unchanged(&self) -> Option<i64> {
            Some(0)
        }
    }

    fn task(policy: ExhaustionPolicy) -> NumberTask {
        NumberTask { target: 7, policy }
    }

    fn options(max_iterations: u32, sink: &Arc<RecordingSink>) -> RunOptions {
        RunOptions::new(max_iterations).with_progress(sink.clone())
    }

    #[tokio::test]
    async fn test_always_rejected_makes_exactly_max_plus_one_calls() {
        for max in 0..=3 {
            let backend = ScriptedBackend::new().reply(&WRITER, &["1"]);
            let sink = Arc::new(RecordingSink::default());
            let outcome = run(&task(ExhaustionPolicy::BestEffort), &backend, &options(max, &sink))
                .await
                .unwrap();
            assert_eq!(backend.calls_for(&WRITER), max as usize + 1);
            assert_eq!(outcome.attempts, max + 1);
            assert_eq!(outcome.resolution, Resolution::BestEffort);
            assert_eq!(outcome.warnings, vec!["1 is not 7".to_string()]);
            assert_eq!(sink.done_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_early_approval_stops_and_done_is_last() {
        let backend = ScriptedBackend::new().reply(&WRITER, &["3", "5", "7", "7"]);
        let sink = Arc::new(RecordingSink::default());
        let outcome = run(&task(ExhaustionPolicy::Strict), &backend, &options(4, &sink))
            .await
            .unwrap();

        assert_eq!(outcome.output, 7);
        assert_eq!(outcome.resolution, Resolution::Approved);
        assert_eq!(backend.calls_for(&WRITER), 3);

        let events = sink.events();
        assert_eq!(sink.done_count(), 1);
        assert!(events.last().unwrap().done);
        assert_eq!(events.last().unwrap().stage, STAGE_COMPLETE);
        assert_eq!(
            sink.stages().iter().filter(|s| *s == STAGE_REVISING).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_retry_prompt_carries_previous_critique() {
        let backend = ScriptedBackend::new().reply(&WRITER, &["3", "7"]);
        run(&task(ExhaustionPolicy::Strict), &backend, &RunOptions::new(2))
            .await
            .unwrap();
        let prompts = backend.prompts_for(&WRITER);
        assert_eq!(prompts[0], "pick a number");
        assert!(prompts[1].contains("3 is not 7"));
    }

    #[tokio::test]
    async fn test_parse_failure_is_an_implicit_critique() {
        let backend = ScriptedBackend::new().reply(&WRITER, &["seven", "7"]);
        let sink = Arc::new(RecordingSink::default());
        let outcome = run(&task(ExhaustionPolicy::Strict), &backend, &options(2, &sink))
            .await
            .unwrap();
        assert_eq!(outcome.attempts, 2);
        assert!(backend.prompts_for(&WRITER)[1].contains("could not be parsed"));
        // the unparseable attempt never reached validation
        assert_eq!(
            sink.stages().iter().filter(|s| *s == STAGE_VALIDATING).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_strict_exhaustion_carries_history() {
        let backend = ScriptedBackend::new().reply(&WRITER, &["1", "oops", "2"]);
        let sink = Arc::new(RecordingSink::default());
        let err = run(&task(ExhaustionPolicy::Strict), &backend, &options(2, &sink))
            .await
            .unwrap_err();

        match err {
            PipelineError::ValidationExhausted { task, attempts } => {
                assert_eq!(task, "number");
                assert_eq!(attempts.len(), 3);
                assert_eq!(attempts[1].verdict, Verdict::Unparseable);
                assert!(matches!(attempts[2].verdict, Verdict::Critique { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let events = sink.events();
        assert_eq!(events.last().unwrap().stage, STAGE_FAILED);
        assert!(sink.stages().contains(&STAGE_EXHAUSTED.to_string()));
    }

    #[tokio::test]
    async fn test_strict_fallback_recovers_from_prose() {
        // "[7]" is not a bare number, so strict extraction fails; the lenient re-parse finds it.
        let backend = ScriptedBackend::new().reply(&WRITER, &["1", "Final answer: [7]. Thanks!"]);
        let outcome = run(&task(ExhaustionPolicy::Strict), &backend, &RunOptions::new(1))
            .await
            .unwrap();
        assert_eq!(outcome.output, 7);
        assert_eq!(outcome.resolution, Resolution::Fallback);
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_soft_exhaustion_returns_unchanged_input() {
        let backend = ScriptedBackend::new().reply(&WRITER, &["not json"]);
        let outcome = run(&task(ExhaustionPolicy::Soft), &backend, &RunOptions::new(1))
            .await
            .unwrap();
        assert_eq!(outcome.output, 0);
        assert_eq!(outcome.resolution, Resolution::Unchanged);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(backend.calls_for(&WRITER), 2);
    }

    #[tokio::test]
    async fn test_backend_failure_propagates_without_retry() {
        let backend = ScriptedBackend::new().fail(&WRITER, "upstream down");
        let sink = Arc::new(RecordingSink::default());
        let err = run(&task(ExhaustionPolicy::BestEffort), &backend, &options(3, &sink))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Backend { role: "writer", .. }));
        assert_eq!(backend.calls_for(&WRITER), 1);
        assert_eq!(sink.done_count(), 1);
        assert_eq!(sink.events().last().unwrap().stage, STAGE_FAILED);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let backend = ScriptedBackend::new().reply(&WRITER, &["7"]);
        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let opts = options(2, &sink).with_cancellation(cancel);

        let err = run(&task(ExhaustionPolicy::Strict), &backend, &opts).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { iteration: 0, .. }));
        assert_eq!(backend.total_calls(), 0);
        assert_eq!(sink.events().last().unwrap().stage, STAGE_CANCELLED);
        assert_eq!(sink.done_count(), 1);
    }

    #[tokio::test]
    async fn test_iteration_bound_is_not_capped_by_request_ceiling() {
        let backend = ScriptedBackend::new().reply(&WRITER, &["1"]);
        let sink = Arc::new(RecordingSink::default());
        let outcome = run(&task(ExhaustionPolicy::BestEffort), &backend, &options(8, &sink))
            .await
            .unwrap();
        assert_eq!(backend.calls_for(&WRITER), 9);
        assert_eq!(outcome.attempts, 9);
        assert_eq!(sink.done_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_between_generate_and_validate() {
        let cancel = CancellationToken::new();
        let backend = ScriptedBackend::new()
            .reply(&WRITER, &["7"])
            .cancel_on_call(cancel.clone(), 1);
        let sink = Arc::new(RecordingSink::default());
        let opts = options(2, &sink).with_cancellation(cancel);

        let err = run(&task(ExhaustionPolicy::Strict), &backend, &opts).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { iteration: 0, .. }));
        assert_eq!(backend.calls_for(&WRITER), 1);
        assert!(!sink.stages().contains(&STAGE_VALIDATING.to_string()));
        assert_eq!(sink.done_count(), 1);
        assert_eq!(sink.events().last().unwrap().stage, STAGE_CANCELLED);
    }

    #[tokio::test]
    async fn test_cancelled_during_later_iteration() {
        let cancel = CancellationToken::new();
        let backend = ScriptedBackend::new()
            .reply(&WRITER, &["1"])
            .cancel_on_call(cancel.clone(), 2);
        let sink = Arc::new(RecordingSink::default());
        let opts = options(4, &sink).with_cancellation(cancel);

        let err = run(&task(ExhaustionPolicy::BestEffort), &backend, &opts).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { iteration: 1, .. }));
        assert_eq!(backend.calls_for(&WRITER), 2);
        assert_eq!(
            sink.stages().iter().filter(|s| *s == STAGE_VALIDATING).count(),
            1
        );
        assert_eq!(sink.done_count(), 1);
        assert_eq!(sink.events().last().unwrap().stage, STAGE_CANCELLED);
    }

    #[test]
    fn test_iteration_context_is_rebuilt_not_mutated() {
        let first = IterationContext::first(2);
        let second = first.next("bad".to_string());
        assert_eq!(first.iteration, 0);
        assert!(first.critiques.is_empty());
        assert_eq!(second.iteration, 1);
        assert_eq!(second.last_critique(), Some("bad"));
        assert!(!second.is_final());
        assert!(second.next("worse".to_string()).is_final());
    }

    #[test]
    fn test_short_circuit_and_reject_emit_one_terminal_event() {
        let sink = Arc::new(RecordingSink::default());
        let opts = RunOptions::default().with_progress(sink.clone());
        let outcome = short_circuit("number", &opts, 5, "nothing to do");
        assert_eq!(outcome.attempts, 0);
        assert_eq!(sink.done_count(), 1);

        let sink = Arc::new(RecordingSink::default());
        let opts = RunOptions::default().with_progress(sink.clone());
        let err = reject::<i64>("number", &opts, PipelineError::InvalidInput("bad".into()));
        assert!(err.is_err());
        assert_eq!(sink.events()[0].stage, STAGE_FAILED);
    }
}
