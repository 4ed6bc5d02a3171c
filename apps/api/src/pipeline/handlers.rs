//! Axum route handlers for the pipeline API.
//!
//! Every pipeline has a JSON endpoint and a `/stream` twin. The stream sends
//! `progress` events as the run advances, then exactly one `result` or `error`
//! event. Closing the connection cancels the run at its next stage boundary.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::error;

use crate::errors::AppError;
use crate::llm_client::ModelBackend;
use crate::pipeline::error::PipelineError;
use crate::pipeline::orchestrator::RunOptions;
use crate::pipeline::progress::ChannelSink;
use crate::pipeline::tasks::{
    generate_summary, refine_text, sort_flat_list, sort_skill_groups, FlatSortRequest,
    FlatSortResponse, RefineRequest, RefineResponse, SkillOrdering, SkillSortRequest,
    SummaryRequest, SummaryResponse,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// JSON handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/summary
pub async fn handle_summary(
    State(state): State<AppState>,
    Json(request): Json<SummaryRequest>,
) -> Result<Json<SummaryResponse>, AppError> {
    let options = state.run_options(request.max_iterations);
    let outcome = generate_summary(state.llm.as_ref(), &request, &options).await?;
    Ok(Json(outcome.into()))
}

/// POST /api/v1/skills/sort
///
/// 422 with the attempt history if no valid ordering was produced.
pub async fn handle_skill_sort(
    State(state): State<AppState>,
    Json(request): Json<SkillSortRequest>,
) -> Result<Json<SkillOrdering>, AppError> {
    let options = state.run_options(request.max_iterations);
    let outcome = sort_skill_groups(state.llm.as_ref(), &request, &options).await?;
    Ok(Json(outcome.output))
}

/// POST /api/v1/technologies/sort
pub async fn handle_flat_sort(
    State(state): State<AppState>,
    Json(request): Json<FlatSortRequest>,
) -> Result<Json<FlatSortResponse>, AppError> {
    let options = state.run_options(request.max_iterations);
    let outcome = sort_flat_list(state.llm.as_ref(), &request, &options).await?;
    Ok(Json(outcome.into()))
}

/// POST /api/v1/job-description/refine
pub async fn handle_refine(
    State(state): State<AppState>,
    Json(request): Json<RefineRequest>,
) -> Result<Json<RefineResponse>, AppError> {
    let options = state.run_options(request.max_iterations);
    let outcome = refine_text(state.llm.as_ref(), &request, &options).await?;
    Ok(Json(outcome.into()))
}

// ────────────────────────────────────────────────────────────────────────────
// Streaming handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/summary/stream
pub async fn handle_summary_stream(
    State(state): State<AppState>,
    Json(request): Json<SummaryRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let max_iterations = request.max_iterations;
    stream_pipeline(state, max_iterations, move |llm, options| async move {
        generate_summary(llm.as_ref(), &request, &options)
            .await
            .map(SummaryResponse::from)
    })
}

/// POST /api/v1/skills/sort/stream
pub async fn handle_skill_sort_stream(
    State(state): State<AppState>,
    Json(request): Json<SkillSortRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let max_iterations = request.max_iterations;
    stream_pipeline(state, max_iterations, move |llm, options| async move {
        sort_skill_groups(llm.as_ref(), &request, &options)
            .await
            .map(|outcome| outcome.output)
    })
}

/// POST /api/v1/technologies/sort/stream
pub async fn handle_flat_sort_stream(
    State(state): State<AppState>,
    Json(request): Json<FlatSortRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let max_iterations = request.max_iterations;
    stream_pipeline(state, max_iterations, move |llm, options| async move {
        sort_flat_list(llm.as_ref(), &request, &options)
            .await
            .map(FlatSortResponse::from)
    })
}

/// POST /api/v1/job-description/refine/stream
pub async fn handle_refine_stream(
    State(state): State<AppState>,
    Json(request): Json<RefineRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let max_iterations = request.max_iterations;
    stream_pipeline(state, max_iterations, move |llm, options| async move {
        refine_text(llm.as_ref(), &request, &options)
            .await
            .map(RefineResponse::from)
    })
}

/// Spawns the run and turns its progress channel into an SSE stream.
///
/// The run owns the only sender, so the channel closes once the run returns and
/// its terminal `done` event is always the last `progress` event sent.
fn stream_pipeline<F, Fut, R>(
    state: AppState,
    max_iterations: Option<u32>,
    run: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: FnOnce(Arc<dyn ModelBackend>, RunOptions) -> Fut,
    Fut: Future<Output = Result<R, PipelineError>> + Send + 'static,
    R: Serialize + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = state.shutdown.child_token();
    let options = state
        .run_options(max_iterations)
        .with_progress(Arc::new(ChannelSink::new(tx)))
        .with_cancellation(cancel.clone());
    let handle = tokio::spawn(run(state.llm.clone(), options));
    let guard = cancel.drop_guard();

    let stream = async_stream::stream! {
        // Dropping the stream (client went away) cancels the run.
        let _guard = guard;

        while let Some(event) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&event) {
                yield Ok(Event::default().event("progress").data(json));
            }
        }

        let outcome = match handle.await {
            Ok(result) => result.map_err(AppError::from),
            Err(e) => {
                error!("pipeline task panicked or was aborted: {e}");
                Err(AppError::Internal(anyhow::anyhow!("pipeline task failed: {e}")))
            }
        };

        let event = match outcome {
            Ok(result) => serde_json::to_string(&result)
                .map(|json| Event::default().event("result").data(json)),
            Err(app_error) => {
                let (_, body) = app_error.to_body();
                serde_json::to_string(&body).map(|json| Event::default().event("error").data(json))
            }
        };
        match event {
            Ok(event) => yield Ok(event),
            Err(e) => error!("failed to serialize final event: {e}"),
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
