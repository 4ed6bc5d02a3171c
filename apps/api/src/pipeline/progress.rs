//! Progress events — the ordered, stage-labelled notifications a run emits.
//!
//! # Contract
//! - Emission is synchronous; the orchestrator does not advance until `emit` returns.
//! - Every run emits exactly one `done = true` event and it is the last one.
//!   `ProgressEmitter` enforces this: anything emitted after the terminal event is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

pub const STAGE_STARTED: &str = "started";
pub const STAGE_GENERATING: &str = "generating";
pub const STAGE_DRAFT: &str = "draft";
pub const STAGE_VALIDATING: &str = "validating";
pub const STAGE_REVIEWING: &str = "reviewing";
pub const STAGE_REVISING: &str = "revising";
pub const STAGE_EXHAUSTED: &str = "exhausted";
pub const STAGE_COMPLETE: &str = "complete";
pub const STAGE_FAILED: &str = "failed";
pub const STAGE_CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: String,
    pub message: String,
    pub done: bool,
    pub iteration: Option<u32>,
    pub at: DateTime<Utc>,
}

/// Receiver of progress events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event.
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Plain closures are sinks, so callers can pass `|event| ...` directly.
impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Forwards events into an unbounded channel (SSE handlers read the other end).
/// A closed receiver is not an error: the run continues until it notices cancellation.
pub struct ChannelSink {
    tx: UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            debug!("progress receiver dropped");
        }
    }
}

/// Per-run wrapper around a sink that guarantees the single-terminal-event rule.
pub struct ProgressEmitter {
    sink: Arc<dyn ProgressSink>,
    finished: AtomicBool,
}

impl ProgressEmitter {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            finished: AtomicBool::new(false),
        }
    }

    pub fn emit(&self, stage: &str, message: impl Into<String>, iteration: Option<u32>) {
        if self.finished.load(Ordering::SeqCst) {
            debug!(stage, "dropping progress event emitted after terminal event");
            return;
        }
        self.sink.emit(ProgressEvent {
            stage: stage.to_string(),
            message: message.into(),
            done: false,
            iteration,
            at: Utc::now(),
        });
    }

    /// Emits the terminal `done = true` event. Only the first call has any effect.
    pub fn finish(&self, stage: &str, message: impl Into<String>) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sink.emit(ProgressEvent {
            stage: stage.to_string(),
            message: message.into(),
            done: true,
            iteration: None,
            at: Utc::now(),
        });
    }
}
