//! Test-only helpers: a scripted model backend and a recording progress sink.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::llm_client::{DeltaStream, LlmError, ModelBackend, StreamChunk};
use crate::pipeline::agent::Agent;
use crate::pipeline::progress::{ProgressEvent, ProgressSink};

/// A canned reply for one backend call.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// Fails the call with an API error carrying this message.
    Fail(String),
}

/// Backend that replays queued replies per agent and records every call.
///
/// Replies are keyed by the agent's system prompt. When a queue has one reply left it
/// is repeated forever, so "always returns X" needs a single entry.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<HashMap<&'static str, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, String)>>,
    cancel_on: Option<(CancellationToken, usize)>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, agent: &Agent, texts: &[&str]) -> Self {
        {
            let mut replies = self.replies.lock().unwrap();
            let queue = replies.entry(agent.system_prompt).or_default();
            queue.extend(texts.iter().map(|t| Reply::Text(t.to_string())));
        }
        self
    }

    pub fn fail(self, agent: &Agent, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(agent.system_prompt)
            .or_default()
            .push_back(Reply::Fail(message.to_string()));
        self
    }

    /// Cancels `token` during the `call`-th backend call (1-based). The call still
    /// returns its reply; the run sees the cancellation afterwards.
    pub fn cancel_on_call(mut self, token: CancellationToken, call: usize) -> Self {
        self.cancel_on = Some((token, call));
        self
    }

    /// Number of calls made with this agent's system prompt.
    pub fn calls_for(&self, agent: &Agent) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(system, _)| system == agent.system_prompt)
            .count()
    }

    /// Prompts sent to this agent, in call order.
    pub fn prompts_for(&self, agent: &Agent) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(system, _)| system == agent.system_prompt)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_reply(&self, system: &str) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        let queue = replies
            .get_mut(system)
            .unwrap_or_else(|| panic!("no scripted reply for system prompt: {system}"));
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().expect("empty reply queue")
        }
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn invoke(&self, system: &str, text: &str) -> Result<String, LlmError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((system.to_string(), text.to_string()));
            calls.len()
        };
        if let Some((token, at)) = &self.cancel_on {
            if call == *at {
                token.cancel();
            }
        }
        match self.next_reply(system) {
            Reply::Text(t) => Ok(t),
            Reply::Fail(message) => Err(LlmError::Api {
                status: 500,
                message,
            }),
        }
    }

    /// Streams the reply word by word so delta forwarding is exercised.
    async fn invoke_stream(&self, system: &str, text: &str) -> Result<DeltaStream, LlmError> {
        let reply = self.invoke(system, text).await?;
        let mut chunks: Vec<Result<StreamChunk, LlmError>> = reply
            .split_inclusive(' ')
            .map(|w| Ok(StreamChunk::Delta(w.to_string())))
            .collect();
        chunks.push(Ok(StreamChunk::End));
        Ok(stream::iter(chunks).boxed())
    }
}

/// Progress sink that keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn stages(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.stage).collect()
    }

    pub fn done_count(&self) -> usize {
        self.events().iter().filter(|e| e.done).count()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
