//! The model backend seam. Everything in `pipeline` talks to a `dyn ModelBackend`;
//! `LlmClient` is the production implementation and tests substitute a scripted one.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::llm_client::LlmError;

/// One item of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Delta(String),
    /// Explicit end-of-stream marker. A stream that closes without it was truncated.
    End,
}

pub type DeltaStream = BoxStream<'static, Result<StreamChunk, LlmError>>;

/// Given a system instruction and user text, returns completion text.
///
/// Timeouts, authentication and transport retries are the implementor's concern.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn invoke(&self, system: &str, text: &str) -> Result<String, LlmError>;

    /// Streaming variant. The default buffers `invoke` into a single delta.
    async fn invoke_stream(&self, system: &str, text: &str) -> Result<DeltaStream, LlmError> {
        let text = self.invoke(system, text).await?;
        Ok(stream::iter(vec![Ok(StreamChunk::Delta(text)), Ok(StreamChunk::End)]).boxed())
    }
}
