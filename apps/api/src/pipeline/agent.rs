//! Agents — immutable `{name, system_prompt}` pairs bound to the model backend at call time.
//!
//! An agent holds no state between calls; the same constant is shared by every run.

use futures::StreamExt;
use tracing::debug;

use crate::llm_client::{LlmError, ModelBackend, StreamChunk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Agent {
    pub name: &'static str,
    pub system_prompt: &'static str,
}

impl Agent {
    pub const fn new(name: &'static str, system_prompt: &'static str) -> Self {
        Self {
            name,
            system_prompt,
        }
    }

    pub async fn invoke(&self, backend: &dyn ModelBackend, text: &str) -> Result<String, LlmError> {
        debug!(role = self.name, prompt_chars = text.len(), "invoking agent");
        let output = backend.invoke(self.system_prompt, text).await?;
        debug!(role = self.name, output_chars = output.len(), "agent replied");
        Ok(output)
    }

    /// Streams the completion, handing each delta to `on_delta`, and returns the full text.
    ///
    /// Fails with `StreamTruncated` if the stream closes before its end marker.
    pub async fn invoke_streaming<F>(
        &self,
        backend: &dyn ModelBackend,
        text: &str,
        on_delta: F,
    ) -> Result<String, LlmError>
    where
        F: Fn(&str) + Send + Sync,
    {
        debug!(role = self.name, prompt_chars = text.len(), "streaming agent");
        let mut stream = backend.invoke_stream(self.system_prompt, text).await?;
        let mut output = String::new();

        while let Some(chunk) = stream.next().await {
            match chunk? {
                StreamChunk::Delta(delta) => {
                    on_delta(&delta);
                    output.push_str(&delta);
                }
                StreamChunk::End => return Ok(output),
            }
        }

        Err(LlmError::StreamTruncated)
    }
}
