//! Parser for the Messages API server-sent-event stream.
//!
//! Only `data:` lines matter; `event:` lines repeat the `type` field of the payload.

use serde::Deserialize;

use crate::llm_client::backend::StreamChunk;
use crate::llm_client::LlmError;

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    delta: Option<StreamDelta>,
    error: Option<StreamErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(rename = "type")]
    delta_type: Option<String>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    message: String,
}

/// Parses one line of the event stream.
///
/// Returns `Ok(None)` for lines that carry no text (pings, block starts, usage updates).
pub fn parse_line(line: &str) -> Result<Option<StreamChunk>, LlmError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }

    let event: StreamEvent = serde_json::from_str(data)?;
    match event.event_type.as_str() {
        "content_block_delta" => Ok(event.delta.and_then(|d| {
            match d.delta_type.as_deref() {
                Some("text_delta") | None => d.text.map(StreamChunk::Delta),
                _ => None,
            }
        })),
        "message_stop" => Ok(Some(StreamChunk::End)),
        "error" => Err(LlmError::Stream(
            event
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "unknown stream error".to_string()),
        )),
        _ => Ok(None),
    }
}
