//! Server-Sent Events decoding for streamed chat completions.
//!
//! [`SseDecoder`] turns raw body chunks into `data:` payloads, and
//! [`TurnAccumulator`] folds the decoded deltas into answer text and
//! complete tool calls for one model turn.

use bytes::BytesMut;
use serde::{Deserialize, Serialize};

use crate::agent::AgentError;

/// One meaningful SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    Data(String),
    Done,
}

/// Line splitter over raw body bytes. Lines are only decoded once complete,
/// so chunk boundaries inside a multi-byte character are harmless.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
}

impl SseDecoder {
    /// Buffers `chunk` and returns every complete line it finished.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseLine> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(newline + 1);
            if let Some(parsed) = parse_line(&line) {
                lines.push(parsed);
            }
        }
        lines
    }

    /// Flushes a trailing line that had no newline.
    pub fn finish(&mut self) -> Option<SseLine> {
        let rest = self.buffer.split();
        parse_line(&rest)
    }
}

fn parse_line(raw: &[u8]) -> Option<SseLine> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        Some(SseLine::Done)
    } else {
        Some(SseLine::Data(data.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

/// A complete tool call as sent back to the model in the assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallDelta>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    index: Option<usize>,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Turn accumulation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Collects one model turn: the answer text and any tool calls, whose names
/// and arguments arrive split across many deltas keyed by `index`.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    content: String,
    tool_calls: Vec<PartialToolCall>,
}

/// What a finished turn produced.
#[derive(Debug, Default)]
pub struct TurnOutcome {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl TurnAccumulator {
    /// Applies one `data:` payload. Returns the text delta to forward, if any.
    pub fn apply(&mut self, data: &str) -> Result<Option<String>, AgentError> {
        let chunk: StreamChunk = serde_json::from_str(data)?;
        if let Some(error) = chunk.error {
            return Err(AgentError::Stream(error.message));
        }

        let mut text = String::new();
        for delta in chunk.choices.into_iter().filter_map(|c| c.delta) {
            if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                text.push_str(&content);
            }
            for call in delta.tool_calls {
                self.apply_tool_delta(call)?;
            }
        }

        if text.is_empty() {
            return Ok(None);
        }
        self.content.push_str(&text);
        Ok(Some(text))
    }

    /// Tool calls are indexed densely from zero: a delta may extend an
    /// existing call or open the next one, never skip ahead.
    fn apply_tool_delta(&mut self, delta: ToolCallDelta) -> Result<(), AgentError> {
        let open = self.tool_calls.len();
        let index = delta.index.unwrap_or(open.saturating_sub(1));
        if index > open {
            return Err(AgentError::Stream(format!(
                "tool call index {index} skips ahead of {open} open calls"
            )));
        }
        if index == open {
            self.tool_calls.push(PartialToolCall::default());
        }
        let slot = &mut self.tool_calls[index];
        if let Some(id) = delta.id {
            slot.id = Some(id);
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                slot.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                slot.arguments.push_str(&arguments);
            }
        }
        Ok(())
    }

    pub fn finish(self) -> TurnOutcome {
        let tool_calls = self
            .tool_calls
            .into_iter()
            .enumerate()
            .filter(|(_, call)| !call.name.is_empty())
            .map(|(index, call)| ToolCall {
                id: call.id.unwrap_or_else(|| format!("call_{index}")),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: call.name,
                    arguments: if call.arguments.trim().is_empty() {
                        "{}".to_string()
                    } else {
                        call.arguments
                    },
                },
            })
            .collect();

        TurnOutcome {
            content: self.content,
            tool_calls,
        }
    }
}
