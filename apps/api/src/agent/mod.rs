//! Agent Invocation Facade: the single boundary between Candilyzer and the
//! conversational agent runtime.
//!
//! Callers hand over an `EvaluationRequest` and get back a lazy, ordered,
//! finite fragment stream. Fragment content is never interpreted here.
//! Every failure, including an unreachable endpoint or rejected key, arrives
//! as an `Err` item that ends the stream. Nothing is retried.

use std::pin::Pin;

use futures::Stream;
use thiserror::Error;

use crate::evaluation::request_builder::EvaluationRequest;

pub mod nebius;
pub mod prompts;
pub mod streaming;
pub mod tools;

pub use nebius::NebiusAgent;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Model stream reported an error: {0}")]
    Stream(String),

    #[error("Agent did not finish within {turns} turns")]
    TurnLimit { turns: u32 },

    #[error("Agent task aborted: {0}")]
    Aborted(String),

    #[error("Fragment consumer disconnected")]
    Disconnected,
}

/// One unit of streamed agent output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFragment {
    /// Answer text, in arrival order.
    Content(String),
    /// The agent asked for a tool.
    ToolCall { name: String },
    /// A tool result went back to the agent.
    ToolResult { name: String },
}

impl StreamFragment {
    /// The textual payload, if this fragment carries one.
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamFragment::Content(text) => Some(text),
            StreamFragment::ToolCall { .. } | StreamFragment::ToolResult { .. } => None,
        }
    }
}

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<StreamFragment, AgentError>> + Send>>;

/// An agent runtime that can execute an evaluation task.
///
/// Carried in `AppState` as `Arc<dyn AgentRuntime>`.
pub trait AgentRuntime: Send + Sync {
    fn invoke(&self, request: EvaluationRequest) -> FragmentStream;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_content_is_textual() {
        assert_eq!(StreamFragment::Content("hi".to_string()).text(), Some("hi"));
        assert_eq!(
            StreamFragment::ToolCall {
                name: "think".to_string()
            }
            .text(),
            None
        );
        assert_eq!(
            StreamFragment::ToolResult {
                name: "think".to_string()
            }
            .text(),
            None
        );
    }
}
