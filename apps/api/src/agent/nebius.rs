//! `NebiusAgent`: runs an evaluation against Nebius AI Studio's
//! OpenAI-compatible chat completions endpoint, with a bounded tool loop.

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, Instrument};

use crate::agent::prompts::compose_system_prompt;
use crate::agent::streaming::{SseDecoder, SseLine, ToolCall, TurnAccumulator, TurnOutcome};
use crate::agent::tools::{ToolDefinition, ToolEndpoints, Toolbox};
use crate::agent::{AgentError, AgentRuntime, FragmentStream, StreamFragment};
use crate::evaluation::request_builder::EvaluationRequest;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const FRAGMENT_BUFFER: usize = 64;

type FragmentSender = mpsc::Sender<Result<StreamFragment, AgentError>>;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
    stream: bool,
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ChatMessage {
    fn new(role: &'static str, content: String) -> Self {
        Self {
            role,
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    fn assistant(outcome: &TurnOutcome) -> Self {
        Self {
            role: "assistant",
            content: (!outcome.content.is_empty()).then(|| outcome.content.clone()),
            tool_calls: outcome.tool_calls.clone(),
            tool_call_id: None,
        }
    }

    fn tool(call_id: String, content: String) -> Self {
        Self {
            role: "tool",
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id),
        }
    }
}

/// The production agent runtime.
#[derive(Clone)]
pub struct NebiusAgent {
    client: Client,
    base_url: String,
    endpoints: ToolEndpoints,
    max_turns: u32,
}

impl NebiusAgent {
    pub fn new(
        base_url: impl Into<String>,
        endpoints: ToolEndpoints,
        max_turns: u32,
    ) -> Result<Self, AgentError> {
        // No overall timeout: a long evaluation streams for minutes.
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            endpoints,
            max_turns,
        })
    }

    async fn run(&self, request: EvaluationRequest, tx: &FragmentSender) -> Result<(), AgentError> {
        let toolbox = Toolbox::from_capabilities(&request.capabilities, &self.endpoints, &self.client);
        let definitions = toolbox.definitions();
        let mut messages = vec![
            ChatMessage::new("system", compose_system_prompt(&request, Utc::now())),
            ChatMessage::new("user", request.task_text.clone()),
        ];

        for turn in 1..=self.max_turns {
            let outcome = self.stream_turn(&request, &messages, &definitions, tx).await?;
            if outcome.tool_calls.is_empty() {
                info!(turn, "Agent finished");
                return Ok(());
            }

            debug!(turn, tool_calls = outcome.tool_calls.len(), "Agent requested tools");
            messages.push(ChatMessage::assistant(&outcome));
            for call in outcome.tool_calls {
                let name = call.function.name;
                emit(tx, StreamFragment::ToolCall { name: name.clone() }).await?;
                let result = toolbox.execute(&name, &call.function.arguments).await;
                messages.push(ChatMessage::tool(call.id, result));
                emit(tx, StreamFragment::ToolResult { name }).await?;
            }
        }

        Err(AgentError::TurnLimit {
            turns: self.max_turns,
        })
    }

    /// Streams one completion, forwarding text deltas as they arrive.
    async fn stream_turn(
        &self,
        request: &EvaluationRequest,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        tx: &FragmentSender,
    ) -> Result<TurnOutcome, AgentError> {
        let body = ChatRequest {
            model: &request.model_id,
            messages,
            tools,
            stream: true,
        };

        let mut response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(request.model_endpoint_key.expose())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                status: status.as_u16(),
                message: api_error_message(body),
            });
        }

        let mut decoder = SseDecoder::default();
        let mut turn = TurnAccumulator::default();

        'read: while let Some(chunk) = response.chunk().await? {
            for line in decoder.feed(&chunk) {
                match line {
                    SseLine::Done => break 'read,
                    SseLine::Data(data) => {
                        if let Some(text) = turn.apply(&data)? {
                            emit(tx, StreamFragment::Content(text)).await?;
                        }
                    }
                }
            }
        }
        if let Some(SseLine::Data(data)) = decoder.finish() {
            if let Some(text) = turn.apply(&data)? {
                emit(tx, StreamFragment::Content(text)).await?;
            }
        }

        Ok(turn.finish())
    }
}

impl AgentRuntime for NebiusAgent {
    fn invoke(&self, request: EvaluationRequest) -> FragmentStream {
        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
        let agent = self.clone();
        let span = tracing::info_span!(
            "agent",
            agent = request.mode.agent_name(),
            candidates = request.candidate_count
        );

        let task_tx = tx.clone();
        let task = tokio::spawn(
            async move {
                match agent.run(request, &task_tx).await {
                    Ok(()) | Err(AgentError::Disconnected) => {}
                    Err(e) => {
                        // Receiver may already be gone; nothing left to tell.
                        let _ = task_tx.send(Err(e)).await;
                    }
                }
            }
            .instrument(span.clone()),
        );
        tokio::spawn(report_task_failure(task, tx).instrument(span));

        Box::pin(ReceiverStream::new(rx))
    }
}

/// Holds the stream open until the agent task ends, so a panic surfaces as a
/// final `Err` instead of a stream that simply stops.
async fn report_task_failure(task: JoinHandle<()>, tx: FragmentSender) {
    if let Err(e) = task.await {
        error!("Agent task ended abnormally: {e}");
        let _ = tx.send(Err(AgentError::Aborted(e.to_string()))).await;
    }
}

async fn emit(tx: &FragmentSender, fragment: StreamFragment) -> Result<(), AgentError> {
    tx.send(Ok(fragment))
        .await
        .map_err(|_| AgentError::Disconnected)
}

/// Pulls a readable message out of an OpenAI-style or FastAPI-style error body.
fn api_error_message(body: String) -> String {
    let Ok(value) = serde_json::from_str::<Value>(&body) else {
        return body;
    };
    value
        .pointer("/error/message")
        .or_else(|| value.get("detail"))
        .or_else(|| value.get("message"))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or(body)
}
