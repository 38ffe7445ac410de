//! Axum route handlers for the Evaluation API.
//!
//! A submission is validated up front; failures come back as ordinary JSON
//! errors. Past validation the response is an SSE stream:
//!
//! - `output` `{"text": ...}`: the full report so far, once per text fragment
//! - `score` `{"score": n}`: single-candidate mode, when the report has one
//! - `error` `{"code", "message"}`: the invocation failed; nothing follows
//! - `done`: the report is complete

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, OwnedMutexGuard};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::agent::AgentRuntime;
use crate::errors::AppError;
use crate::evaluation::renderer::{render, OutputDisplay};
use crate::evaluation::request_builder::{
    build, EvaluationInput, EvaluationRequest, MultiCandidateInput, SingleCandidateInput,
};
use crate::evaluation::score::extract_score;
use crate::evaluation::Mode;
use crate::state::AppState;

/// Events queued for one client. Each `output` event carries the whole report,
/// so the queue stays short and a slow client holds the agent back.
const EVENT_BUFFER: usize = 8;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

/// Missing fields deserialize as empty so they surface as `MISSING_INPUT`.
#[derive(Debug, Deserialize)]
pub struct MultiCandidateForm {
    #[serde(default)]
    pub usernames: String,
    #[serde(default)]
    pub job_role: String,
}

#[derive(Debug, Deserialize)]
pub struct SingleCandidateForm {
    #[serde(default)]
    pub github_username: String,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub job_role: String,
}

impl From<MultiCandidateForm> for EvaluationInput {
    fn from(form: MultiCandidateForm) -> Self {
        EvaluationInput::Multi(MultiCandidateInput {
            usernames: form.usernames,
            job_role: form.job_role,
        })
    }
}

impl From<SingleCandidateForm> for EvaluationInput {
    fn from(form: SingleCandidateForm) -> Self {
        EvaluationInput::Single(SingleCandidateInput {
            github_username: form.github_username,
            linkedin_url: form.linkedin_url,
            job_role: form.job_role,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions/:id/evaluations/multi
pub async fn handle_evaluate_multi(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(form): Json<MultiCandidateForm>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    start_evaluation(state, session_id, form.into()).await
}

/// POST /api/v1/sessions/:id/evaluations/single
pub async fn handle_evaluate_single(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(form): Json<SingleCandidateForm>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    start_evaluation(state, session_id, form.into()).await
}

async fn start_evaluation(
    state: AppState,
    session_id: Uuid,
    input: EvaluationInput,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let session = state.sessions.get(session_id).await?;
    let config = session.snapshot().await;
    let request = build(&input, &config, &state.prompts)?;
    let guard = session.try_begin()?;

    info!(
        %session_id,
        mode = %request.mode,
        candidates = request.candidate_count,
        "Evaluation started"
    );

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let agent = state.agent.clone();
    tokio::spawn(async move {
        let watcher = tx.clone();
        tokio::select! {
            _ = watcher.closed() => debug!(%session_id, "Client disconnected, evaluation dropped"),
            _ = run_evaluation(agent, request, tx, guard) => {}
        }
    });

    let events = ReceiverStream::new(rx).map(Ok::<Event, Infallible>);
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Renders one invocation into SSE events. The session is released before
/// the final event goes out, so a client may resubmit as soon as it sees it.
async fn run_evaluation(
    agent: Arc<dyn AgentRuntime>,
    request: EvaluationRequest,
    tx: mpsc::Sender<Event>,
    guard: OwnedMutexGuard<()>,
) {
    let mode = request.mode;
    let mut display = SseDisplay { tx: tx.clone() };
    let outcome = render(agent.invoke(request), &mut display).await;
    drop(guard);

    // Send failures below mean the client left; there is no one to tell.
    match outcome {
        Ok(report) => {
            if mode == Mode::Single {
                if let Some(score) = extract_score(&report) {
                    let _ = tx.send(sse_event("score", json!({ "score": score }))).await;
                }
            }
            let _ = tx.send(Event::default().event("done").data("{}")).await;
        }
        Err(e) => {
            let err = AppError::from(e);
            let _ = tx
                .send(sse_event(
                    "error",
                    json!({ "code": err.code(), "message": err.to_string() }),
                ))
                .await;
        }
    }
}

/// Pushes each refresh to the client as an `output` event.
struct SseDisplay {
    tx: mpsc::Sender<Event>,
}

#[async_trait]
impl OutputDisplay for SseDisplay {
    async fn refresh(&mut self, accumulated: &str) {
        let _ = self
            .tx
            .send(sse_event("output", json!({ "text": accumulated })))
            .await;
    }
}

fn sse_event(name: &str, payload: serde_json::Value) -> Event {
    Event::default().event(name).data(payload.to_string())
}
