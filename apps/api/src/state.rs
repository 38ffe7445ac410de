use std::sync::Arc;

use crate::agent::AgentRuntime;
use crate::evaluation::prompts::PromptStore;
use crate::session::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Loaded once at startup, read-only afterwards.
    pub prompts: Arc<PromptStore>,
    /// Pluggable agent runtime. Default: NebiusAgent.
    pub agent: Arc<dyn AgentRuntime>,
    pub sessions: SessionStore,
}
