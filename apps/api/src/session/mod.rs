//! Session configuration: the four credential/config values an evaluation needs.
//!
//! Sessions live only in memory. Each one is seeded from the environment
//! defaults and edited through the sidebar for as long as the page is open.

pub mod handlers;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::errors::AppError;

/// A credential string whose `Debug` output never shows the value.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(***)")
        }
    }
}

/// Credentials and model selection for one interactive session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub model_endpoint_key: Secret,
    pub model_id: String,
    pub code_host_token: Secret,
    pub search_api_token: Secret,
}

impl SessionConfig {
    /// True when every one of the four values is non-blank.
    pub fn is_complete(&self) -> bool {
        !self.model_endpoint_key.is_blank()
            && !self.model_id.trim().is_empty()
            && !self.code_host_token.is_blank()
            && !self.search_api_token.is_blank()
    }

    /// Applies user edits. Present fields replace the stored value (an empty
    /// string clears it); absent fields are left alone.
    pub fn apply(&mut self, patch: SessionPatch) {
        if let Some(key) = patch.nebius_api_key {
            self.model_endpoint_key = key;
        }
        if let Some(model_id) = patch.model_id {
            self.model_id = model_id;
        }
        if let Some(token) = patch.github_api_key {
            self.code_host_token = token;
        }
        if let Some(token) = patch.exa_api_key {
            self.search_api_token = token;
        }
    }
}

/// Sidebar edit payload. Field names follow the environment variables they override.
#[derive(Debug, Default, Deserialize)]
pub struct SessionPatch {
    pub nebius_api_key: Option<Secret>,
    pub model_id: Option<String>,
    pub github_api_key: Option<Secret>,
    pub exa_api_key: Option<Secret>,
}

/// A credential as shown to the client: only whether it has a value.
#[derive(Debug, Serialize)]
pub struct MaskedField {
    pub is_set: bool,
}

impl From<&Secret> for MaskedField {
    fn from(secret: &Secret) -> Self {
        Self {
            is_set: !secret.is_blank(),
        }
    }
}

/// Client-facing view of a session. Credentials are masked.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub model_id: String,
    pub nebius_api_key: MaskedField,
    pub github_api_key: MaskedField,
    pub exa_api_key: MaskedField,
    pub ready: bool,
}

impl SessionView {
    fn new(session_id: Uuid, config: &SessionConfig) -> Self {
        Self {
            session_id,
            model_id: config.model_id.clone(),
            nebius_api_key: (&config.model_endpoint_key).into(),
            github_api_key: (&config.code_host_token).into(),
            exa_api_key: (&config.search_api_token).into(),
            ready: config.is_complete(),
        }
    }
}

/// One interactive session: its editable config plus the single-evaluation gate.
pub struct Session {
    config: RwLock<SessionConfig>,
    in_flight: Arc<Mutex<()>>,
}

impl Session {
    fn new(config: SessionConfig) -> Self {
        Self {
            config: RwLock::new(config),
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Copy of the current config. An evaluation works from this copy, so
    /// later sidebar edits never reach a running invocation.
    pub async fn snapshot(&self) -> SessionConfig {
        self.config.read().await.clone()
    }

    /// Claims the session for one evaluation. The claim is released when the
    /// returned guard drops.
    pub fn try_begin(&self) -> Result<OwnedMutexGuard<()>, AppError> {
        self.in_flight.clone().try_lock_owned().map_err(|_| {
            AppError::Conflict("An evaluation is already running for this session".to_string())
        })
    }
}

/// In-memory registry of sessions. Nothing here is ever written to disk.
#[derive(Clone)]
pub struct SessionStore {
    defaults: SessionConfig,
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Session>>>>,
}

impl SessionStore {
    pub fn new(defaults: SessionConfig) -> Self {
        Self {
            defaults,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn create(&self) -> SessionView {
        let id = Uuid::new_v4();
        let session = Arc::new(Session::new(self.defaults.clone()));
        let view = SessionView::new(id, &session.snapshot().await);
        self.sessions.write().await.insert(id, session);
        view
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<Session>, AppError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
    }

    pub async fn view(&self, id: Uuid) -> Result<SessionView, AppError> {
        let session = self.get(id).await?;
        let config = session.snapshot().await;
        Ok(SessionView::new(id, &config))
    }

    pub async fn update(&self, id: Uuid, patch: SessionPatch) -> Result<SessionView, AppError> {
        let session = self.get(id).await?;
        let mut config = session.config.write().await;
        config.apply(patch);
        Ok(SessionView::new(id, &config))
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), AppError> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> SessionConfig {
        SessionConfig {
            model_endpoint_key: Secret::new("nb-key".to_string()),
            model_id: "Qwen/Qwen3-235B-A22B".to_string(),
            code_host_token: Secret::new("ghp-token".to_string()),
            search_api_token: Secret::new("exa-token".to_string()),
        }
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter2".to_string());
        assert_eq!(format!("{secret:?}"), "Secret(***)");
        assert_eq!(format!("{:?}", Secret::default()), "Secret(<empty>)");
    }

    #[test]
    fn test_session_config_debug_never_shows_credentials() {
        let rendered = format!("{:?}", full_config());
        assert!(!rendered.contains("nb-key"));
        assert!(!rendered.contains("ghp-token"));
        assert!(!rendered.contains("exa-token"));
    }

    #[test]
    fn test_is_complete_requires_all_four() {
        assert!(full_config().is_complete());
        assert!(!SessionConfig::default().is_complete());

        let mut missing_model = full_config();
        missing_model.model_id = "   ".to_string();
        assert!(!missing_model.is_complete());

        let mut missing_exa = full_config();
        missing_exa.search_api_token = Secret::default();
        assert!(!missing_exa.is_complete());
    }

    #[test]
    fn test_apply_replaces_present_fields_only() {
        let mut config = full_config();
        config.apply(SessionPatch {
            model_id: Some("deepseek-ai/DeepSeek-V3".to_string()),
            github_api_key: Some(Secret::default()),
            ..Default::default()
        });
        assert_eq!(config.model_id, "deepseek-ai/DeepSeek-V3");
        assert!(config.code_host_token.is_blank());
        assert_eq!(config.model_endpoint_key.expose(), "nb-key");
        assert_eq!(config.search_api_token.expose(), "exa-token");
    }

    #[tokio::test]
    async fn test_store_seeds_sessions_from_defaults() {
        let store = SessionStore::new(full_config());
        let view = store.create().await;
        assert!(view.ready);
        assert!(view.nebius_api_key.is_set);
        assert_eq!(view.model_id, "Qwen/Qwen3-235B-A22B");

        let session = store.get(view.session_id).await.unwrap();
        assert_eq!(session.snapshot().await, full_config());
    }

    #[tokio::test]
    async fn test_store_update_and_remove() {
        let store = SessionStore::new(SessionConfig::default());
        let view = store.create().await;
        assert!(!view.ready);

        let updated = store
            .update(
                view.session_id,
                SessionPatch {
                    nebius_api_key: Some(Secret::new("nb".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.nebius_api_key.is_set);
        assert!(!updated.github_api_key.is_set);

        store.remove(view.session_id).await.unwrap();
        assert!(matches!(
            store.view(view.session_id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            store.remove(view.session_id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_try_begin_admits_one_evaluation_at_a_time() {
        let store = SessionStore::new(full_config());
        let view = store.create().await;
        let session = store.get(view.session_id).await.unwrap();

        let guard = session.try_begin().unwrap();
        assert!(matches!(session.try_begin(), Err(AppError::Conflict(_))));
        drop(guard);
        assert!(session.try_begin().is_ok());
    }
}
