use anyhow::{ensure, Context, Result};

use crate::session::{Secret, SessionConfig};

/// Application configuration loaded from environment variables.
/// Fails startup if a value is present but unparseable.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub prompts_path: String,
    pub nebius_base_url: String,
    pub github_api_url: String,
    pub exa_api_url: String,
    pub agent_max_turns: u32,
    /// Seed values for every new session. Secrets are redacted in `Debug`.
    pub session_defaults: SessionConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let agent_max_turns = optional_env("AGENT_MAX_TURNS", "10")
            .parse::<u32>()
            .context("AGENT_MAX_TURNS must be a positive integer")?;
        ensure!(agent_max_turns >= 1, "AGENT_MAX_TURNS must be at least 1");

        Ok(Config {
            port: optional_env("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG", "info"),
            prompts_path: optional_env("PROMPTS_PATH", "hiring_prompts.toml"),
            nebius_base_url: optional_env("NEBIUS_BASE_URL", "https://api.studio.nebius.com/v1"),
            github_api_url: optional_env("GITHUB_API_URL", "https://api.github.com"),
            exa_api_url: optional_env("EXA_API_URL", "https://api.exa.ai"),
            agent_max_turns,
            session_defaults: SessionConfig {
                model_endpoint_key: Secret::new(optional_env("NEBIUS_API_KEY", "")),
                model_id: optional_env("MODEL_ID", ""),
                code_host_token: Secret::new(optional_env("GITHUB_API_KEY", "")),
                search_api_token: Secret::new(optional_env("EXA_API_KEY", "")),
            },
        })
    }

    /// Tracing filter used when `RUST_LOG` holds no usable directives.
    /// Covers this crate and the HTTP request spans from `TraceLayer`.
    pub fn default_log_directive(&self) -> String {
        format!(
            "{crate_name}={level},tower_http={level}",
            crate_name = env!("CARGO_PKG_NAME"),
            level = self.rust_log
        )
    }
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_env_falls_back_to_default() {
        assert_eq!(
            optional_env("CANDILYZER_TEST_SURELY_UNSET_VAR", "fallback"),
            "fallback"
        );
    }

    fn sample_config() -> Config {
        Config {
            port: 8080,
            rust_log: "info".to_string(),
            prompts_path: "hiring_prompts.toml".to_string(),
            nebius_base_url: "http://localhost".to_string(),
            github_api_url: "http://localhost".to_string(),
            exa_api_url: "http://localhost".to_string(),
            agent_max_turns: 3,
            session_defaults: SessionConfig {
                model_endpoint_key: Secret::new("nb-very-secret".to_string()),
                model_id: "meta-llama/Llama-3.3-70B-Instruct".to_string(),
                code_host_token: Secret::new("ghp_very_secret".to_string()),
                search_api_token: Secret::new("exa-very-secret".to_string()),
            },
        }
    }

    #[test]
    fn test_debug_output_redacts_session_defaults() {
        let rendered = format!("{:?}", sample_config());
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("very_secret"));
    }

    #[test]
    fn test_default_log_directive_includes_http_traces() {
        let config = Config {
            rust_log: "debug".to_string(),
            ..sample_config()
        };
        assert_eq!(
            config.default_log_directive(),
            "candilyzer=debug,tower_http=debug"
        );
    }
}
