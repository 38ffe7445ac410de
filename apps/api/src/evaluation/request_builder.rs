//! Request Builder: validates a form submission and composes the agent task.
//!
//! Pure function of its inputs. Validation runs in a fixed order and the
//! first failure wins: required form fields, then the session credentials.

use thiserror::Error;

use crate::evaluation::prompts::{PromptStore, MULTI_THINKING_INSTRUCTIONS};
use crate::evaluation::Mode;
use crate::session::{Secret, SessionConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Please enter {0}.")]
    MissingInput(&'static str),

    #[error("Please provide all API keys and model ID.")]
    MissingCredentials,
}

/// A tool/ability granted to the agent for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityDescriptor {
    /// Free-form scratchpad. `instructions` overrides the default guidance.
    Thinking { instructions: Option<String> },
    /// Structured step-by-step reasoning scratchpad.
    Reasoning,
    /// Read access to the GitHub REST API.
    CodeHostAccess { token: Secret },
    /// Keyword web search restricted to `allowed_domains`.
    WebSearch {
        token: Secret,
        allowed_domains: Vec<String>,
    },
}

/// Raw multi-candidate form.
#[derive(Debug, Clone, Default)]
pub struct MultiCandidateInput {
    /// One username per line, as typed.
    pub usernames: String,
    pub job_role: String,
}

/// Raw single-candidate form.
#[derive(Debug, Clone, Default)]
pub struct SingleCandidateInput {
    pub github_username: String,
    pub linkedin_url: Option<String>,
    pub job_role: String,
}

#[derive(Debug, Clone)]
pub enum EvaluationInput {
    Multi(MultiCandidateInput),
    Single(SingleCandidateInput),
}

impl EvaluationInput {
    pub fn mode(&self) -> Mode {
        match self {
            EvaluationInput::Multi(_) => Mode::Multi,
            EvaluationInput::Single(_) => Mode::Single,
        }
    }
}

/// Everything one invocation needs. Built fresh per submission and never mutated.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub mode: Mode,
    pub task_text: String,
    pub description: String,
    pub instructions: String,
    pub capabilities: Vec<CapabilityDescriptor>,
    pub model_id: String,
    pub model_endpoint_key: Secret,
    /// Number of candidates named in the task.
    pub candidate_count: usize,
}

/// Validates `input` against `session` and composes the request.
pub fn build(
    input: &EvaluationInput,
    session: &SessionConfig,
    prompts: &PromptStore,
) -> Result<EvaluationRequest, BuildError> {
    let (task_text, candidate_count) = match input {
        EvaluationInput::Multi(form) => compose_multi(form)?,
        EvaluationInput::Single(form) => (compose_single(form)?, 1),
    };

    if !session.is_complete() {
        return Err(BuildError::MissingCredentials);
    }

    let mode = input.mode();
    let descriptor = prompts.for_mode(mode);

    Ok(EvaluationRequest {
        mode,
        task_text,
        description: descriptor.description.clone(),
        instructions: descriptor.instructions.clone(),
        capabilities: capabilities_for(mode, session),
        model_id: session.model_id.trim().to_string(),
        model_endpoint_key: session.model_endpoint_key.clone(),
        candidate_count,
    })
}

/// Splits the raw textarea into usernames: one per line, trimmed, blanks
/// dropped, order kept, duplicates kept.
pub fn parse_usernames(raw: &str) -> Vec<&str> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

fn compose_multi(form: &MultiCandidateInput) -> Result<(String, usize), BuildError> {
    let usernames = parse_usernames(&form.usernames);
    let role = form.job_role.trim();
    if usernames.is_empty() || role.is_empty() {
        return Err(BuildError::MissingInput("usernames and job role"));
    }

    let task = format!(
        "Evaluate GitHub candidates for role '{role}': {}",
        usernames.join(", ")
    );
    Ok((task, usernames.len()))
}

fn compose_single(form: &SingleCandidateInput) -> Result<String, BuildError> {
    let username = form.github_username.trim();
    let role = form.job_role.trim();
    if username.is_empty() || role.is_empty() {
        return Err(BuildError::MissingInput("GitHub username and job role"));
    }

    let mut task = format!("Analyze candidate for {role}. GitHub: {username}");
    if let Some(url) = form
        .linkedin_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
    {
        task.push_str(&format!(", LinkedIn: {url}"));
    }
    Ok(task)
}

/// The fixed capability set for `mode`, in declaration order.
pub fn capabilities_for(mode: Mode, session: &SessionConfig) -> Vec<CapabilityDescriptor> {
    let (thinking_instructions, domains): (Option<String>, &[&str]) = match mode {
        Mode::Multi => (Some(MULTI_THINKING_INSTRUCTIONS.to_string()), &["github.com"]),
        Mode::Single => (None, &["linkedin.com", "github.com"]),
    };

    vec![
        CapabilityDescriptor::Thinking {
            instructions: thinking_instructions,
        },
        CapabilityDescriptor::CodeHostAccess {
            token: session.code_host_token.clone(),
        },
        CapabilityDescriptor::WebSearch {
            token: session.search_api_token.clone(),
            allowed_domains: domains.iter().map(|d| d.to_string()).collect(),
        },
        CapabilityDescriptor::Reasoning,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::prompts::ModeDescriptor;

    fn prompts() -> PromptStore {
        PromptStore::new(
            ModeDescriptor {
                description: "multi description".to_string(),
                instructions: "multi instructions".to_string(),
            },
            ModeDescriptor {
                description: "single description".to_string(),
                instructions: "single instructions".to_string(),
            },
        )
    }

    fn session() -> SessionConfig {
        SessionConfig {
            model_endpoint_key: Secret::new("nb-key".to_string()),
            model_id: "meta-llama/Llama-3.3-70B-Instruct".to_string(),
            code_host_token: Secret::new("ghp-token".to_string()),
            search_api_token: Secret::new("exa-token".to_string()),
        }
    }

    fn multi(usernames: &str, role: &str) -> EvaluationInput {
        EvaluationInput::Multi(MultiCandidateInput {
            usernames: usernames.to_string(),
            job_role: role.to_string(),
        })
    }

    fn single(username: &str, linkedin: Option<&str>, role: &str) -> EvaluationInput {
        EvaluationInput::Single(SingleCandidateInput {
            github_username: username.to_string(),
            linkedin_url: linkedin.map(str::to_string),
            job_role: role.to_string(),
        })
    }

    #[test]
    fn test_multi_task_text_trims_and_drops_blank_lines() {
        let request = build(&multi(" alice \n\nbob", "Backend Engineer"), &session(), &prompts())
            .unwrap();
        assert_eq!(
            request.task_text,
            "Evaluate GitHub candidates for role 'Backend Engineer': alice, bob"
        );
        assert_eq!(request.mode, Mode::Multi);
        assert_eq!(request.candidate_count, 2);
        assert_eq!(request.description, "multi description");
    }

    #[test]
    fn test_multi_keeps_order_and_duplicates() {
        let request = build(
            &multi("zed\r\nalice\nzed\n   \n", "SRE"),
            &session(),
            &prompts(),
        )
        .unwrap();
        assert_eq!(
            request.task_text,
            "Evaluate GitHub candidates for role 'SRE': zed, alice, zed"
        );
        assert_eq!(request.candidate_count, 3);
    }

    #[test]
    fn test_single_without_linkedin() {
        let request = build(&single("carol", None, "ML Engineer"), &session(), &prompts()).unwrap();
        assert_eq!(request.task_text, "Analyze candidate for ML Engineer. GitHub: carol");
        assert_eq!(request.instructions, "single instructions");
    }

    #[test]
    fn test_single_with_linkedin() {
        let request = build(
            &single("carol", Some("https://linkedin.com/in/carol"), "ML Engineer"),
            &session(),
            &prompts(),
        )
        .unwrap();
        assert_eq!(
            request.task_text,
            "Analyze candidate for ML Engineer. GitHub: carol, LinkedIn: https://linkedin.com/in/carol"
        );
    }

    #[test]
    fn test_single_blank_linkedin_is_omitted() {
        let request = build(&single("carol", Some("   "), "ML Engineer"), &session(), &prompts())
            .unwrap();
        assert!(!request.task_text.contains("LinkedIn"));
    }

    #[test]
    fn test_blank_fields_are_missing_input_regardless_of_credentials() {
        for config in [session(), SessionConfig::default()] {
            for input in [
                multi("", "Backend Engineer"),
                multi(" \n\t\n", "Backend Engineer"),
                multi("alice", "   "),
                single("", None, "ML Engineer"),
                single("carol", Some("https://linkedin.com/in/carol"), " "),
            ] {
                assert!(matches!(
                    build(&input, &config, &prompts()),
                    Err(BuildError::MissingInput(_))
                ));
            }
        }
    }

    #[test]
    fn test_missing_credentials() {
        let err = build(&multi("alice", "SRE"), &SessionConfig::default(), &prompts()).unwrap_err();
        assert_eq!(err, BuildError::MissingCredentials);

        let mut partial = session();
        partial.code_host_token = Secret::default();
        let err = build(&single("carol", None, "SRE"), &partial, &prompts()).unwrap_err();
        assert_eq!(err, BuildError::MissingCredentials);
    }

    #[test]
    fn test_capability_domains_per_mode() {
        let domains = |mode| {
            capabilities_for(mode, &session())
                .into_iter()
                .find_map(|c| match c {
                    CapabilityDescriptor::WebSearch { allowed_domains, .. } => {
                        Some(allowed_domains)
                    }
                    _ => None,
                })
                .unwrap()
        };
        assert_eq!(domains(Mode::Multi), vec!["github.com"]);
        assert_eq!(domains(Mode::Single), vec!["linkedin.com", "github.com"]);
    }

    #[test]
    fn test_capability_set_is_fixed() {
        let caps = capabilities_for(Mode::Multi, &session());
        assert_eq!(caps.len(), 4);
        assert_eq!(
            caps[0],
            CapabilityDescriptor::Thinking {
                instructions: Some(MULTI_THINKING_INSTRUCTIONS.to_string())
            }
        );
        assert_eq!(
            caps[1],
            CapabilityDescriptor::CodeHostAccess {
                token: Secret::new("ghp-token".to_string())
            }
        );
        assert_eq!(caps[3], CapabilityDescriptor::Reasoning);

        let single_caps = capabilities_for(Mode::Single, &session());
        assert_eq!(single_caps[0], CapabilityDescriptor::Thinking { instructions: None });
    }
}
