//! Tools granted to the agent, derived from an invocation's capability set.
//!
//! Each [`CapabilityDescriptor`] expands into one or more [`Tool`]s. The
//! [`Toolbox`] advertises their schemas to the model and dispatches calls.
//! A failing tool never ends the invocation: the error text goes back to the
//! model as the tool result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::evaluation::request_builder::CapabilityDescriptor;
use crate::session::Secret;

const TOOL_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("candilyzer/", env!("CARGO_PKG_VERSION"));
const GITHUB_API_VERSION: &str = "2022-11-28";
const DEFAULT_REPO_LIMIT: u64 = 30;
const MAX_REPO_LIMIT: u64 = 100;
const DEFAULT_SEARCH_RESULTS: u64 = 5;
const MAX_SEARCH_RESULTS: u64 = 10;
const SEARCH_TEXT_CHARS: u64 = 1200;

const USER_FIELDS: &[&str] = &[
    "login",
    "name",
    "bio",
    "company",
    "location",
    "blog",
    "html_url",
    "public_repos",
    "followers",
    "following",
    "hireable",
    "created_at",
];

const REPO_FIELDS: &[&str] = &[
    "full_name",
    "description",
    "language",
    "topics",
    "stargazers_count",
    "forks_count",
    "fork",
    "archived",
    "pushed_at",
    "html_url",
];

const REPO_DETAIL_FIELDS: &[&str] = &[
    "full_name",
    "description",
    "language",
    "topics",
    "stargazers_count",
    "forks_count",
    "open_issues_count",
    "watchers_count",
    "fork",
    "archived",
    "default_branch",
    "created_at",
    "pushed_at",
    "homepage",
    "html_url",
];

const SEARCH_RESULT_FIELDS: &[&str] = &["title", "url", "publishedDate", "author", "text"];

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {status}: {message}")]
    Upstream { status: u16, message: String },
}

/// Function schema advertised to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

impl ToolDefinition {
    fn function(name: &'static str, description: &'static str, parameters: Value) -> Self {
        Self {
            tool_type: "function",
            function: FunctionDefinition {
                name,
                description,
                parameters,
            },
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;
    async fn call(&self, args: Value) -> Result<String, ToolError>;
}

/// Base URLs for the external services tools talk to.
#[derive(Debug, Clone)]
pub struct ToolEndpoints {
    pub github_api_url: String,
    pub exa_api_url: String,
}

/// The tools for one invocation.
pub struct Toolbox {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<&'static str, Arc<dyn Tool>>,
}

impl Toolbox {
    pub fn from_capabilities(
        capabilities: &[CapabilityDescriptor],
        endpoints: &ToolEndpoints,
        client: &Client,
    ) -> Self {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        for capability in capabilities {
            match capability {
                CapabilityDescriptor::Thinking { .. } => {
                    tools.push(Arc::new(ThinkTool::default()));
                }
                CapabilityDescriptor::Reasoning => {
                    let log = Arc::new(Mutex::new(Vec::new()));
                    tools.push(Arc::new(ReasonTool { log: log.clone() }));
                    tools.push(Arc::new(AnalyzeTool { log }));
                }
                CapabilityDescriptor::CodeHostAccess { token } => {
                    let github = GithubApi {
                        client: client.clone(),
                        base_url: endpoints.github_api_url.trim_end_matches('/').to_string(),
                        token: token.clone(),
                    };
                    for op in [GithubOp::GetUser, GithubOp::ListRepositories, GithubOp::GetRepository] {
                        tools.push(Arc::new(GithubTool {
                            api: github.clone(),
                            op,
                        }));
                    }
                }
                CapabilityDescriptor::WebSearch {
                    token,
                    allowed_domains,
                } => {
                    tools.push(Arc::new(WebSearchTool {
                        client: client.clone(),
                        base_url: endpoints.exa_api_url.trim_end_matches('/').to_string(),
                        token: token.clone(),
                        allowed_domains: allowed_domains.clone(),
                    }));
                }
            }
        }

        let by_name = tools
            .iter()
            .map(|tool| (tool.definition().function.name, tool.clone()))
            .collect();
        Self { tools, by_name }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    /// Runs one tool call. Always yields text for the model.
    pub async fn execute(&self, name: &str, arguments: &str) -> String {
        let Some(tool) = self.by_name.get(name) else {
            warn!(tool = name, "Model requested an unknown tool");
            return format!("Error: unknown tool '{name}'");
        };

        let args: Value = match serde_json::from_str(arguments) {
            Ok(args) => args,
            Err(e) => return format!("Error: arguments are not valid JSON: {e}"),
        };

        debug!(tool = name, "Executing tool");
        match tool.call(args).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = name, "Tool call failed: {e}");
                format!("Error: {e}")
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scratchpad tools
// ────────────────────────────────────────────────────────────────────────────

/// Free-form scratchpad. Returns every thought so far so the model can re-read them.
#[derive(Default)]
struct ThinkTool {
    thoughts: Mutex<Vec<String>>,
}

#[async_trait]
impl Tool for ThinkTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "think",
            "Record a private thought: a plan, an open question, or a check to run next.",
            json!({
                "type": "object",
                "properties": {
                    "thought": {"type": "string", "description": "The thought to record."}
                },
                "required": ["thought"]
            }),
        )
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let thought = required_str(&args, "thought")?;
        let mut thoughts = self.thoughts.lock().await;
        thoughts.push(thought.to_string());

        let mut out = String::from("Thoughts so far:");
        for (i, t) in thoughts.iter().enumerate() {
            out.push_str(&format!("\n{}. {t}", i + 1));
        }
        Ok(out)
    }
}

struct ReasonTool {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Tool for ReasonTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "reason",
            "Take one reasoning step: name it, state the thought, and the next action.",
            json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "thought": {"type": "string"},
                    "action": {"type": "string"},
                    "confidence": {"type": "number", "minimum": 0, "maximum": 1}
                },
                "required": ["title", "thought"]
            }),
        )
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let title = required_str(&args, "title")?;
        let thought = required_str(&args, "thought")?;
        let mut step = format!("## {title}\nThought: {thought}");
        if let Some(action) = args.get("action").and_then(Value::as_str) {
            step.push_str(&format!("\nAction: {action}"));
        }
        if let Some(confidence) = args.get("confidence").and_then(Value::as_f64) {
            step.push_str(&format!("\nConfidence: {confidence:.2}"));
        }
        Ok(record_step(&self.log, step).await)
    }
}

struct AnalyzeTool {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Tool for AnalyzeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "analyze",
            "Assess the result of the previous step and decide whether to continue.",
            json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "result": {"type": "string"},
                    "analysis": {"type": "string"}
                },
                "required": ["title", "result", "analysis"]
            }),
        )
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let step = format!(
            "## {}\nResult: {}\nAnalysis: {}",
            required_str(&args, "title")?,
            required_str(&args, "result")?,
            required_str(&args, "analysis")?
        );
        Ok(record_step(&self.log, step).await)
    }
}

async fn record_step(log: &Mutex<Vec<String>>, step: String) -> String {
    let mut steps = log.lock().await;
    steps.push(step);
    format!("Reasoning steps so far:\n\n{}", steps.join("\n\n"))
}

// ────────────────────────────────────────────────────────────────────────────
// GitHub
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct GithubApi {
    client: Client,
    base_url: String,
    token: Secret,
}

impl GithubApi {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ToolError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .bearer_auth(self.token.expose())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .header("User-Agent", USER_AGENT)
            .timeout(TOOL_HTTP_TIMEOUT)
            .send()
            .await?;
        read_json(response).await
    }
}

#[derive(Debug, Clone, Copy)]
enum GithubOp {
    GetUser,
    ListRepositories,
    GetRepository,
}

struct GithubTool {
    api: GithubApi,
    op: GithubOp,
}

#[async_trait]
impl Tool for GithubTool {
    fn definition(&self) -> ToolDefinition {
        match self.op {
            GithubOp::GetUser => ToolDefinition::function(
                "github_get_user",
                "Fetch a GitHub user's public profile.",
                json!({
                    "type": "object",
                    "properties": {"username": {"type": "string"}},
                    "required": ["username"]
                }),
            ),
            GithubOp::ListRepositories => ToolDefinition::function(
                "github_list_repositories",
                "List repositories owned by a GitHub user, most recently updated first.",
                json!({
                    "type": "object",
                    "properties": {
                        "username": {"type": "string"},
                        "limit": {"type": "integer", "minimum": 1, "maximum": MAX_REPO_LIMIT}
                    },
                    "required": ["username"]
                }),
            ),
            GithubOp::GetRepository => ToolDefinition::function(
                "github_get_repository",
                "Fetch details and language breakdown for one repository, given as owner/name.",
                json!({
                    "type": "object",
                    "properties": {"full_name": {"type": "string"}},
                    "required": ["full_name"]
                }),
            ),
        }
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let output = match self.op {
            GithubOp::GetUser => {
                let username = github_login(required_str(&args, "username")?)?;
                let user = self.api.get(&format!("/users/{username}"), &[]).await?;
                pick(&user, USER_FIELDS)
            }
            GithubOp::ListRepositories => {
                let username = github_login(required_str(&args, "username")?)?;
                let limit = args
                    .get("limit")
                    .and_then(Value::as_u64)
                    .unwrap_or(DEFAULT_REPO_LIMIT)
                    .clamp(1, MAX_REPO_LIMIT);
                let repos = self
                    .api
                    .get(
                        &format!("/users/{username}/repos"),
                        &[
                            ("type", "owner".to_string()),
                            ("sort", "updated".to_string()),
                            ("per_page", limit.to_string()),
                        ],
                    )
                    .await?;
                pick_each(&repos, REPO_FIELDS)
            }
            GithubOp::GetRepository => {
                let full_name = repository_name(required_str(&args, "full_name")?)?;
                let repo = self.api.get(&format!("/repos/{full_name}"), &[]).await?;
                let languages = self
                    .api
                    .get(&format!("/repos/{full_name}/languages"), &[])
                    .await?;
                let mut detail = pick(&repo, REPO_DETAIL_FIELDS);
                if let Value::Object(map) = &mut detail {
                    if let Some(license) = repo.pointer("/license/spdx_id") {
                        map.insert("license".to_string(), license.clone());
                    }
                    map.insert("languages".to_string(), languages);
                }
                detail
            }
        };
        Ok(output.to_string())
    }
}

/// GitHub logins are alphanumerics and single hyphens, at most 39 chars.
fn github_login(raw: &str) -> Result<&str, ToolError> {
    let login = raw.trim().trim_start_matches('@');
    let valid = !login.is_empty()
        && login.len() <= 39
        && login.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(login)
    } else {
        Err(ToolError::InvalidArguments(format!(
            "'{raw}' is not a GitHub username"
        )))
    }
}

fn repository_name(raw: &str) -> Result<&str, ToolError> {
    let name = raw.trim();
    let valid = match name.split_once('/') {
        Some((owner, repo)) => {
            github_login(owner).is_ok()
                && !repo.is_empty()
                && repo != "."
                && repo != ".."
                && repo
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        }
        None => false,
    };
    if valid {
        Ok(name)
    } else {
        Err(ToolError::InvalidArguments(format!(
            "'{raw}' is not an owner/name repository"
        )))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Web search (Exa)
// ────────────────────────────────────────────────────────────────────────────

struct WebSearchTool {
    client: Client,
    base_url: String,
    token: Secret,
    allowed_domains: Vec<String>,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "web_search",
            "Keyword web search over the allowed domains. Returns titles, URLs and page text.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "num_results": {"type": "integer", "minimum": 1, "maximum": MAX_SEARCH_RESULTS}
                },
                "required": ["query"]
            }),
        )
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let query = required_str(&args, "query")?;
        let num_results = args
            .get("num_results")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_SEARCH_RESULTS);
        let payload = search_payload(query, num_results, &self.allowed_domains);

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("x-api-key", self.token.expose())
            .header("User-Agent", USER_AGENT)
            .json(&payload)
            .timeout(TOOL_HTTP_TIMEOUT)
            .send()
            .await?;
        let body = read_json(response).await?;

        let results = body.get("results").cloned().unwrap_or(Value::Array(vec![]));
        Ok(pick_each(&results, SEARCH_RESULT_FIELDS).to_string())
    }
}

/// Exa `/search` body. The domain filter always comes from the capability,
/// never from the model.
fn search_payload(query: &str, num_results: u64, allowed_domains: &[String]) -> Value {
    json!({
        "query": query,
        "type": "keyword",
        "numResults": num_results.clamp(1, MAX_SEARCH_RESULTS),
        "includeDomains": allowed_domains,
        "contents": {"text": {"maxCharacters": SEARCH_TEXT_CHARS}}
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidArguments(format!("'{key}' is required")))
}

async fn read_json(response: reqwest::Response) -> Result<Value, ToolError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body);
        return Err(ToolError::Upstream {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}

/// Keeps only `fields` of a JSON object; missing fields are skipped.
fn pick(value: &Value, fields: &[&str]) -> Value {
    let mut out = Map::new();
    for field in fields {
        if let Some(v) = value.get(*field) {
            out.insert(field.to_string(), v.clone());
        }
    }
    Value::Object(out)
}

fn pick_each(value: &Value, fields: &[&str]) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|item| pick(item, fields)).collect()),
        other => pick(other, fields),
    }
}
