// System prompt assembly for agent invocations.
// Persona text comes from the Prompt Store; tool guidance is fixed here.

use chrono::{DateTime, Utc};

use crate::evaluation::request_builder::{CapabilityDescriptor, EvaluationRequest};
use crate::evaluation::Mode;

/// Default guidance for the `think` scratchpad.
pub const THINK_DEFAULT_INSTRUCTIONS: &str = "\
    Use the `think` tool as a scratchpad before acting or answering. \
    Record what you know, what is still missing and what to check next.";

/// Guidance for the `reason` / `analyze` tool pair.
pub const REASONING_INSTRUCTIONS: &str = "\
    Work through the evaluation step by step. \
    Call `reason` before each significant step with a short title, your thought and the next action. \
    Call `analyze` after a tool result to judge whether it changes your assessment. \
    Keep going until you have enough evidence, then write the final answer.";

pub const CODE_HOST_INSTRUCTIONS: &str = "\
    Use the `github_*` tools to read profiles and repositories. \
    Base every technical claim on data those tools returned.";

pub const MARKDOWN_INSTRUCTION: &str = "Use markdown to format your answers.";

/// Builds the system message for `request`. `now` is stamped into the
/// single-candidate prompt.
pub fn compose_system_prompt(request: &EvaluationRequest, now: DateTime<Utc>) -> String {
    let mut prompt = String::new();

    let description = request.description.trim();
    if !description.is_empty() {
        prompt.push_str(description);
        prompt.push_str("\n\n");
    }

    let instructions = request.instructions.trim();
    if !instructions.is_empty() {
        prompt.push_str("<instructions>\n");
        prompt.push_str(instructions);
        prompt.push_str("\n</instructions>\n\n");
    }

    let guidance: Vec<String> = request.capabilities.iter().map(tool_guidance).collect();
    if !guidance.is_empty() {
        prompt.push_str("<tool_guidance>\n");
        for line in &guidance {
            prompt.push_str("- ");
            prompt.push_str(line);
            prompt.push('\n');
        }
        prompt.push_str("</tool_guidance>\n\n");
    }

    prompt.push_str("<additional_information>\n- ");
    prompt.push_str(MARKDOWN_INSTRUCTION);
    prompt.push('\n');
    if request.mode == Mode::Single {
        prompt.push_str(&format!(
            "- The current time is {}.\n",
            now.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    prompt.push_str("</additional_information>");

    prompt
}

fn tool_guidance(capability: &CapabilityDescriptor) -> String {
    match capability {
        CapabilityDescriptor::Thinking { instructions } => instructions
            .clone()
            .unwrap_or_else(|| THINK_DEFAULT_INSTRUCTIONS.to_string()),
        CapabilityDescriptor::Reasoning => REASONING_INSTRUCTIONS.to_string(),
        CapabilityDescriptor::CodeHostAccess { .. } => CODE_HOST_INSTRUCTIONS.to_string(),
        CapabilityDescriptor::WebSearch {
            allowed_domains, ..
        } => format!(
            "`web_search` is a keyword search restricted to: {}.",
            allowed_domains.join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::request_builder::capabilities_for;
    use crate::session::{Secret, SessionConfig};
    use chrono::TimeZone;

    fn request(mode: Mode) -> EvaluationRequest {
        let session = SessionConfig {
            model_endpoint_key: Secret::new("nb-secret-key".to_string()),
            model_id: "m".to_string(),
            code_host_token: Secret::new("gh-secret-token".to_string()),
            search_api_token: Secret::new("exa-secret-token".to_string()),
        };
        EvaluationRequest {
            mode,
            task_text: "task".to_string(),
            description: "You are a strict reviewer.".to_string(),
            instructions: "Rank candidates.".to_string(),
            capabilities: capabilities_for(mode, &session),
            model_id: "m".to_string(),
            model_endpoint_key: Secret::new("nb-secret-key".to_string()),
            candidate_count: 1,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_prompt_contains_persona_and_instructions() {
        let prompt = compose_system_prompt(&request(Mode::Multi), fixed_now());
        assert!(prompt.starts_with("You are a strict reviewer."));
        assert!(prompt.contains("<instructions>\nRank candidates.\n</instructions>"));
        assert!(prompt.contains(MARKDOWN_INSTRUCTION));
    }

    #[test]
    fn test_multi_prompt_uses_strict_thinking_guidance_and_no_clock() {
        let prompt = compose_system_prompt(&request(Mode::Multi), fixed_now());
        assert!(prompt.contains("- Strict GitHub candidate evaluation\n"));
        assert!(!prompt.contains(THINK_DEFAULT_INSTRUCTIONS));
        assert!(prompt.contains("restricted to: github.com."));
        assert!(!prompt.contains("current time"));
    }

    #[test]
    fn test_single_prompt_has_default_thinking_domains_and_clock() {
        let prompt = compose_system_prompt(&request(Mode::Single), fixed_now());
        assert!(prompt.contains(THINK_DEFAULT_INSTRUCTIONS));
        assert!(prompt.contains("restricted to: linkedin.com, github.com."));
        assert!(prompt.contains("The current time is 2026-03-14 09:30:00 UTC."));
    }

    #[test]
    fn test_prompt_never_contains_credentials() {
        let prompt = compose_system_prompt(&request(Mode::Single), fixed_now());
        assert!(!prompt.contains("secret"));
    }
}
