// Candidate evaluation: request building, stream rendering, score extraction.
// The agent runtime itself sits behind crate::agent; nothing here talks to the network.

pub mod handlers;
pub mod prompts;
pub mod renderer;
pub mod request_builder;
pub mod score;

use std::fmt;

use serde::{Deserialize, Serialize};

/// The two fixed operating configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Rank several GitHub users against one role.
    Multi,
    /// Deep-dive one candidate, optionally with a LinkedIn profile.
    Single,
}

impl Mode {
    /// Agent name reported in logs.
    pub fn agent_name(self) -> &'static str {
        match self {
            Mode::Multi => "CandilyzerMulti",
            Mode::Single => "CandilyzerSingle",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Multi => f.write_str("multi"),
            Mode::Single => f.write_str("single"),
        }
    }
}
