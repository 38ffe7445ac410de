//! Prompt Store: the description/instructions pair for each mode, loaded once
//! at startup from a TOML file.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::evaluation::Mode;

/// Thinking-tool guidance used in multi-candidate mode.
pub const MULTI_THINKING_INSTRUCTIONS: &str = "Strict GitHub candidate evaluation";

#[derive(Debug, Error)]
pub enum PromptStoreError {
    #[error("failed to read prompt file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("malformed prompt file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Agent persona text for one mode. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeDescriptor {
    pub description: String,
    pub instructions: String,
}

/// On-disk layout. Every key is required.
#[derive(Debug, Deserialize)]
struct PromptFile {
    description_for_multi_candidates: String,
    instructions_for_multi_candidates: String,
    description_for_single_candidate: String,
    instructions_for_single_candidate: String,
}

#[derive(Debug, Clone)]
pub struct PromptStore {
    multi: ModeDescriptor,
    single: ModeDescriptor,
}

impl PromptStore {
    pub fn new(multi: ModeDescriptor, single: ModeDescriptor) -> Self {
        Self { multi, single }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PromptStoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| PromptStoreError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| PromptStoreError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        let file: PromptFile = toml::from_str(raw)?;
        Ok(Self::new(
            ModeDescriptor {
                description: file.description_for_multi_candidates,
                instructions: file.instructions_for_multi_candidates,
            },
            ModeDescriptor {
                description: file.description_for_single_candidate,
                instructions: file.instructions_for_single_candidate,
            },
        ))
    }

    pub fn for_mode(&self, mode: Mode) -> &ModeDescriptor {
        match mode {
            Mode::Multi => &self.multi,
            Mode::Single => &self.single,
        }
    }
}
