//! Typed engine configuration (SPEC_FULL.md §10.3), deserialized by the
//! CLI the way the teacher's `project/manifest.rs` deserializes a project
//! manifest with `serde`+`toml`. The core interpreter only ever takes an
//! `EngineConfig` by value — it never reads environment variables or files
//! itself, keeping that contract boundary with the CLI.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interp::llm::DEFAULT_RETRY_LIMIT;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[cfg(feature = "cli")]
    #[error("malformed config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Endpoint and model name for a concrete `LLMProvider` (the `http`
/// feature's `HttpProvider`); absent when a program supplies its own
/// provider (e.g. `MockProvider` in tests).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_instructions: u64,
    pub max_call_stack: u32,
    pub retry_limit: u32,
    pub workspace_root: PathBuf,
    pub provider: Option<ProviderConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_instructions: 10_000,
            max_call_stack: 100,
            retry_limit: DEFAULT_RETRY_LIMIT,
            workspace_root: PathBuf::from("."),
            provider: None,
        }
    }
}

impl EngineConfig {
    /// Parses a TOML config document (gated behind `cli`, since `toml` is
    /// an optional dependency pulled in only for the CLI front end).
    #[cfg(feature = "cli")]
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    #[cfg(feature = "cli")]
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_interpreter_s_built_in_limits() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_instructions, 10_000);
        assert_eq!(cfg.max_call_stack, 100);
        assert_eq!(cfg.retry_limit, DEFAULT_RETRY_LIMIT);
        assert!(cfg.provider.is_none());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn partial_toml_document_fills_in_defaults() {
        let cfg = EngineConfig::from_toml_str("max_instructions = 500\n").unwrap();
        assert_eq!(cfg.max_instructions, 500);
        assert_eq!(cfg.max_call_stack, 100);
    }

    #[cfg(feature = "cli")]
    #[test]
    fn provider_block_parses() {
        let cfg = EngineConfig::from_toml_str(
            "[provider]\nendpoint = \"https://example.test/v1\"\nmodel = \"gpt-x\"\n",
        )
        .unwrap();
        let provider = cfg.provider.unwrap();
        assert_eq!(provider.endpoint, "https://example.test/v1");
        assert_eq!(provider.model, "gpt-x");
    }
}
