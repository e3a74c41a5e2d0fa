//! LLM provider seam (spec §6.3): a blocking synchronous call returning a
//! single string, treated by the core as an opaque external collaborator.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// A `BehaviorExpr` evaluation, identified by its `tag`.
    Behavior,
    /// A named LLM function call.
    Function,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider transport error: {0}")]
    Transport(String),
    #[error("provider returned an empty response")]
    EmptyResponse,
}

/// Records the most recent provider exchange (§4.6 step: `last_call_info`).
#[derive(Debug, Clone)]
pub struct LastCallInfo {
    pub system: String,
    pub user: String,
    pub response: String,
    pub name: String,
    pub kind: CallKind,
}

pub trait LLMProvider {
    fn call(&mut self, system_prompt: &str, user_prompt: &str, scene: &str) -> Result<String, ProviderError>;
}

/// Deterministic provider for tests: replays a scripted queue of
/// responses, recording every prompt it was given.
#[derive(Default)]
pub struct MockProvider {
    pub responses: std::collections::VecDeque<String>,
    pub calls: Vec<(String, String, String)>,
}

impl MockProvider {
    pub fn new(responses: Vec<&str>) -> Self {
        MockProvider {
            responses: responses.into_iter().map(|s| s.to_string()).collect(),
            calls: Vec::new(),
        }
    }
}

impl LLMProvider for MockProvider {
    fn call(&mut self, system_prompt: &str, user_prompt: &str, scene: &str) -> Result<String, ProviderError> {
        self.calls
            .push((system_prompt.to_string(), user_prompt.to_string(), scene.to_string()));
        tracing::info!(target: "ibci::llm", scene, "provider call");
        tracing::trace!(target: "ibci::llm", system_prompt, user_prompt, "assembled prompt");
        self.responses.pop_front().ok_or(ProviderError::EmptyResponse)
    }
}

/// Concrete synchronous HTTP provider, gated behind the `http` feature so
/// the core stays provider-agnostic by default (§6.3).
#[cfg(feature = "http")]
pub mod http {
    use super::{LLMProvider, ProviderError};
    use serde::{Deserialize, Serialize};

    pub struct HttpProvider {
        endpoint: String,
        model: String,
        agent: ureq::Agent,
    }

    impl HttpProvider {
        pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
            HttpProvider {
                endpoint: endpoint.into(),
                model: model.into(),
                agent: ureq::Agent::new(),
            }
        }
    }

    #[derive(Serialize)]
    struct ChatRequest<'a> {
        model: &'a str,
        system: &'a str,
        user: &'a str,
    }

    #[derive(Deserialize)]
    struct ChatResponse {
        text: String,
    }

    impl LLMProvider for HttpProvider {
        fn call(&mut self, system_prompt: &str, user_prompt: &str, _scene: &str) -> Result<String, ProviderError> {
            let body = ChatRequest {
                model: &self.model,
                system: system_prompt,
                user: user_prompt,
            };
            let response: ChatResponse = self
                .agent
                .post(&self.endpoint)
                .send_json(&body)
                .map_err(|e| ProviderError::Transport(e.to_string()))?
                .into_json()
                .map_err(|e| ProviderError::Transport(e.to_string()))?;
            Ok(response.text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_provider_replays_scripted_responses_in_order() {
        let mut provider = MockProvider::new(vec!["1", "0"]);
        assert_eq!(provider.call("sys", "user", "BRANCH").unwrap(), "1");
        assert_eq!(provider.call("sys", "user", "BRANCH").unwrap(), "0");
    }

    #[test]
    fn mock_provider_records_calls() {
        let mut provider = MockProvider::new(vec!["ok"]);
        provider.call("sys-prompt", "user-prompt", "GENERAL").unwrap();
        assert_eq!(provider.calls.len(), 1);
        assert_eq!(provider.calls[0].0, "sys-prompt");
    }

    #[test]
    fn exhausted_mock_provider_errors() {
        let mut provider = MockProvider::new(vec![]);
        assert!(provider.call("s", "u", "GENERAL").is_err());
    }
}
