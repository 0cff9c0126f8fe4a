//! LLM provider abstraction layer
//!
//! This module provides a provider-agnostic interface for the hosted
//! language model used by the NLP module (OpenAI, Anthropic).

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;

use crate::config::LlmSection;
use std::sync::Arc;
use std::time::Duration;

/// Provider factory for creating LLM providers from configuration
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Build the configured provider around an already-resolved API key
    pub fn create_provider(
        section: &LlmSection,
        api_key: String,
    ) -> Result<Arc<dyn LlmProvider>, LlmError> {
        let timeout = Duration::from_secs(section.timeout_secs);

        match section.provider.as_str() {
            "openai" => {
                let mut config = OpenAiConfig {
                    api_key,
                    timeout,
                    ..Default::default()
                };
                if let Some(base_url) = &section.base_url {
                    config.base_url = base_url.trim_end_matches('/').to_string();
                }
                Ok(Arc::new(OpenAiProvider::new(config)?))
            }
            "anthropic" => {
                let mut config = AnthropicConfig {
                    api_key,
                    timeout,
                    ..Default::default()
                };
                if let Some(base_url) = &section.base_url {
                    config.base_url = base_url.trim_end_matches('/').to_string();
                }
                Ok(Arc::new(AnthropicProvider::new(config)?))
            }
            provider => Err(LlmError::NotConfigured(format!(
                "Unsupported LLM provider: {provider}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_configured_provider() {
        let mut section = LlmSection::default();
        let provider = LlmProviderFactory::create_provider(&section, "k".to_string()).unwrap();
        assert_eq!(provider.name(), "openai");

        section.provider = "anthropic".to_string();
        let provider = LlmProviderFactory::create_provider(&section, "k".to_string()).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let section = LlmSection {
            provider: "cohere".to_string(),
            ..Default::default()
        };
        let result = LlmProviderFactory::create_provider(&section, "k".to_string());
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));
    }

    #[test]
    fn test_factory_rejects_empty_key() {
        let section = LlmSection::default();
        let result = LlmProviderFactory::create_provider(&section, String::new());
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));
    }
}
