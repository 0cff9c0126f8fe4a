//! Service configuration
//!
//! Configuration is read from an optional TOML file. Secrets never live in
//! the file: each section names the environment variable that carries the
//! value, and the value is resolved at runtime. An unset or empty variable
//! means "not configured", which switches the service into its permissive
//! or mock behavior instead of failing.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default locations probed when no `--config` path is given
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["agent-modules.toml", "config/agent-modules.toml"];

/// Main service configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub database: DatabaseSection,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Shared-secret authentication settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSection {
    /// Environment variable containing the shared secret
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Request header carrying the presented credential
    #[serde(default = "default_auth_header")]
    pub header: String,
    /// Refuse to start when no shared secret is configured
    #[serde(default)]
    pub require_api_key: bool,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            header: default_auth_header(),
            require_api_key: false,
        }
    }
}

fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

fn default_auth_header() -> String {
    "x-api-key".to_string()
}

/// Language-model settings for the NLP module
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name ("openai" or "anthropic")
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable containing the provider API key
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
    /// System instruction sent ahead of the user's text
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Optional temperature (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Override for the provider's API root
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key_env: default_llm_api_key_env(),
            system_prompt: default_system_prompt(),
            max_tokens: default_max_tokens(),
            temperature: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant for NLP processing.".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_timeout_secs() -> u64 {
    60
}

/// Audit datastore settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseSection {
    /// Environment variable containing the connection string
    #[serde(default = "default_database_url_env")]
    pub url_env: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url_env: default_database_url_env(),
        }
    }
}

fn default_database_url_env() -> String {
    "DATABASE_URL".to_string()
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ServiceConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "server.port must be non-zero".to_string(),
            ));
        }

        if self.auth.header.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "auth.header must not be empty".to_string(),
            ));
        }

        match self.llm.provider.as_str() {
            "openai" | "anthropic" => {}
            other => {
                return Err(ConfigError::InvalidConfig(format!(
                    "Unsupported LLM provider: {other}"
                )))
            }
        }

        if let Some(base_url) = &self.llm.base_url {
            url::Url::parse(base_url).map_err(|e| {
                ConfigError::InvalidConfig(format!("llm.base_url '{base_url}' is not a URL: {e}"))
            })?;
        }

        Ok(())
    }

    /// Helper method to read an environment variable, treating empty as unset
    fn get_env_var_optional(env_var_name: &str) -> Option<String> {
        std::env::var(env_var_name)
            .ok()
            .filter(|value| !value.is_empty())
    }

    /// Shared secret expected on authenticated routes
    pub fn get_api_key(&self) -> Option<String> {
        Self::get_env_var_optional(&self.auth.api_key_env)
    }

    /// Language-model provider API key
    pub fn get_llm_api_key(&self) -> Option<String> {
        Self::get_env_var_optional(&self.llm.api_key_env)
    }

    /// Audit datastore connection string
    pub fn get_database_url(&self) -> Option<String> {
        Self::get_env_var_optional(&self.database.url_env)
    }

    /// Shared secret, failing when `require_api_key` is set and none is present
    pub fn resolve_api_key(&self) -> Result<Option<String>, ConfigError> {
        match self.get_api_key() {
            Some(key) => Ok(Some(key)),
            None if self.auth.require_api_key => {
                Err(ConfigError::EnvVarNotFound(self.auth.api_key_env.clone()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ServiceConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.header, "x-api-key");
        assert_eq!(config.auth.api_key_env, "API_KEY");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_tokens, 1000);
        assert_eq!(config.database.url_env, "DATABASE_URL");
    }

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[server]
host = "127.0.0.1"
port = 9000

[auth]
api_key_env = "MODULES_API_KEY"
header = "x-service-key"
require_api_key = true

[llm]
provider = "anthropic"
model = "claude-3-5-haiku-20241022"
api_key_env = "ANTHROPIC_API_KEY"
system_prompt = "Summarize."
max_tokens = 256
temperature = 0.2
base_url = "http://localhost:9999/v1"
timeout_secs = 5

[database]
url_env = "AUDIT_DATABASE_URL"
"#;

        let config = ServiceConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert!(config.auth.require_api_key);
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.temperature, Some(0.2));
        assert_eq!(config.llm.timeout_secs, 5);
        assert_eq!(config.database.url_env, "AUDIT_DATABASE_URL");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let result = ServiceConfig::from_toml_str("[llm]\nprovider = \"cohere\"\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let result = ServiceConfig::from_toml_str("[llm]\nbase_url = \"not a url\"\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_port_rejected() {
        let result = ServiceConfig::from_toml_str("[server]\nport = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_env_value_is_absent() {
        let mut config = ServiceConfig::default();
        config.auth.api_key_env = "AGENT_MODULES_TEST_EMPTY_KEY".to_string();
        std::env::set_var("AGENT_MODULES_TEST_EMPTY_KEY", "");
        assert_eq!(config.get_api_key(), None);
        std::env::remove_var("AGENT_MODULES_TEST_EMPTY_KEY");
    }

    #[test]
    fn test_required_api_key_missing() {
        let mut config = ServiceConfig::default();
        config.auth.api_key_env = "AGENT_MODULES_TEST_MISSING_KEY".to_string();
        config.auth.require_api_key = true;
        assert!(matches!(
            config.resolve_api_key(),
            Err(ConfigError::EnvVarNotFound(_))
        ));

        config.auth.require_api_key = false;
        assert_eq!(config.resolve_api_key().unwrap(), None);
    }
}
