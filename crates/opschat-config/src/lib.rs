use opschat_core::{AgentError, Result};
use opschat_limits::PageLimits;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

mod env_substitution;

pub use env_substitution::substitute_env_text;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub llm: LlmSettings,
    pub providers: Vec<ProviderSettings>,
    #[serde(default = "default_primary_provider")]
    pub primary_provider: String,
    #[serde(default)]
    pub memory: MemorySettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub pagination: PageLimits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

/// One remote tool provider. The id doubles as the namespace prefix for
/// every provider except the primary one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub id: String,
    pub url: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

/// Session memory bounds. Zero means the built-in default; negative means
/// unlimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    #[serde(default = "default_max_messages")]
    pub max_messages: i64,
    #[serde(default = "default_max_characters")]
    pub max_characters: i64,
}

/// Tool invocation rate limit. Non-positive rate or burst disables limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_rate_per_second")]
    pub per_second: f64,
    #[serde(default = "default_rate_burst")]
    pub burst: i64,
}

impl Settings {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AgentError::ConfigError(format!("Failed to read config file: {}", e)))?;
        Self::from_str(&content)
    }

    pub fn from_str(yaml: &str) -> Result<Self> {
        let expanded = substitute_env_text(yaml)?;

        let settings: Settings = serde_yaml::from_str(&expanded)
            .map_err(|e| AgentError::ConfigError(format!("Failed to parse YAML: {}", e)))?;

        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.llm.base_url.is_empty() {
            return Err(AgentError::ConfigError("LLM base URL is required".into()));
        }
        if self.llm.api_key.is_empty() {
            return Err(AgentError::ConfigError("LLM API key is required".into()));
        }
        if self.llm.model.is_empty() {
            return Err(AgentError::ConfigError("LLM model cannot be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(AgentError::ConfigError(
                "Temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.providers.is_empty() {
            return Err(AgentError::ConfigError(
                "At least one tool provider must be configured".into(),
            ));
        }
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.id.is_empty() {
                return Err(AgentError::ConfigError("Provider id cannot be empty".into()));
            }
            if provider.url.is_empty() {
                return Err(AgentError::ConfigError(format!(
                    "Provider '{}' has no URL",
                    provider.id
                )));
            }
            if !seen.insert(provider.id.as_str()) {
                return Err(AgentError::ConfigError(format!(
                    "Duplicate provider id '{}'",
                    provider.id
                )));
            }
        }

        if self.pagination.max_count < 1 {
            return Err(AgentError::ConfigError(
                "pagination max_count must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            max_characters: default_max_characters(),
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            per_second: default_rate_per_second(),
            burst: default_rate_burst(),
        }
    }
}

fn default_primary_provider() -> String {
    "grafana".to_string()
}
fn default_model() -> String {
    "gpt-4o".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_llm_timeout() -> u64 {
    120
}
fn default_provider_timeout() -> u64 {
    30
}
fn default_max_messages() -> i64 {
    100
}
fn default_max_characters() -> i64 {
    100_000
}
fn default_rate_per_second() -> f64 {
    5.0
}
fn default_rate_burst() -> i64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_settings() {
        let yaml = r#"
llm:
  base_url: http://llm-gateway:4000
  api_key: sk-test
  model: gpt-4o
  temperature: 0.3

providers:
  - id: grafana
    url: http://grafana-mcp:8000/mcp
    timeout_secs: 45
  - id: alertmanager
    url: http://alertmanager-mcp:8080/mcp

rate_limit:
  per_second: 2.5
  burst: 4
"#;

        let settings = Settings::from_str(yaml).unwrap();
        assert_eq!(settings.llm.model, "gpt-4o");
        assert_eq!(settings.llm.temperature, 0.3);
        assert_eq!(settings.providers.len(), 2);
        assert_eq!(settings.providers[0].timeout_secs, 45);
        assert_eq!(settings.providers[1].timeout_secs, 30);
        assert_eq!(settings.primary_provider, "grafana");
        assert_eq!(settings.rate_limit.per_second, 2.5);
        assert_eq!(settings.rate_limit.burst, 4);
    }

    #[test]
    fn test_defaults_applied_when_blocks_omitted() {
        let yaml = r#"
llm:
  base_url: http://llm-gateway:4000
  api_key: sk-test

providers:
  - id: grafana
    url: http://grafana-mcp:8000/mcp
"#;

        let settings = Settings::from_str(yaml).unwrap();
        assert_eq!(settings.llm.model, "gpt-4o");
        assert_eq!(settings.memory.max_messages, 100);
        assert_eq!(settings.memory.max_characters, 100_000);
        assert_eq!(settings.rate_limit.per_second, 5.0);
        assert_eq!(settings.rate_limit.burst, 10);
        assert_eq!(settings.pagination.default_count, 10);
        assert_eq!(settings.pagination.max_count, 50);
    }

    #[test]
    fn test_env_substitution_in_settings() {
        std::env::set_var("OPSCHAT_TEST_KEY", "sk-from-env");

        let yaml = r#"
llm:
  base_url: http://llm-gateway:4000
  api_key: ${OPSCHAT_TEST_KEY}

providers:
  - id: grafana
    url: ${OPSCHAT_TEST_GRAFANA_URL:-http://localhost:8000/mcp}
"#;

        let settings = Settings::from_str(yaml).unwrap();
        assert_eq!(settings.llm.api_key, "sk-from-env");
        assert_eq!(settings.providers[0].url, "http://localhost:8000/mcp");

        std::env::remove_var("OPSCHAT_TEST_KEY");
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let yaml = r#"
llm:
  base_url: http://llm-gateway:4000
  api_key: ""

providers:
  - id: grafana
    url: http://localhost:8000/mcp
"#;

        assert!(Settings::from_str(yaml).is_err());
    }

    #[test]
    fn test_empty_provider_list_rejected() {
        let yaml = r#"
llm:
  base_url: http://llm-gateway:4000
  api_key: sk-test

providers: []
"#;

        let err = Settings::from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("At least one tool provider"));
    }

    #[test]
    fn test_duplicate_provider_ids_rejected() {
        let yaml = r#"
llm:
  base_url: http://llm-gateway:4000
  api_key: sk-test

providers:
  - id: grafana
    url: http://a:8000/mcp
  - id: grafana
    url: http://b:8000/mcp
"#;

        let err = Settings::from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("Duplicate provider id"));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
llm:
  base_url: http://llm-gateway:4000
  api_key: sk-test

providers:
  - id: grafana
    url: http://localhost:8000/mcp
"#
        )
        .unwrap();

        let settings = Settings::from_yaml(file.path()).unwrap();
        assert_eq!(settings.providers[0].id, "grafana");
    }
}
