use once_cell::sync::Lazy;
use opschat_core::{AgentError, Result};
use regex::Regex;
use std::env;

// Matches ${VAR} and ${VAR:-default}
static ENV_VAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("Invalid regex pattern")
});

/// Substitutes environment variable references in raw config text before it
/// is parsed. Variables without a value and without a `:-default` fallback
/// are collected into a single error.
pub fn substitute_env_text(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let mut missing_vars = Vec::new();

    for cap in ENV_VAR_REGEX.captures_iter(input) {
        let full_match = &cap[0];
        let var_name = &cap[1];
        let default_value = cap.get(2).map(|m| m.as_str());

        match env::var(var_name) {
            Ok(value) => {
                result = result.replace(full_match, &value);
            }
            Err(_) => {
                if let Some(default) = default_value {
                    result = result.replace(full_match, default);
                } else {
                    missing_vars.push(var_name.to_string());
                }
            }
        }
    }

    if !missing_vars.is_empty() {
        return Err(AgentError::ConfigError(format!(
            "Missing required environment variables: {}. Please set these variables before loading the configuration.",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_set_variable() {
        env::set_var("OPSCHAT_TEST_URL", "http://localhost:9090");

        let text = "url: ${OPSCHAT_TEST_URL}/mcp";
        assert_eq!(
            substitute_env_text(text).unwrap(),
            "url: http://localhost:9090/mcp"
        );

        env::remove_var("OPSCHAT_TEST_URL");
    }

    #[test]
    fn test_falls_back_to_default() {
        let text = "key: ${OPSCHAT_TEST_UNSET:-fallback-value}";
        assert_eq!(substitute_env_text(text).unwrap(), "key: fallback-value");
    }

    #[test]
    fn test_missing_variable_errors() {
        let err = substitute_env_text("key: ${OPSCHAT_TEST_DEFINITELY_UNSET}").unwrap_err();
        assert!(err.to_string().contains("OPSCHAT_TEST_DEFINITELY_UNSET"));
    }

    #[test]
    fn test_plain_text_untouched() {
        let text = "model: gpt-4o\ntemperature: 0.2";
        assert_eq!(substitute_env_text(text).unwrap(), text);
    }
}
