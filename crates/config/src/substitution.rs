//! `${VAR}` environment substitution applied to raw config text before parse.

use crate::ConfigError;
use regex::Regex;
use std::env;

/// Substitute environment variables in the format `${VAR_NAME}`.
///
/// Unset variables keep their placeholder; the validator reports them later
/// so a single pass surfaces every missing variable instead of the first.
pub fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{(\w+)\}").expect("static regex");
    let mut result = content.to_string();

    for caps in re.captures_iter(content) {
        let var_name = caps.get(1).expect("capture group").as_str();
        let placeholder = caps.get(0).expect("full match").as_str();

        if let Ok(value) = env::var(var_name) {
            tracing::debug!(var = var_name, "substituting environment variable");
            result = result.replace(placeholder, &value);
        } else {
            tracing::warn!(var = var_name, "environment variable not set");
        }
    }

    Ok(result)
}

/// Check if a string still contains unresolved `${VAR}` placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    let re = Regex::new(r"\$\{(\w+)\}").expect("static regex");
    re.is_match(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_set_variable() {
        env::set_var("AURUM_TEST_SUB_KEY", "secret-value");
        let out = substitute_env_vars("api_key: ${AURUM_TEST_SUB_KEY}").unwrap();
        assert_eq!(out, "api_key: secret-value");
        env::remove_var("AURUM_TEST_SUB_KEY");
    }

    #[test]
    fn test_keeps_placeholder_for_unset_variable() {
        env::remove_var("AURUM_TEST_MISSING_KEY");
        let out = substitute_env_vars("api_key: ${AURUM_TEST_MISSING_KEY}").unwrap();
        assert!(has_unresolved_env_vars(&out));
    }

    #[test]
    fn test_plain_text_untouched() {
        let input = "base_url: https://api.metals.dev/v1";
        assert_eq!(substitute_env_vars(input).unwrap(), input);
        assert!(!has_unresolved_env_vars(input));
    }
}
