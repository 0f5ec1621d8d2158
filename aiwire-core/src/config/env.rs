//! Environment variable interpolation for configuration files

use super::error::ConfigError;
use regex::Regex;
use std::env;

/// Replace every `${VAR_NAME}` placeholder with the variable's value.
///
/// The first placeholder whose variable is unset fails the whole load; a
/// half-interpolated config is worse than none.
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    let pattern = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid placeholder pattern");
    let mut result = content.to_string();

    for capture in pattern.captures_iter(content) {
        let placeholder = capture.get(0).expect("whole match").as_str();
        let var_name = &capture[1];

        match env::var(var_name) {
            Ok(value) => {
                result = result.replace(placeholder, &value);
            }
            Err(_) => {
                return Err(ConfigError::EnvVarNotFound {
                    var: var_name.to_string(),
                });
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_present_variables() {
        env::set_var("AIWIRE_TEST_KEY", "sk-test");
        let result = interpolate_env_vars("api_key: ${AIWIRE_TEST_KEY}").unwrap();
        assert_eq!(result, "api_key: sk-test");
        env::remove_var("AIWIRE_TEST_KEY");
    }

    #[test]
    fn missing_variable_names_the_variable() {
        let result = interpolate_env_vars("api_key: ${AIWIRE_DEFINITELY_MISSING}");
        match result {
            Err(ConfigError::EnvVarNotFound { var }) => {
                assert_eq!(var, "AIWIRE_DEFINITELY_MISSING");
            }
            other => panic!("expected EnvVarNotFound, got {other:?}"),
        }
    }

    #[test]
    fn interpolates_multiple_variables() {
        env::set_var("AIWIRE_TEST_A", "one");
        env::set_var("AIWIRE_TEST_B", "two");
        let result = interpolate_env_vars("a: ${AIWIRE_TEST_A}, b: ${AIWIRE_TEST_B}").unwrap();
        assert_eq!(result, "a: one, b: two");
        env::remove_var("AIWIRE_TEST_A");
        env::remove_var("AIWIRE_TEST_B");
    }
}
