//! `${VAR}` and `${VAR:-default}` expansion in configuration strings.

use crate::ConfigError;

struct MissingVar(String);

/// Expand environment references in `value`.
///
/// Only the braced forms are recognized; a bare `$VAR` is left alone.
/// `field` names the setting in error messages.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    let lookup = |name: &str| -> Result<Option<String>, MissingVar> {
        std::env::var(name)
            .map(Some)
            .map_err(|_| MissingVar(name.to_owned()))
    };

    match shellexpand::env_with_context(value, lookup) {
        Ok(expanded) => Ok(expanded.into_owned()),
        Err(err) => Err(ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} is not set", err.cause.0),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_value_passes_through() {
        assert_eq!(expand_env("127.0.0.1", "server.host").unwrap(), "127.0.0.1");
        assert_eq!(expand_env("$HOME", "server.host").unwrap(), "$HOME");
    }

    #[test]
    fn test_set_variable() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("LIVESERVE_TEST_HOST", "0.0.0.0");
        }
        assert_eq!(
            expand_env("${LIVESERVE_TEST_HOST}", "server.host").unwrap(),
            "0.0.0.0"
        );
        unsafe {
            std::env::remove_var("LIVESERVE_TEST_HOST");
        }
    }

    #[test]
    fn test_default_for_unset_variable() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::remove_var("LIVESERVE_TEST_UNSET");
        }
        assert_eq!(
            expand_env("${LIVESERVE_TEST_UNSET:-public}/site", "site.root").unwrap(),
            "public/site"
        );
    }

    #[test]
    fn test_unset_variable_names_field() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::remove_var("LIVESERVE_TEST_MISSING");
        }
        let err = expand_env("${LIVESERVE_TEST_MISSING}", "site.root").unwrap_err();

        assert!(matches!(err, ConfigError::EnvVar { .. }));
        let message = err.to_string();
        assert!(message.contains("site.root"));
        assert!(message.contains("LIVESERVE_TEST_MISSING"));
    }
}
