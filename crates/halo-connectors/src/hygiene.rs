//! Credential hygiene checks.
//!
//! Pure functions that detect placeholder credential values in a
//! connector's environment and argument strings. No I/O: used at the
//! configuration boundary to auto-disable unusable entries, by the
//! readiness classifier, and at activation time to reject a connector
//! with the list of missing keys.

use std::sync::LazyLock;

use halo_core::ConnectorConfig;
use regex::Regex;

/// Patterns that indicate a placeholder/unset credential value.
static PLACEHOLDER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^\$\{.+\}$",     // ${VARIABLE_NAME} (shell variable syntax, not expanded)
        r"(?i)^YOUR_",     // YOUR_API_KEY_HERE
        r"(?i)^REPLACE_",  // REPLACE_WITH_YOUR_KEY
        r"(?i)^TODO",      // TODO_SET_THIS
        r"(?i)^xxx",       // xxx placeholder
        r"(?i)^sk-xxx",    // sk-xxx... placeholder API key
        r"(?i)^change.?me", // changeme
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap_or_else(|e| unreachable!("bad placeholder pattern: {e}")))
    .collect()
});

/// Unexpanded `${VAR}` argument values.
static UNEXPANDED_ARG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{.+\}$").unwrap_or_else(|e| unreachable!("bad arg pattern: {e}"))
});

fn is_placeholder(value: &str) -> bool {
    PLACEHOLDER_PATTERNS.iter().any(|p| p.is_match(value))
}

/// Whether a connector config carries placeholder values that won't work.
///
/// Checks every env value, and args for unexpanded `${VAR}` syntax (e.g. a
/// postgres connector with `${DATABASE_URL}` passed as an argument).
#[must_use]
pub fn has_placeholder_values(config: &ConnectorConfig) -> bool {
    if config.env.values().any(|v| is_placeholder(v)) {
        return true;
    }
    config.args.iter().any(|a| UNEXPANDED_ARG.is_match(a))
}

/// Names of env vars holding placeholder values, sorted for stable output.
#[must_use]
pub fn placeholder_env_keys(config: &ConnectorConfig) -> Vec<String> {
    let mut keys: Vec<String> = config
        .env
        .iter()
        .filter(|(_, value)| is_placeholder(value))
        .map(|(key, _)| key.clone())
        .collect();
    keys.sort();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_env_values_detected() {
        for value in [
            "${GITHUB_TOKEN}",
            "YOUR_API_KEY_HERE",
            "your_key",
            "REPLACE_WITH_YOUR_KEY",
            "TODO_SET_THIS",
            "xxx",
            "sk-xxxxxxxx",
            "changeme",
            "change-me",
            "CHANGEME",
        ] {
            let config = ConnectorConfig::process("npx").with_env("API_KEY", value);
            assert!(has_placeholder_values(&config), "{value} should be flagged");
        }
    }

    #[test]
    fn test_real_values_pass() {
        let config = ConnectorConfig::process("npx")
            .with_env("API_KEY", "sk-live-4242")
            .with_env("REGION", "eu-west-1");
        assert!(!has_placeholder_values(&config));
        assert!(placeholder_env_keys(&config).is_empty());
    }

    #[test]
    fn test_unexpanded_arg_flags_config_but_not_keys() {
        let config =
            ConnectorConfig::process("npx").with_args(["-y", "server-postgres", "${DATABASE_URL}"]);
        assert!(has_placeholder_values(&config));
        // The offending value is an arg, not an env var.
        assert!(placeholder_env_keys(&config).is_empty());
    }

    #[test]
    fn test_offending_keys_sorted() {
        let config = ConnectorConfig::process("npx")
            .with_env("ZULU_KEY", "YOUR_ZULU")
            .with_env("ALPHA_KEY", "YOUR_ALPHA")
            .with_env("OK", "fine");
        assert_eq!(placeholder_env_keys(&config), vec!["ALPHA_KEY", "ZULU_KEY"]);
    }

    #[test]
    fn test_expanded_variable_is_not_a_placeholder() {
        // A value that merely contains ${...} mid-string was expanded enough
        // to not match the anchored pattern.
        let config = ConnectorConfig::process("npx").with_env("URL", "postgres://u:p@host/db");
        assert!(!has_placeholder_values(&config));
    }
}
