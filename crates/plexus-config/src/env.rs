use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Expand `{{ env.VAR }}` placeholders in raw TOML text
///
/// An optional fallback is supported via `{{ env.VAR | default("value") }}`.
/// Expansion happens before deserialization so config structs hold plain
/// `String`/`SecretString` values. TOML comment lines are left untouched,
/// which keeps commented-out secrets from failing the load.
pub fn expand_env(input: &str) -> Result<String, String> {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let re = PLACEHOLDER.get_or_init(|| {
        // Group 1: variable name, group 2: optional default value
        Regex::new(r#"\{\{\s*env\.([A-Za-z0-9_]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
            .expect("placeholder pattern is valid")
    });

    let mut failure: Option<String> = None;
    let mut output = String::with_capacity(input.len());

    for (i, line) in input.lines().enumerate() {
        if i > 0 {
            output.push('\n');
        }

        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let expanded = re.replace_all(line, |caps: &Captures<'_>| {
            let var = &caps[1];
            match std::env::var(var) {
                Ok(value) => value,
                Err(_) => match caps.get(2) {
                    Some(default) => default.as_str().to_owned(),
                    None => {
                        failure.get_or_insert_with(|| format!("environment variable not set: `{var}`"));
                        String::new()
                    }
                },
            }
        });
        output.push_str(&expanded);
    }

    if input.ends_with('\n') {
        output.push('\n');
    }

    match failure {
        Some(message) => Err(message),
        None => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_unchanged() {
        let input = "listen_address = \"0.0.0.0:3000\"";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn expands_set_variable() {
        temp_env::with_var("PLEXUS_TEST_KEY", Some("sk-123"), || {
            let out = expand_env("api_key = \"{{ env.PLEXUS_TEST_KEY }}\"").unwrap();
            assert_eq!(out, "api_key = \"sk-123\"");
        });
    }

    #[test]
    fn missing_variable_is_an_error() {
        temp_env::with_var_unset("PLEXUS_MISSING", || {
            let err = expand_env("api_key = \"{{ env.PLEXUS_MISSING }}\"").unwrap_err();
            assert!(err.contains("PLEXUS_MISSING"));
        });
    }

    #[test]
    fn default_applies_when_unset() {
        temp_env::with_var_unset("PLEXUS_OPTIONAL", || {
            let out = expand_env("base = \"{{ env.PLEXUS_OPTIONAL | default(\"none\") }}\"").unwrap();
            assert_eq!(out, "base = \"none\"");
        });
    }

    #[test]
    fn default_ignored_when_set() {
        temp_env::with_var("PLEXUS_OPTIONAL", Some("real"), || {
            let out = expand_env("base = \"{{ env.PLEXUS_OPTIONAL | default(\"none\") }}\"").unwrap();
            assert_eq!(out, "base = \"real\"");
        });
    }

    #[test]
    fn comment_lines_skip_expansion() {
        temp_env::with_var_unset("PLEXUS_MISSING", || {
            let input = "# api_key = \"{{ env.PLEXUS_MISSING }}\"";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }
}
