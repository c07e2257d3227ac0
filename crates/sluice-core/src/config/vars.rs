//! Environment variable interpolation for config files.
//!
//! Bucket names, project ids and credential paths usually differ per
//! deployment, so config files may reference the environment:
//! - `$VAR` or `${VAR}` - substitute with env var value, error if missing
//! - `${VAR:-default}` - use default if VAR is unset OR empty
//! - `${VAR-default}` - use default only if VAR is unset (empty is OK)
//! - `$$` - literal `$`

use regex::{Captures, Regex};
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?P<escape>\$\$)
        |
        \$\{
            (?P<braced>[A-Za-z_][A-Za-z0-9_]*)
            (?:(?P<op>:?-)(?P<default>[^}]*))?
        \}
        |
        \$(?P<bare>[A-Za-z_][A-Za-z0-9_]*)
        ",
    )
    .expect("env var pattern is valid")
});

/// Result of environment variable interpolation.
#[derive(Debug)]
pub struct InterpolationResult {
    /// The interpolated text.
    pub text: String,
    /// Every problem found, so all missing variables are reported together.
    pub errors: Vec<String>,
}

impl InterpolationResult {
    /// Returns true if there were no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Interpolate environment variables from the process environment.
pub fn interpolate(input: &str) -> InterpolationResult {
    interpolate_with(input, |name| std::env::var(name).ok())
}

/// Interpolate using an arbitrary variable lookup.
pub fn interpolate_with<F>(input: &str, lookup: F) -> InterpolationResult
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN
        .replace_all(input, |caps: &Captures| {
            if caps.name("escape").is_some() {
                return "$".to_string();
            }

            let original = &caps[0];
            let Some(name) = caps.name("braced").or_else(|| caps.name("bare")) else {
                return original.to_string();
            };
            let name = name.as_str();
            let default = caps.name("default").map(|m| m.as_str());
            let empty_uses_default = caps.name("op").is_some_and(|m| m.as_str() == ":-");

            match lookup(name) {
                Some(value) if value.contains(['\n', '\r']) => {
                    errors.push(format!(
                        "environment variable '{name}' contains newlines, which is not allowed"
                    ));
                    original.to_string()
                }
                Some(value) if value.is_empty() && empty_uses_default => {
                    default.unwrap_or_default().to_string()
                }
                Some(value) => value,
                None => match default {
                    Some(default) => default.to_string(),
                    None => {
                        errors.push(format!("environment variable '{name}' is not set"));
                        original.to_string()
                    }
                },
            }
        })
        .into_owned();

    InterpolationResult { text, errors }
}
