//! Environment variable interpolation for config files.
//!
//! Supports `${VAR}` (error if unset), `${VAR:-default}` (default when unset
//! or empty), and `$$` as an escape for a literal `$`.

use regex::Regex;
use std::env;
use std::sync::LazyLock;

static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("invalid interpolation pattern")
});

/// Result of environment variable interpolation.
#[derive(Debug)]
pub struct InterpolationResult {
    /// The interpolated text.
    pub text: String,
    /// Any errors encountered, accumulated so the user sees every missing
    /// variable at once.
    pub errors: Vec<String>,
}

impl InterpolationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Interpolate environment variables in the given text.
pub fn interpolate(input: &str) -> InterpolationResult {
    let mut errors = Vec::new();

    let text = VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            let full_match = caps.get(0).map(|m| m.as_str()).unwrap_or("");
            if full_match == "$$" {
                return "$".to_string();
            }

            let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let default = caps.get(2).map(|m| m.as_str());

            match env::var(name) {
                Ok(value) if !value.is_empty() => value,
                Ok(_) | Err(_) => match default {
                    Some(default) => default.to_string(),
                    None => {
                        errors.push(format!("environment variable '{name}' is not set"));
                        full_match.to_string()
                    }
                },
            }
        })
        .to_string();

    InterpolationResult { text, errors }
}
