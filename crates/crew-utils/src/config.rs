//! Environment-backed configuration helpers
//!
//! Configuration is read once at startup from the process environment (after
//! an optional `.env` file has been merged into it) and handed to the rest of
//! the program as plain structs. Nothing here keeps global state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while assembling configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is absent or blank
    #[error("missing required setting: {}", .names.join(" or "))]
    Missing {
        /// Accepted variable names, in lookup order
        names: Vec<String>,
    },

    /// A variable is present but cannot be parsed
    #[error("invalid value for {name}: {detail}")]
    Invalid { name: String, detail: String },

    /// The `.env` file exists but is malformed
    #[error("failed to load .env file: {0}")]
    DotEnv(String),
}

/// A source of string settings
///
/// The process environment is the production source; tests use a `HashMap`.
pub trait EnvSource {
    /// Look up a raw value
    fn var(&self, key: &str) -> Option<String>;

    /// First non-blank value among `names`
    fn first_of(&self, names: &[&str]) -> Option<String> {
        names
            .iter()
            .filter_map(|name| self.var(name))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    }

    /// First non-blank value among `names`, or [`ConfigError::Missing`]
    fn required(&self, names: &[&str]) -> Result<String, ConfigError> {
        self.first_of(names).ok_or_else(|| ConfigError::Missing {
            names: names.iter().map(ToString::to_string).collect(),
        })
    }

    /// Parse an optional value, `Ok(None)` when absent
    fn parsed<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.first_of(&[name]) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|e| ConfigError::Invalid {
                name: name.to_string(),
                detail: e.to_string(),
            }),
        }
    }
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Merge a `.env` file from the working directory (or a parent) into the
/// process environment
///
/// Variables that are already set are left untouched. A missing file is not
/// an error; a malformed one is.
pub fn load_dotenv() -> Result<Option<PathBuf>, ConfigError> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "Loaded .env file");
            Ok(Some(path))
        }
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(ConfigError::DotEnv(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_required_uses_first_present_name() {
        let env = source(&[("OPEN_API_KEY", "legacy"), ("OPENAI_API_KEY", "primary")]);
        assert_eq!(
            env.required(&["OPENAI_API_KEY", "OPEN_API_KEY"]).unwrap(),
            "primary"
        );

        let env = source(&[("OPEN_API_KEY", "legacy")]);
        assert_eq!(
            env.required(&["OPENAI_API_KEY", "OPEN_API_KEY"]).unwrap(),
            "legacy"
        );
    }

    #[test]
    fn test_blank_counts_as_missing() {
        let env = source(&[("OPENAI_API_KEY", "   ")]);
        let err = env.required(&["OPENAI_API_KEY", "OPEN_API_KEY"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required setting: OPENAI_API_KEY or OPEN_API_KEY"
        );
    }

    #[test]
    fn test_parsed() {
        let env = source(&[("COUNT", "12"), ("BAD", "twelve")]);
        assert_eq!(env.parsed::<u32>("COUNT").unwrap(), Some(12));
        assert_eq!(env.parsed::<u32>("ABSENT").unwrap(), None);
        assert!(matches!(
            env.parsed::<u32>("BAD"),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
