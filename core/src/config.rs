//! Configuration for Strata
//!
//! Values come from a YAML file (with `${VAR:-default}` substitution) or from
//! `STRATA__*` environment variables. Every field has a default, and the
//! defaults are fully restricted.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, StrataError};

/// Environment variable naming the schema discovery root
pub const ENV_SCHEMA_PATH: &str = "STRATA__SCHEMA_PATH";
/// Environment variable that turns off discovery when set
pub const ENV_DISABLE_DISCOVERY: &str = "STRATA__DISABLE_SCHEMA_DISCOVERY";
/// Environment variable that lifts the capability deny-list when set
pub const ENV_ALLOW_UNSAFE: &str = "STRATA__ALLOW_UNSAFE_CAPABILITIES";

static ENV_VAR_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\$\{([^}:]+)(?::(-)?([^}]*))?\}").ok());

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    /// Root directory walked by schema discovery
    pub schema_path: Option<PathBuf>,

    /// Skip discovery on manager start
    pub disable_discovery: bool,

    /// Allow validator expressions to use deny-listed names
    pub allow_unsafe_capabilities: bool,

    /// Resource limits for validator evaluation
    pub evaluator: EvaluatorLimits,
}

/// Resource limits applied to every validator invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorLimits {
    /// Loop iterations allowed per invocation
    pub max_iterations: usize,

    /// Nesting depth for calls and expressions
    pub max_call_depth: usize,

    /// Longest accepted validator source, in bytes
    pub max_source_length: usize,
}

impl Default for EvaluatorLimits {
    fn default() -> Self {
        Self {
            max_iterations: 100_000,
            max_call_depth: 64,
            max_source_length: 16 * 1024,
        }
    }
}

impl StrataConfig {
    /// Load configuration from a YAML file, substituting `${VAR:-default}`
    /// references from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::IoError` if the file cannot be read and
    /// `StrataError::ConfigError` if the YAML cannot be decoded.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&contents, |name| std::env::var(name).ok())?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Decode configuration from YAML text, resolving variables through `lookup`
    ///
    /// # Errors
    ///
    /// Returns `StrataError::ConfigError` if the YAML cannot be decoded.
    pub fn from_yaml_str<F>(contents: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let substituted = substitute_env_vars(contents, lookup);
        serde_yaml::from_str(&substituted)
            .map_err(|e| StrataError::config(format!("Failed to parse YAML config: {e}")))
    }

    /// Build configuration from the `STRATA__*` environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            schema_path: lookup(ENV_SCHEMA_PATH)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            disable_discovery: lookup(ENV_DISABLE_DISCOVERY).is_some_and(|v| is_set(&v)),
            allow_unsafe_capabilities: lookup(ENV_ALLOW_UNSAFE).is_some_and(|v| is_set(&v)),
            evaluator: EvaluatorLimits::default(),
        }
    }

    /// Set the discovery root
    #[must_use]
    pub fn with_schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = Some(path.into());
        self
    }

    /// Turn discovery off
    #[must_use]
    pub fn without_discovery(mut self) -> Self {
        self.disable_discovery = true;
        self
    }

    /// Check limits for nonsensical values
    ///
    /// # Errors
    ///
    /// Returns `StrataError::ConfigError` if any limit is zero.
    pub fn validate(&self) -> Result<()> {
        let limits = &self.evaluator;
        if limits.max_iterations == 0 || limits.max_call_depth == 0 || limits.max_source_length == 0
        {
            return Err(StrataError::config("evaluator limits must be greater than zero"));
        }
        Ok(())
    }
}

// Presence turns a flag on, except for explicit negatives.
fn is_set(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

fn substitute_env_vars<F>(content: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let Some(re) = ENV_VAR_PATTERN.as_ref() else {
        return content.to_string();
    };

    re.replace_all(content, |caps: &regex::Captures| {
        let default_value = caps.get(3).map_or("", |m| m.as_str());
        lookup(&caps[1]).unwrap_or_else(|| {
            if caps.get(3).is_none() {
                warn!(variable = &caps[1], "Unset variable in configuration, substituting empty value");
            }
            default_value.to_string()
        })
    })
    .to_string()
}
