//! Hook configuration.
//!
//! A [`HookConfig`] can be built in code or loaded from TOML:
//!
//! ```toml
//! skip = ["Tracer.__exit__"]
//! skip_patterns = [".*/site-packages/.*"]
//! hierarchical = false
//! restore_after_bridge = true
//! mark_rewritten = true
//! ```

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid skip pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Interception policy and initial skip-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HookConfig {
    /// Exact routine identifiers exempt from interception.
    pub skip: Vec<String>,

    /// Regular expressions; an identifier that fully matches one is exempt.
    pub skip_patterns: Vec<String>,

    /// Keep intercepting routines called from inside a bridged replacement.
    ///
    /// The replacement frame itself is never intercepted.
    pub hierarchical: bool,

    /// Leave the hook enabled after a bridged call. When false, the hook is
    /// switched off once the first replacement returns.
    pub restore_after_bridge: bool,

    /// Append the rewritten-code suffix to replacement code names.
    pub mark_rewritten: bool,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            skip: Vec::new(),
            skip_patterns: Vec::new(),
            hierarchical: false,
            restore_after_bridge: true,
            mark_rewritten: true,
        }
    }
}

impl HookConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a skip
    /// pattern is not a valid regular expression.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a skip pattern does not
    /// compile.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check that every skip pattern compiles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pattern in &self.skip_patterns {
            Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = HookConfig::default();
        assert!(config.skip.is_empty());
        assert!(!config.hierarchical);
        assert!(config.restore_after_bridge);
        assert!(config.mark_rewritten);
    }

    #[test]
    fn test_from_toml_partial_uses_defaults() {
        let config = HookConfig::from_toml(
            r#"
            skip = ["Tracer.__exit__"]
            hierarchical = true
            "#,
        )
        .unwrap();
        assert_eq!(config.skip, vec!["Tracer.__exit__".to_string()]);
        assert!(config.hierarchical);
        assert!(config.restore_after_bridge);
    }

    #[test]
    fn test_from_toml_rejects_bad_pattern() {
        let err = HookConfig::from_toml(r#"skip_patterns = ["(unclosed"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { .. }));
    }

    #[test]
    fn test_from_toml_rejects_unknown_key() {
        let err = HookConfig::from_toml("enable = true").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_round_trip_through_file() {
        let config = HookConfig {
            skip_patterns: vec![r".*/vendor/.*".to_string()],
            restore_after_bridge: false,
            ..HookConfig::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();

        let loaded = HookConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
