//! Skip-list filter.
//!
//! Identifiers on the skip-list are never handed to the rewrite callback.
//! An identifier is skipped when it is in the exact set, carries the
//! rewritten-code suffix, or fully matches a registered pattern. Positive
//! pattern decisions are cached so each identifier is matched once.

use crate::error::ConfigurationError;
use parking_lot::{Mutex, RwLock};
use reframe_core::REWRITTEN_SUFFIX;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Thread-safe, add-only set of exempt routine identifiers.
#[derive(Debug, Default)]
pub struct SkipList {
    exact: RwLock<FxHashSet<Arc<str>>>,
    patterns: RwLock<Vec<Regex>>,
    match_cache: Mutex<FxHashSet<Arc<str>>>,
}

impl SkipList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add exact identifiers.
    pub fn add<I, S>(&self, identifiers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let mut exact = self.exact.write();
        for id in identifiers {
            let id = id.into();
            tracing::debug!(identifier = %id, "added to skip-list");
            exact.insert(id);
        }
    }

    /// Add a regular expression. It must match the whole identifier.
    pub fn add_pattern(&self, pattern: &str) -> Result<(), ConfigurationError> {
        let regex = Self::compile_pattern(pattern)?;
        self.add_compiled([regex]);
        Ok(())
    }

    /// Compile `pattern` anchored at both ends, without registering it.
    pub fn compile_pattern(pattern: &str) -> Result<Regex, ConfigurationError> {
        Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| {
            ConfigurationError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })
    }

    /// Register patterns produced by [`compile_pattern`](Self::compile_pattern).
    pub fn add_compiled(&self, patterns: impl IntoIterator<Item = Regex>) {
        let mut registered = self.patterns.write();
        for regex in patterns {
            tracing::debug!(pattern = regex.as_str(), "added skip pattern");
            registered.push(regex);
        }
    }

    /// Whether `identifier` is exempt from interception.
    pub fn contains(&self, identifier: &str) -> bool {
        if identifier.ends_with(REWRITTEN_SUFFIX) {
            return true;
        }
        if self.exact.read().contains(identifier) {
            return true;
        }
        if self.match_cache.lock().contains(identifier) {
            return true;
        }

        let matched = self
            .patterns
            .read()
            .iter()
            .any(|regex| regex.is_match(identifier));
        if matched {
            self.match_cache.lock().insert(identifier.into());
        }
        matched
    }

    /// Number of exact identifiers.
    pub fn len(&self) -> usize {
        self.exact.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.read().is_empty() && self.patterns.read().is_empty()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let skips = SkipList::new();
        assert!(skips.is_empty());
        skips.add(["Tracer.__exit__", "helper"]);
        assert!(skips.contains("helper"));
        assert!(!skips.contains("helper2"));
        assert_eq!(skips.len(), 2);
    }

    #[test]
    fn test_rewritten_suffix_always_skipped() {
        let skips = SkipList::new();
        assert!(skips.contains("forward__updated"));
        assert!(!skips.contains("forward"));
    }

    #[test]
    fn test_pattern_is_full_match() {
        let skips = SkipList::new();
        skips.add_pattern(r"lib/.*\.rf").unwrap();
        assert!(skips.contains("lib/core.rf"));
        assert!(!skips.contains("app/lib/core.rf"));
        // Second lookup is served from the cache.
        assert!(skips.contains("lib/core.rf"));
        assert_eq!(skips.pattern_count(), 1);
    }

    #[test]
    fn test_compiled_patterns_registered_together() {
        let skips = SkipList::new();
        let compiled = ["tests/.*", "gen_[0-9]+"]
            .into_iter()
            .map(SkipList::compile_pattern)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(skips.pattern_count(), 0);
        skips.add_compiled(compiled);
        assert_eq!(skips.pattern_count(), 2);
        assert!(skips.contains("gen_42"));
        assert!(!skips.contains("gen_x"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let skips = SkipList::new();
        let err = skips.add_pattern("(oops").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidPattern { .. }));
        assert_eq!(skips.pattern_count(), 0);
    }
}
