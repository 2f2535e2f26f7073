//! Pattern matching for members and topics
//!
//! Provides regex-based matching for subject names and action topics.
//! Patterns are compiled when an entry is built, never lazily during a
//! check. Anchoring (`^...$`) is the caller's business; nothing here adds it.

use crate::error::AclError;
use regex::Regex;
use std::fmt;

/// A single compiled pattern that remembers its source text
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile a pattern, failing fast on invalid syntax
    pub fn new(pattern: &str) -> Result<Self, AclError> {
        let regex = Regex::new(pattern).map_err(|e| AclError::Pattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Check if a candidate matches this pattern
    pub fn matches(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// The pattern as it was written
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

/// Compiled set of patterns, used for an entry's member list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternMatcher {
    patterns: Vec<Pattern>,
}

impl PatternMatcher {
    /// Create a new pattern matcher from a list of regex patterns
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, AclError> {
        let mut compiled = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            compiled.push(Pattern::new(pattern.as_ref())?);
        }

        Ok(Self { patterns: compiled })
    }

    /// Create an empty pattern matcher (matches nothing)
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Check if a candidate matches any pattern
    pub fn matches(&self, candidate: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(candidate))
    }

    /// Remove every pattern whose source is exactly `source`.
    ///
    /// Returns `true` if anything was removed.
    pub fn remove_source(&mut self, source: &str) -> bool {
        let before = self.patterns.len();
        self.patterns.retain(|p| p.as_str() != source);
        self.patterns.len() != before
    }

    /// Source texts of all patterns, in insertion order
    pub fn sources(&self) -> Vec<String> {
        self.patterns.iter().map(|p| p.source.clone()).collect()
    }

    /// Check if this matcher has any patterns
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Get the number of patterns
    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_matcher() {
        let matcher = PatternMatcher::empty();
        assert!(!matcher.matches("anything"));
        assert!(matcher.is_empty());
    }

    #[test]
    fn test_literal_name() {
        let matcher = PatternMatcher::new(&["^tester1$"]).unwrap();
        assert!(matcher.matches("tester1"));
        assert!(!matcher.matches("tester10"));
    }

    #[test]
    fn test_unanchored_pattern_is_not_anchored() {
        // Anchoring is left to whoever writes the rule
        let matcher = PatternMatcher::new(&["tester1"]).unwrap();
        assert!(matcher.matches("tester1"));
        assert!(matcher.matches("tester10"));
        assert!(matcher.matches("xtester1"));
    }

    #[test]
    fn test_wildcard_member() {
        let matcher = PatternMatcher::new(&["^gosa_.*_test$"]).unwrap();
        assert!(matcher.matches("gosa_user_test"));
        assert!(matcher.matches("gosa__test"));
        assert!(!matcher.matches("gosa_test_testWrong"));
    }

    #[test]
    fn test_topic_hierarchy() {
        let pattern = Pattern::new(r"^com\..*\.factory$").unwrap();
        assert!(pattern.matches("com.gosa.factory"));
        assert!(pattern.matches("com.a.b.factory"));
        assert!(!pattern.matches("org.gosa.factory"));
        assert!(!pattern.matches("comXgosa.factory"));
    }

    #[test]
    fn test_remove_source() {
        let mut matcher = PatternMatcher::new(&["tester1", "tester2", "tester1"]).unwrap();
        assert!(matcher.remove_source("tester1"));
        assert_eq!(matcher.sources(), vec!["tester2".to_string()]);
        assert!(!matcher.remove_source("tester1"));
        assert_eq!(matcher.len(), 1);
    }

    #[test]
    fn test_invalid_pattern() {
        let result = PatternMatcher::new(&["[invalid"]);
        assert!(matches!(result.unwrap_err(), AclError::Pattern { .. }));

        assert!(Pattern::new("(unclosed").is_err());
    }
}
