//! Invalidation Rule Module
//!
//! Key patterns, strategies, and the rule type the invalidation engine
//! evaluates.

use std::fmt;

use regex::Regex;

use crate::config::DEFAULT_STORE_NAME;
use crate::error::{CacheError, Result};

// == Key Pattern ==
/// Pattern matched against cache keys.
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// Exact key match
    Literal(String),
    /// Key prefix match
    Prefix(String),
    /// Regular expression match
    Regex(Regex),
}

impl KeyPattern {
    /// Exact-match pattern.
    pub fn literal(key: impl Into<String>) -> Self {
        KeyPattern::Literal(key.into())
    }

    /// Prefix-match pattern.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        KeyPattern::Prefix(prefix.into())
    }

    /// Compiles a regular expression pattern.
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(KeyPattern::Regex)
            .map_err(|e| CacheError::InvalidPattern(format!("{}: {}", pattern, e)))
    }

    /// Tests a key against this pattern.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Literal(literal) => key == literal,
            KeyPattern::Prefix(prefix) => key.starts_with(prefix.as_str()),
            KeyPattern::Regex(regex) => regex.is_match(key),
        }
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPattern::Literal(literal) => write!(f, "{}", literal),
            KeyPattern::Prefix(prefix) => write!(f, "{}*", prefix),
            KeyPattern::Regex(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

// == Invalidation Strategy ==
/// How a matched rule removes entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationStrategy {
    /// Remove synchronously when triggered
    Immediate,
    /// Flag stale; the next get observes a miss and drops the entry
    Lazy,
    /// Defer removal to the next scheduled sweep tick
    Scheduled,
    /// Fires only through the dependency cascade, never on pattern match
    DependencyBased,
}

impl InvalidationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidationStrategy::Immediate => "immediate",
            InvalidationStrategy::Lazy => "lazy",
            InvalidationStrategy::Scheduled => "scheduled",
            InvalidationStrategy::DependencyBased => "dependency-based",
        }
    }
}

// == Invalidation Rule ==
/// A named rule registered against one or more stores.
///
/// Rules are evaluated in descending priority order when an invalidation
/// event is triggered.
#[derive(Debug, Clone)]
pub struct InvalidationRule {
    pub name: String,
    pub pattern: KeyPattern,
    pub strategy: InvalidationStrategy,
    /// Higher runs first
    pub priority: i32,
    pub enabled: bool,
    /// Store names this rule applies to
    pub managers: Vec<String>,
}

impl InvalidationRule {
    /// Creates an enabled rule against the primary store with priority 0.
    pub fn new(
        name: impl Into<String>,
        pattern: KeyPattern,
        strategy: InvalidationStrategy,
    ) -> Self {
        Self {
            name: name.into(),
            pattern,
            strategy,
            priority: 0,
            enabled: true,
            managers: vec![DEFAULT_STORE_NAME.to_string()],
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn for_managers<I, S>(mut self, managers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.managers = managers.into_iter().map(Into::into).collect();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern() {
        let pattern = KeyPattern::literal("user:1");
        assert!(pattern.matches("user:1"));
        assert!(!pattern.matches("user:12"));
    }

    #[test]
    fn test_prefix_pattern() {
        let pattern = KeyPattern::prefix("session:");
        assert!(pattern.matches("session:abc"));
        assert!(!pattern.matches("user:session:abc"));
    }

    #[test]
    fn test_regex_pattern() {
        let pattern = KeyPattern::regex(r"^quiz:\d+$").unwrap();
        assert!(pattern.matches("quiz:42"));
        assert!(!pattern.matches("quiz:abc"));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let result = KeyPattern::regex("(unclosed");
        assert!(matches!(result, Err(CacheError::InvalidPattern(_))));
    }

    #[test]
    fn test_pattern_display() {
        assert_eq!(KeyPattern::prefix("user:").to_string(), "user:*");
        assert_eq!(KeyPattern::regex("^a$").unwrap().to_string(), "/^a$/");
    }

    #[test]
    fn test_rule_builder() {
        let rule = InvalidationRule::new(
            "sessions",
            KeyPattern::prefix("session:"),
            InvalidationStrategy::Immediate,
        )
        .with_priority(10)
        .for_managers(["main", "documents"]);

        assert_eq!(rule.priority, 10);
        assert_eq!(rule.managers.len(), 2);
        assert!(rule.enabled);
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(InvalidationStrategy::Lazy.as_str(), "lazy");
        assert_eq!(
            InvalidationStrategy::DependencyBased.as_str(),
            "dependency-based"
        );
    }
}
