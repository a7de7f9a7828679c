//! Dispatch policy: which strategy a resource path is served with.
//!
//! A [`PolicyTable`] is an explicit list of `(pattern → strategy)` rules
//! supplied at construction time. When several rules match a path, the
//! strategy with the highest precedence wins (see [`Strategy`]); when none
//! match, the path falls back to [`Strategy::Queued`].
//!
//! Patterns are written as strings, in code or in the config file:
//!
//! | Pattern | Matches |
//! |---|---|
//! | `/rooms` | exactly `/rooms` |
//! | `/rooms/*` | `/rooms` and everything nested under it |
//! | `**/search` | any path with a `search` segment |
//!
//! ```toml
//! [[policy]]
//! pattern = "/rooms/*"
//! strategy = "cached"
//!
//! [[policy]]
//! pattern = "**/search"
//! strategy = "debounced"
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::HuginnError;

/// How a request reaches the network.
///
/// Variants are declared in precedence order: when more than one rule
/// matches a path, the earliest variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Serve from the response cache, deduplicating concurrent misses.
    Cached,
    /// Collapse rapid calls for one key into the last of them.
    Debounced,
    /// At most one network call per key per interval.
    Throttled,
    /// FIFO queue under the global concurrency cap.
    Queued,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Cached => "cached",
            Strategy::Debounced => "debounced",
            Strategy::Throttled => "throttled",
            Strategy::Queued => "queued",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourcePattern {
    /// The path itself and nothing else.
    Exact(String),
    /// The path and every path nested under it.
    Prefix(String),
    /// Any path containing this segment.
    Segment(String),
}

impl ResourcePattern {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => path == p,
            Self::Prefix(p) => {
                path == p
                    || path
                        .strip_prefix(p.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            Self::Segment(s) => path.split('/').any(|seg| seg == s),
        }
    }
}

impl fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(p) => f.write_str(p),
            Self::Prefix(p) => write!(f, "{p}/*"),
            Self::Segment(s) => write!(f, "**/{s}"),
        }
    }
}

impl FromStr for ResourcePattern {
    type Err = HuginnError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid =
            |why: &str| HuginnError::Configuration(format!("invalid pattern '{s}': {why}"));

        if let Some(segment) = s.strip_prefix("**/") {
            if segment.is_empty() || segment.contains('/') || segment.contains('*') {
                return Err(invalid("segment patterns name a single segment"));
            }
            return Ok(Self::Segment(segment.to_string()));
        }
        if !s.starts_with('/') {
            return Err(invalid("must start with '/' or '**/'"));
        }
        if let Some(base) = s.strip_suffix("/*") {
            if base.contains('*') {
                return Err(invalid("only a trailing '/*' wildcard is allowed"));
            }
            return Ok(Self::Prefix(base.to_string()));
        }
        if s.contains('*') {
            return Err(invalid("only a trailing '/*' wildcard is allowed"));
        }
        Ok(Self::Exact(s.to_string()))
    }
}

impl Serialize for ResourcePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourcePattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One `pattern → strategy` rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub pattern: ResourcePattern,
    pub strategy: Strategy,
}

impl PolicyRule {
    pub fn new(pattern: ResourcePattern, strategy: Strategy) -> Self {
        Self { pattern, strategy }
    }
}

/// Ordered set of dispatch rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyTable {
    rules: Vec<PolicyRule>,
}

impl PolicyTable {
    /// An empty table: every path is queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule from a pattern string.
    pub fn rule(mut self, pattern: &str, strategy: Strategy) -> crate::Result<Self> {
        self.rules.push(PolicyRule::new(pattern.parse()?, strategy));
        Ok(self)
    }

    /// Add an already-parsed rule.
    pub fn push(&mut self, rule: PolicyRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// The strategy for `path`: highest-precedence match, else `Queued`.
    pub fn classify(&self, path: &str) -> Strategy {
        self.rules
            .iter()
            .filter(|rule| rule.pattern.matches(path))
            .map(|rule| rule.strategy)
            .min()
            .unwrap_or(Strategy::Queued)
    }
}

impl FromIterator<PolicyRule> for PolicyTable {
    fn from_iter<I: IntoIterator<Item = PolicyRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_parsing() {
        assert_eq!(
            "/rooms".parse::<ResourcePattern>().unwrap(),
            ResourcePattern::Exact("/rooms".into())
        );
        assert_eq!(
            "/rooms/*".parse::<ResourcePattern>().unwrap(),
            ResourcePattern::Prefix("/rooms".into())
        );
        assert_eq!(
            "**/search".parse::<ResourcePattern>().unwrap(),
            ResourcePattern::Segment("search".into())
        );
    }

    #[test]
    fn pattern_parsing_rejects_garbage() {
        for bad in ["", "rooms", "/ro*ms", "/*/rooms", "**/", "**/a/b"] {
            assert!(bad.parse::<ResourcePattern>().is_err(), "{bad}");
        }
    }

    #[test]
    fn pattern_display_round_trips() {
        for s in ["/rooms", "/rooms/*", "**/search"] {
            let p: ResourcePattern = s.parse().unwrap();
            assert_eq!(p.to_string(), s);
        }
    }

    #[test]
    fn prefix_matches_whole_segments() {
        let p = ResourcePattern::Prefix("/rooms".into());
        assert!(p.matches("/rooms"));
        assert!(p.matches("/rooms/42"));
        assert!(!p.matches("/roomsearch"));
    }

    #[test]
    fn segment_matches_anywhere() {
        let p = ResourcePattern::Segment("search".into());
        assert!(p.matches("/rooms/search"));
        assert!(p.matches("/search"));
        assert!(!p.matches("/rooms/searching"));
    }

    #[test]
    fn unmatched_paths_are_queued() {
        let table = PolicyTable::new();
        assert_eq!(table.classify("/bookings"), Strategy::Queued);
    }

    #[test]
    fn precedence_beats_rule_order() {
        let table = PolicyTable::new()
            .rule("**/search", Strategy::Debounced)
            .unwrap()
            .rule("/rooms/*", Strategy::Cached)
            .unwrap()
            .rule("/analytics/*", Strategy::Throttled)
            .unwrap();
        assert_eq!(table.classify("/rooms/search"), Strategy::Cached);
        assert_eq!(table.classify("/hotels/search"), Strategy::Debounced);
        assert_eq!(table.classify("/analytics/views"), Strategy::Throttled);
        assert_eq!(table.classify("/bookings"), Strategy::Queued);
    }

    #[test]
    fn strategy_serde_is_lowercase() {
        let s: Strategy = serde_json::from_str("\"throttled\"").unwrap();
        assert_eq!(s, Strategy::Throttled);
        assert_eq!(serde_json::to_string(&Strategy::Cached).unwrap(), "\"cached\"");
    }
}
