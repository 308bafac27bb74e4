//! Resource paths and the patterns policies use to match them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordered sequence of opaque segments naming a logical access point,
/// e.g. `["db", "users"]`. Segment equality is exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourcePath(Vec<String>);

impl ResourcePath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl<S: Into<String>> FromIterator<S> for ResourcePath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// One component of a [`PathPattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`: exactly one segment.
    Any,
    /// `**`: zero or more trailing segments. Only valid last.
    Rest,
}

/// A `/`-joined path pattern such as `db/*` or `fs/**`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

/// Rejected pattern text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid path pattern '{pattern}': {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}

impl PathPattern {
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        let parts: Vec<&str> = source.split('/').collect();
        let last = parts.len() - 1;
        let mut segments = Vec::with_capacity(parts.len());

        for (i, part) in parts.iter().enumerate() {
            let segment = match *part {
                "**" if i == last => Segment::Rest,
                "**" => {
                    return Err(PatternError {
                        pattern: source.to_string(),
                        reason: "'**' must be the final segment".to_string(),
                    })
                }
                "*" => Segment::Any,
                literal => Segment::Literal(literal.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Segment-wise match against a concrete path.
    pub fn matches(&self, path: &ResourcePath) -> bool {
        let path = path.segments();
        let mut i = 0;

        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Any => {
                    if i >= path.len() {
                        return false;
                    }
                }
                Segment::Literal(literal) => {
                    if path.get(i) != Some(literal) {
                        return false;
                    }
                }
            }
            i += 1;
        }

        i == path.len()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for PathPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PathPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for PathPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PathPattern::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A literal verb, or `*` for any verb.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionPattern {
    Any,
    Exact(String),
}

impl ActionPattern {
    pub fn matches(&self, action: &str) -> bool {
        match self {
            ActionPattern::Any => true,
            ActionPattern::Exact(verb) => verb == action,
        }
    }
}

impl From<&str> for ActionPattern {
    fn from(s: &str) -> Self {
        if s == "*" {
            ActionPattern::Any
        } else {
            ActionPattern::Exact(s.to_string())
        }
    }
}

impl fmt::Display for ActionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionPattern::Any => f.write_str("*"),
            ActionPattern::Exact(verb) => f.write_str(verb),
        }
    }
}

impl Serialize for ActionPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ActionPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ActionPattern::from(raw.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[&str]) -> ResourcePath {
        ResourcePath::new(segments.iter().copied())
    }

    fn pattern(s: &str) -> PathPattern {
        PathPattern::parse(s).unwrap()
    }

    #[test]
    fn test_double_star_matches_zero_or_more() {
        let p = pattern("db/**");
        assert!(p.matches(&path(&["db"])));
        assert!(p.matches(&path(&["db", "users"])));
        assert!(p.matches(&path(&["db", "users", "1"])));
        assert!(!p.matches(&path(&["fs", "users"])));
        assert!(!p.matches(&path(&[])));
    }

    #[test]
    fn test_single_star_matches_exactly_one() {
        let p = pattern("fs/*");
        assert!(p.matches(&path(&["fs", "bucket"])));
        assert!(!p.matches(&path(&["fs", "bucket", "sub"])));
        assert!(!p.matches(&path(&["fs"])));
    }

    #[test]
    fn test_literal_pattern() {
        let p = pattern("db/users");
        assert!(p.matches(&path(&["db", "users"])));
        assert!(!p.matches(&path(&["db", "user"])));
        assert!(!p.matches(&path(&["db", "users", "x"])));
    }

    #[test]
    fn test_bare_double_star_matches_everything() {
        let p = pattern("**");
        assert!(p.matches(&path(&[])));
        assert!(p.matches(&path(&["echo"])));
        assert!(p.matches(&path(&["a", "b", "c"])));
    }

    #[test]
    fn test_double_star_must_be_last() {
        let err = PathPattern::parse("db/**/users").unwrap_err();
        assert!(err.reason.contains("final"));
    }

    #[test]
    fn test_star_is_not_a_glob_inside_segment() {
        let p = pattern("db/user*");
        assert!(!p.matches(&path(&["db", "users"])));
        assert!(p.matches(&path(&["db", "user*"])));
    }

    #[test]
    fn test_action_pattern() {
        assert!(ActionPattern::from("*").matches("delete"));
        assert!(ActionPattern::from("read").matches("read"));
        assert!(!ActionPattern::from("read").matches("write"));
    }

    #[test]
    fn test_path_display() {
        assert_eq!(path(&["db", "users"]).to_string(), "db/users");
    }

    #[test]
    fn test_pattern_serde() {
        let p: PathPattern = serde_json::from_str("\"cache/*\"").unwrap();
        assert_eq!(p.as_str(), "cache/*");
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"cache/*\"");
        assert!(serde_json::from_str::<PathPattern>("\"**/x\"").is_err());
    }
}
