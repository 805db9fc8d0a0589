//! Path matching logic.
//!
//! # Responsibilities
//! - Match exact paths
//! - Match path prefixes (case-sensitive)
//! - Match segment patterns (`*` one segment, trailing `**` any remainder)
//! - Match file extensions (case-insensitive)
//!
//! # Design Decisions
//! - Paths are matched as given; query strings never reach the matcher
//! - Prefix matching is plain `starts_with`, so `/auth` also covers
//!   `/auth/callback`; put the narrower rule first
//! - No regex to guarantee O(n) matching

use std::fmt::Debug;

/// Trait for matching request paths against conditions.
pub trait Matcher: Send + Sync + Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// Matches one path exactly.
#[derive(Debug, Clone)]
pub struct ExactPathMatcher {
    path: String,
}

impl ExactPathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Matcher for ExactPathMatcher {
    fn matches(&self, path: &str) -> bool {
        path == self.path
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Any,
    Rest,
}

/// Matches paths segment by segment.
///
/// `/api/properties/*/images` matches `/api/properties/123/images` but not
/// `/api/properties/123/images/9`; `/api/properties/*/images/**` matches both.
#[derive(Debug, Clone)]
pub struct SegmentPatternMatcher {
    segments: Vec<Segment>,
}

impl SegmentPatternMatcher {
    pub fn new(pattern: &str) -> Self {
        let segments = split_segments(pattern)
            .map(|s| match s {
                "*" => Segment::Any,
                "**" => Segment::Rest,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();
        Self { segments }
    }
}

impl Matcher for SegmentPatternMatcher {
    fn matches(&self, path: &str) -> bool {
        let mut parts = split_segments(path);
        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Any => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(expected) => {
                    if parts.next() != Some(expected.as_str()) {
                        return false;
                    }
                }
            }
        }
        parts.next().is_none()
    }
}

// Empty segments (leading, trailing or doubled slashes) are ignored.
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Matches paths whose last segment ends in one of the given extensions.
#[derive(Debug, Clone)]
pub struct ExtensionMatcher {
    extensions: Vec<String>,
}

impl ExtensionMatcher {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }
}

impl Matcher for ExtensionMatcher {
    fn matches(&self, path: &str) -> bool {
        let last = path.rsplit('/').next().unwrap_or_default();
        match last.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            }
            _ => false,
        }
    }
}
