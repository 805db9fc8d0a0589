//! Route classification.
//!
//! # Responsibilities
//! - Store the ordered (matcher, class) table
//! - Assign exactly one class to every request path
//! - Provide the built-in table used when no rules are configured
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) ordered scan, first match wins
//! - Unmatched paths get `RouteClass::Default`, never an implicit bypass
//! - Bypass rules only apply to safe methods; state-changing requests skip
//!   them and fall through to the next matching rule

use crate::config::RouteRuleConfig;
use crate::policy::RouteClass;
use crate::routing::matcher::{
    ExactPathMatcher, ExtensionMatcher, Matcher, PathPrefixMatcher, SegmentPatternMatcher,
};

/// Extensions served as static assets by the built-in table.
pub const STATIC_EXTENSIONS: &[&str] = &[
    "svg", "png", "jpg", "jpeg", "gif", "webp", "ico", "css", "js", "map", "woff", "woff2",
];

#[derive(Debug)]
struct Rule {
    matcher: Box<dyn Matcher>,
    class: RouteClass,
}

/// Ordered, first-match-wins path classifier.
#[derive(Debug)]
pub struct RouteClassifier {
    rules: Vec<Rule>,
}

impl RouteClassifier {
    /// An empty classifier: every path is `Default`.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule. Rules are evaluated in insertion order.
    pub fn push(mut self, matcher: impl Matcher + 'static, class: RouteClass) -> Self {
        self.rules.push(Rule {
            matcher: Box::new(matcher),
            class,
        });
        self
    }

    /// Compile configured rules, or the built-in table when there are none.
    ///
    /// Rules are expected to have passed validation; a rule with several
    /// matcher fields uses the first of exact, prefix, pattern, extensions.
    pub fn from_config(rules: &[RouteRuleConfig]) -> Self {
        if rules.is_empty() {
            return Self::builtin();
        }

        rules.iter().fold(Self::new(), |classifier, rule| {
            if let Some(exact) = &rule.exact {
                classifier.push(ExactPathMatcher::new(exact.clone()), rule.class)
            } else if let Some(prefix) = &rule.prefix {
                classifier.push(PathPrefixMatcher::new(prefix.clone()), rule.class)
            } else if let Some(pattern) = &rule.pattern {
                classifier.push(SegmentPatternMatcher::new(pattern), rule.class)
            } else {
                classifier.push(ExtensionMatcher::new(&rule.extensions), rule.class)
            }
        })
    }

    /// The built-in table.
    ///
    /// `/auth/callback` sits in front of the broader public `/auth` prefix,
    /// and the upload patterns in front of `/api/`.
    pub fn builtin() -> Self {
        use crate::policy::RouteClass::*;

        Self::new()
            .push(PathPrefixMatcher::new("/_next/static"), Bypass)
            .push(PathPrefixMatcher::new("/_next/image"), Bypass)
            .push(PathPrefixMatcher::new("/static/"), Bypass)
            .push(PathPrefixMatcher::new("/assets/"), Bypass)
            .push(ExactPathMatcher::new("/favicon.ico"), Bypass)
            .push(ExactPathMatcher::new("/health"), Bypass)
            .push(ExactPathMatcher::new("/healthz"), Bypass)
            .push(ExactPathMatcher::new("/ready"), Bypass)
            .push(ExtensionMatcher::new(STATIC_EXTENSIONS), Bypass)
            .push(PathPrefixMatcher::new("/auth/callback"), Auth)
            .push(PathPrefixMatcher::new("/api/auth/"), Auth)
            .push(PathPrefixMatcher::new("/login"), Public)
            .push(PathPrefixMatcher::new("/auth"), Public)
            .push(PathPrefixMatcher::new("/demo-"), Public)
            .push(SegmentPatternMatcher::new("/api/properties/*/images/**"), Upload)
            .push(PathPrefixMatcher::new("/api/upload"), Upload)
            .push(PathPrefixMatcher::new("/api/"), Api)
    }

    /// Classify a request path, ignoring the method.
    pub fn classify(&self, path: &str) -> RouteClass {
        self.classify_request(path, true)
    }

    /// Classify a request. With `safe_method` false, Bypass rules are
    /// skipped.
    pub fn classify_request(&self, path: &str, safe_method: bool) -> RouteClass {
        self.rules
            .iter()
            .filter(|rule| safe_method || rule.class != RouteClass::Bypass)
            .find(|rule| rule.matcher.matches(path))
            .map(|rule| rule.class)
            .unwrap_or(RouteClass::Default)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RouteClassifier {
    fn default() -> Self {
        Self::builtin()
    }
}
