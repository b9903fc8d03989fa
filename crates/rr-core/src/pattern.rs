//! Wildcard pattern matching
//!
//! A pattern is either an exact URL or a URL with a single `**` marker that
//! captures any run of characters. The [`WildcardPattern`] split into a
//! literal prefix and suffix is the one primitive both the live matcher and
//! the directive compiler build on.

use crate::types::{MatchResult, WILDCARD};

// =============================================================================
// Pattern Shapes
// =============================================================================

/// Classification of a single pattern string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternShape<'a> {
    /// Empty pattern, never actionable
    Empty,
    /// No wildcard marker: whole-string equality
    Exact(&'a str),
    /// Exactly one wildcard marker
    Wildcard(WildcardPattern<'a>),
    /// More than one wildcard marker, never actionable
    Invalid,
}

impl<'a> PatternShape<'a> {
    pub fn classify(pattern: &'a str) -> Self {
        if pattern.is_empty() {
            return Self::Empty;
        }
        match wildcard_count(pattern) {
            0 => Self::Exact(pattern),
            1 => WildcardPattern::parse(pattern).map_or(Self::Invalid, Self::Wildcard),
            _ => Self::Invalid,
        }
    }

    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Exact(_) | Self::Wildcard(_))
    }
}

/// Number of non-overlapping `**` markers in a pattern.
#[inline]
pub fn wildcard_count(pattern: &str) -> usize {
    pattern.matches(WILDCARD).count()
}

// =============================================================================
// Wildcard Pattern
// =============================================================================

/// A pattern split around its single `**` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WildcardPattern<'a> {
    /// Literal text before the marker
    pub prefix: &'a str,
    /// Literal text after the marker (empty if the marker ends the pattern)
    pub suffix: &'a str,
}

impl<'a> WildcardPattern<'a> {
    /// Split a pattern holding exactly one marker.
    pub fn parse(pattern: &'a str) -> Option<Self> {
        let pos = pattern.find(WILDCARD)?;
        let suffix = &pattern[pos + WILDCARD.len()..];
        if suffix.contains(WILDCARD) {
            return None;
        }
        Some(Self {
            prefix: &pattern[..pos],
            suffix,
        })
    }

    /// Return the text between prefix and suffix when the candidate matches.
    ///
    /// Candidates too short to hold both literals never match, so prefix and
    /// suffix can't overlap.
    #[inline]
    pub fn capture<'c>(&self, candidate: &'c str) -> Option<&'c str> {
        if candidate.len() < self.prefix.len() + self.suffix.len() {
            return None;
        }
        if !candidate.starts_with(self.prefix) || !candidate.ends_with(self.suffix) {
            return None;
        }
        Some(&candidate[self.prefix.len()..candidate.len() - self.suffix.len()])
    }

    /// Rebuild a URL with the marker replaced by `capture`.
    pub fn fill(&self, capture: &str) -> String {
        let mut out =
            String::with_capacity(self.prefix.len() + capture.len() + self.suffix.len());
        out.push_str(self.prefix);
        out.push_str(capture);
        out.push_str(self.suffix);
        out
    }
}

// =============================================================================
// URL Testing
// =============================================================================

/// Test `candidate` against a `from -> to` rule.
///
/// Never fails: empty patterns and patterns with several markers yield a
/// non-matching result.
pub fn test_url(from: &str, to: &str, candidate: &str) -> MatchResult {
    let target = PatternShape::classify(to);
    if !target.is_actionable() {
        return MatchResult::no_match();
    }

    match PatternShape::classify(from) {
        PatternShape::Exact(exact) => {
            if candidate != exact {
                return MatchResult::no_match();
            }
            // A marker in the target of an exact rule passes through literally.
            MatchResult {
                matched: true,
                redirect_url: Some(to.to_string()),
                captured_text: None,
            }
        }
        PatternShape::Wildcard(source) => {
            let Some(captured) = source.capture(candidate) else {
                return MatchResult::no_match();
            };
            let redirect_url = match target {
                PatternShape::Wildcard(dest) => dest.fill(captured),
                _ => to.to_string(),
            };
            MatchResult {
                matched: true,
                redirect_url: Some(redirect_url),
                captured_text: Some(captured.to_string()),
            }
        }
        PatternShape::Empty | PatternShape::Invalid => MatchResult::no_match(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let result = test_url("https://a.com/x", "https://b.com/y", "https://a.com/x");
        assert!(result.matched);
        assert_eq!(result.redirect_url.as_deref(), Some("https://b.com/y"));
        assert_eq!(result.captured_text, None);

        assert!(!test_url("https://a.com/x", "https://b.com/y", "https://a.com/x2").matched);
        assert!(!test_url("https://a.com/x", "https://b.com/y", "https://a.com/").matched);
    }

    #[test]
    fn test_wildcard_without_target_wildcard() {
        let result = test_url("https://a.com/**", "https://b.com/fixed", "https://a.com/page1");
        assert!(result.matched);
        assert_eq!(result.redirect_url.as_deref(), Some("https://b.com/fixed"));
        assert_eq!(result.captured_text.as_deref(), Some("page1"));
    }

    #[test]
    fn test_wildcard_substitution() {
        let result = test_url("https://a.com/**", "https://b.com/**", "https://a.com/hello");
        assert!(result.matched);
        assert_eq!(result.captured_text.as_deref(), Some("hello"));
        assert_eq!(result.redirect_url.as_deref(), Some("https://b.com/hello"));
    }

    #[test]
    fn test_wildcard_with_suffix() {
        let result = test_url(
            "https://a.com/**/end",
            "https://b.com/**/done",
            "https://a.com/middle/end",
        );
        assert!(result.matched);
        assert_eq!(result.captured_text.as_deref(), Some("middle"));
        assert_eq!(result.redirect_url.as_deref(), Some("https://b.com/middle/done"));

        let result = test_url(
            "https://a.com/**/end",
            "https://b.com/**/done",
            "https://a.com/middle/end2",
        );
        assert!(!result.matched);
        assert_eq!(result.redirect_url, None);
    }

    #[test]
    fn test_multiple_wildcards_never_match() {
        for candidate in ["https://a.com/x/y", "https://a.com//", "anything"] {
            assert!(!test_url("https://a.com/**/**", "https://b.com/**", candidate).matched);
            assert!(!test_url("**", "https://b.com/**/**", candidate).matched);
        }
    }

    #[test]
    fn test_empty_patterns_never_match() {
        assert!(!test_url("", "https://b.com/", "").matched);
        assert!(!test_url("https://a.com/", "", "https://a.com/").matched);
    }

    #[test]
    fn test_catch_all() {
        let result = test_url("**", "https://proxy.example/?u=**", "https://a.com/q?x=1");
        assert!(result.matched);
        assert_eq!(result.captured_text.as_deref(), Some("https://a.com/q?x=1"));
        assert_eq!(
            result.redirect_url.as_deref(),
            Some("https://proxy.example/?u=https://a.com/q?x=1")
        );

        let result = test_url("**", "https://b.com/", "");
        assert!(result.matched);
        assert_eq!(result.captured_text.as_deref(), Some(""));
    }

    #[test]
    fn test_overlapping_prefix_and_suffix() {
        // "abcba" would satisfy starts_with("abc") and ends_with("cba") on overlap.
        assert!(!test_url("abc**cba", "x", "abcba").matched);
        let result = test_url("abc**cba", "x**", "abccba");
        assert!(result.matched);
        assert_eq!(result.captured_text.as_deref(), Some(""));
        assert_eq!(result.redirect_url.as_deref(), Some("x"));
    }

    #[test]
    fn test_exact_rule_passes_target_marker_literally() {
        let result = test_url("https://a.com/x", "https://b.com/**", "https://a.com/x");
        assert!(result.matched);
        assert_eq!(result.redirect_url.as_deref(), Some("https://b.com/**"));
    }

    #[test]
    fn test_leading_wildcard() {
        let result = test_url("**.png", "https://img.example/**.webp", "https://a.com/cat.png");
        assert!(result.matched);
        assert_eq!(
            result.redirect_url.as_deref(),
            Some("https://img.example/https://a.com/cat.webp")
        );
    }

    #[test]
    fn test_classify() {
        assert_eq!(PatternShape::classify(""), PatternShape::Empty);
        assert_eq!(PatternShape::classify("https://a.com/"), PatternShape::Exact("https://a.com/"));
        assert_eq!(
            PatternShape::classify("https://a.com/**.js"),
            PatternShape::Wildcard(WildcardPattern {
                prefix: "https://a.com/",
                suffix: ".js",
            })
        );
        assert_eq!(PatternShape::classify("**a**"), PatternShape::Invalid);
        // Three stars hold one non-overlapping marker followed by a literal star.
        assert_eq!(
            PatternShape::classify("a***"),
            PatternShape::Wildcard(WildcardPattern { prefix: "a", suffix: "*" })
        );
    }

    #[test]
    fn test_non_ascii_candidates() {
        let result = test_url("https://a.com/**", "https://b.com/**", "https://a.com/héllo");
        assert_eq!(result.redirect_url.as_deref(), Some("https://b.com/héllo"));
        assert!(!test_url("https://a.com/é**", "x", "https://a.com/").matched);
    }
}
