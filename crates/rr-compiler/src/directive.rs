//! Directive model and native wire shape
//!
//! [`Directive`] is the typed compiler output. [`NativeRule`] is the JSON
//! shape handed to the browser's "update dynamic rules" call.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use rr_core::ResourceType;

/// Priority assigned to every directive; list order breaks ties.
pub const DIRECTIVE_PRIORITY: u32 = 1;

// =============================================================================
// Compiled Directives
// =============================================================================

/// A compiled redirect directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// 1-based, dense over one compile pass
    pub id: u32,
    pub kind: DirectiveKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveKind {
    /// Whole-URL equality, fixed destination
    Exact {
        match_url: String,
        redirect_url: String,
    },
    /// Source wildcard collapsed to a single `*`, fixed destination
    PrefixWildcard {
        url_pattern: String,
        redirect_url: String,
    },
    /// Anchored regex, fixed destination; used when the source's literal
    /// text holds URL filter syntax
    FixedRegex {
        regex: String,
        redirect_url: String,
    },
    /// Anchored capture regex with a `\1` substitution template
    RegexCapture {
        regex: String,
        substitution: String,
    },
}

impl Directive {
    /// Convert to the native declarative rule shape.
    ///
    /// URL filters are anchored on both ends since the native engine treats
    /// an unanchored filter as a substring match.
    pub fn to_native(&self) -> NativeRule {
        let (filter, redirect) = match &self.kind {
            DirectiveKind::Exact {
                match_url,
                redirect_url,
            } => (
                UrlFilter::Plain(format!("|{}|", match_url)),
                NativeRedirect::url(redirect_url),
            ),
            DirectiveKind::PrefixWildcard {
                url_pattern,
                redirect_url,
            } => (
                UrlFilter::Plain(format!("|{}|", url_pattern)),
                NativeRedirect::url(redirect_url),
            ),
            DirectiveKind::FixedRegex {
                regex,
                redirect_url,
            } => (
                UrlFilter::Regex(regex.clone()),
                NativeRedirect::url(redirect_url),
            ),
            DirectiveKind::RegexCapture {
                regex,
                substitution,
            } => (
                UrlFilter::Regex(regex.clone()),
                NativeRedirect::substitution(substitution),
            ),
        };

        let (url_filter, regex_filter) = match filter {
            UrlFilter::Plain(f) => (Some(f), None),
            UrlFilter::Regex(r) => (None, Some(r)),
        };

        NativeRule {
            id: self.id,
            priority: DIRECTIVE_PRIORITY,
            action: NativeAction {
                action_type: ActionType::Redirect,
                redirect,
            },
            condition: NativeCondition {
                url_filter,
                regex_filter,
                is_url_filter_case_sensitive: true,
                resource_types: ResourceType::ALL
                    .names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            },
        }
    }
}

enum UrlFilter {
    Plain(String),
    Regex(String),
}

// =============================================================================
// Native Wire Shape
// =============================================================================

/// Declarative rule as accepted by the browser's dynamic rule API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NativeRule {
    pub id: u32,
    pub priority: u32,
    pub action: NativeAction,
    pub condition: NativeCondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ActionType {
    Redirect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NativeAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub redirect: NativeRedirect,
}

/// Exactly one of `url` or `regex_substitution` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NativeRedirect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub regex_substitution: Option<String>,
}

impl NativeRedirect {
    fn url(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            regex_substitution: None,
        }
    }

    fn substitution(template: &str) -> Self {
        Self {
            url: None,
            regex_substitution: Some(template.to_string()),
        }
    }
}

/// Exactly one of `url_filter` or `regex_filter` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NativeCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub url_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub regex_filter: Option<String>,
    /// The native engine folds case unless told otherwise
    #[serde(default)]
    pub is_url_filter_case_sensitive: bool,
    #[serde(default)]
    pub resource_types: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_directive_wire_shape() {
        let directive = Directive {
            id: 1,
            kind: DirectiveKind::Exact {
                match_url: "https://a.com/x".to_string(),
                redirect_url: "https://b.com/y".to_string(),
            },
        };
        let json = serde_json::to_value(directive.to_native()).expect("serialize");
        assert_eq!(json["id"], 1);
        assert_eq!(json["priority"], 1);
        assert_eq!(json["action"]["type"], "redirect");
        assert_eq!(json["action"]["redirect"]["url"], "https://b.com/y");
        assert!(json["action"]["redirect"].get("regexSubstitution").is_none());
        assert_eq!(json["condition"]["urlFilter"], "|https://a.com/x|");
        assert!(json["condition"].get("regexFilter").is_none());
        assert_eq!(json["condition"]["isUrlFilterCaseSensitive"], true);
        assert_eq!(
            json["condition"]["resourceTypes"].as_array().map(Vec::len),
            Some(7)
        );
    }

    #[test]
    fn regex_directive_wire_shape() {
        let directive = Directive {
            id: 3,
            kind: DirectiveKind::RegexCapture {
                regex: "^https://a\\.com/(.*)$".to_string(),
                substitution: "https://b.com/\\1".to_string(),
            },
        };
        let json = serde_json::to_value(directive.to_native()).expect("serialize");
        assert_eq!(json["condition"]["regexFilter"], "^https://a\\.com/(.*)$");
        assert!(json["condition"].get("urlFilter").is_none());
        assert_eq!(
            json["action"]["redirect"]["regexSubstitution"],
            "https://b.com/\\1"
        );
    }

    #[test]
    fn fixed_regex_directive_wire_shape() {
        let directive = Directive {
            id: 2,
            kind: DirectiveKind::FixedRegex {
                regex: "^https://a\\.com/a\\*b$".to_string(),
                redirect_url: "https://b.com/".to_string(),
            },
        };
        let json = serde_json::to_value(directive.to_native()).expect("serialize");
        assert_eq!(json["condition"]["regexFilter"], "^https://a\\.com/a\\*b$");
        assert!(json["condition"].get("urlFilter").is_none());
        assert_eq!(json["action"]["redirect"]["url"], "https://b.com/");
        assert!(json["action"]["redirect"].get("regexSubstitution").is_none());
    }

    #[test]
    fn native_rule_parses_browser_json() {
        let rule: NativeRule = serde_json::from_str(
            r#"{"id":7,"priority":1,"action":{"type":"redirect","redirect":{"url":"https://b.com/"}},
                "condition":{"urlFilter":"a.com","resourceTypes":["script"]}}"#,
        )
        .expect("native rule should parse");
        assert_eq!(rule.id, 7);
        assert!(!rule.condition.is_url_filter_case_sensitive);
        assert_eq!(rule.action.redirect.url.as_deref(), Some("https://b.com/"));
    }
}
