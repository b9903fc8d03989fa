//! Local directive evaluation
//!
//! Applies native rules to a URL the way the browser's declarative engine
//! does, so the CLI and debug tools can check what an installed rule set
//! would do without a browser. Supports the filter syntax the compiler
//! emits: `|` anchors, `*` wildcards and the `^` separator in URL filters,
//! plus regex filters with `\N` substitutions.

use regex::{Regex, RegexBuilder};

use rr_core::ResourceType;

use crate::directive::NativeRule;

/// Error type for building an evaluator.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Invalid filter in rule {id}: {source}")]
    InvalidFilter {
        id: u32,
        #[source]
        source: regex::Error,
    },
    #[error("Rule {0} has no urlFilter or regexFilter")]
    MissingFilter(u32),
    #[error("Rule {0} has no redirect target")]
    MissingRedirect(u32),
}

/// A redirect the engine would perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub rule_id: u32,
    pub url: String,
}

#[derive(Debug)]
enum Target {
    Url(String),
    Substitution(String),
}

#[derive(Debug)]
struct Entry {
    id: u32,
    priority: u32,
    resource_types: ResourceType,
    filter: Regex,
    target: Target,
}

/// Prepared set of native rules.
#[derive(Debug)]
pub struct RuleEvaluator {
    entries: Vec<Entry>,
}

impl RuleEvaluator {
    pub fn new(rules: &[NativeRule]) -> Result<Self, EvalError> {
        let mut entries = Vec::with_capacity(rules.len());

        for rule in rules {
            let case_sensitive = rule.condition.is_url_filter_case_sensitive;
            let pattern = match (&rule.condition.url_filter, &rule.condition.regex_filter) {
                (Some(filter), _) => url_filter_to_regex(filter),
                (None, Some(regex)) => regex.clone(),
                (None, None) => return Err(EvalError::MissingFilter(rule.id)),
            };
            let filter = RegexBuilder::new(&pattern)
                .case_insensitive(!case_sensitive)
                .build()
                .map_err(|source| EvalError::InvalidFilter { id: rule.id, source })?;

            let redirect = &rule.action.redirect;
            let target = match (&redirect.url, &redirect.regex_substitution) {
                (Some(url), _) => Target::Url(url.clone()),
                (None, Some(template)) if rule.condition.regex_filter.is_some() => {
                    Target::Substitution(template.clone())
                }
                _ => return Err(EvalError::MissingRedirect(rule.id)),
            };

            // An empty list means every type; the engine defaults the same way.
            let resource_types = if rule.condition.resource_types.is_empty() {
                ResourceType::ALL
            } else {
                rule.condition
                    .resource_types
                    .iter()
                    .fold(ResourceType::empty(), |mask, name| {
                        mask | ResourceType::from_str(name)
                    })
            };

            entries.push(Entry {
                id: rule.id,
                priority: rule.priority,
                resource_types,
                filter,
                target,
            });
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Redirect for `url`, if any rule applies.
    ///
    /// Highest priority wins; among equal priorities the lowest id wins.
    pub fn evaluate(&self, url: &str, resource_type: ResourceType) -> Option<Redirect> {
        let entry = self
            .entries
            .iter()
            .filter(|e| e.resource_types.intersects(resource_type))
            .filter(|e| e.filter.is_match(url))
            .min_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)))?;

        let url = match &entry.target {
            Target::Url(target) => target.clone(),
            Target::Substitution(template) => {
                let caps = entry.filter.captures(url)?;
                let whole = caps.get(0)?;
                let mut out = String::with_capacity(url.len() + template.len());
                out.push_str(&url[..whole.start()]);
                expand_substitution(template, &caps, &mut out);
                out.push_str(&url[whole.end()..]);
                out
            }
        };

        Some(Redirect {
            rule_id: entry.id,
            url,
        })
    }
}

/// Translate a URL filter into an equivalent regex.
fn url_filter_to_regex(filter: &str) -> String {
    let (left_anchor, rest) = match filter.strip_prefix('|') {
        Some(rest) => (true, rest),
        None => (false, filter),
    };
    let (right_anchor, body) = match rest.strip_suffix('|') {
        Some(body) => (true, body),
        None => (false, rest),
    };

    let mut out = String::with_capacity(body.len() + 16);
    if left_anchor {
        out.push('^');
    }
    let mut literal = String::new();
    for ch in body.chars() {
        match ch {
            '*' | '^' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                if ch == '*' {
                    out.push_str(".*");
                } else {
                    out.push_str("(?:[^A-Za-z0-9_.%-]|$)");
                }
            }
            _ => literal.push(ch),
        }
    }
    out.push_str(&regex::escape(&literal));
    if right_anchor {
        out.push('$');
    }
    out
}

/// Expand `\N` group references and `\\` escapes.
fn expand_substitution(template: &str, caps: &regex::Captures<'_>, out: &mut String) {
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                let group = d as usize - '0' as usize;
                if let Some(m) = caps.get(group) {
                    out.push_str(m.as_str());
                }
            }
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            _ => out.push('\\'),
        }
    }
}
