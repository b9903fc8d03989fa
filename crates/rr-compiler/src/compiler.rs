//! Rule compiler
//!
//! Turns the actionable subset of a rule list into directives. The capture
//! regex is derived from the same [`WildcardPattern`] split the live matcher
//! uses, so a preview and an installed directive agree on every URL.

use rr_core::pattern::{PatternShape, WildcardPattern};
use rr_core::{Rule, RuleBook};

use crate::directive::{Directive, DirectiveKind};

/// Compile rules in list order.
///
/// Disabled rules, rules with an empty URL, and rules with more than one
/// wildcard marker in either URL are skipped. Ids are 1-based and dense
/// over the rules kept.
pub fn compile(rules: &[Rule]) -> Vec<Directive> {
    compile_rules(rules.iter())
}

/// Compile the rules of a rule book that pass effective activation.
pub fn compile_book(book: &RuleBook) -> Vec<Directive> {
    compile_rules(book.active_rules())
}

fn compile_rules<'r>(rules: impl Iterator<Item = &'r Rule>) -> Vec<Directive> {
    let mut directives = Vec::new();
    let mut skipped = 0usize;

    for rule in rules {
        if rule.disabled {
            skipped += 1;
            continue;
        }
        match directive_kind(rule) {
            Some(kind) => {
                let id = directives.len() as u32 + 1;
                directives.push(Directive { id, kind });
            }
            None => {
                if !rule.from_url.is_empty() && !rule.to_url.is_empty() {
                    log::warn!(
                        "skipping rule '{}': more than one wildcard marker",
                        rule.display_name()
                    );
                }
                skipped += 1;
            }
        }
    }

    log::debug!(
        "compiled {} directives ({} rules skipped)",
        directives.len(),
        skipped
    );
    directives
}

/// Pick the directive form for one rule, or `None` if it is not actionable.
pub fn directive_kind(rule: &Rule) -> Option<DirectiveKind> {
    let target = PatternShape::classify(&rule.to_url);
    if !target.is_actionable() {
        return None;
    }

    match PatternShape::classify(&rule.from_url) {
        PatternShape::Exact(match_url) if has_filter_syntax(match_url) => {
            Some(DirectiveKind::FixedRegex {
                regex: format!("^{}$", escape_regex(match_url)),
                redirect_url: rule.to_url.clone(),
            })
        }
        PatternShape::Exact(match_url) => Some(DirectiveKind::Exact {
            match_url: match_url.to_string(),
            redirect_url: rule.to_url.clone(),
        }),
        PatternShape::Wildcard(source) => match target {
            PatternShape::Wildcard(dest) => Some(DirectiveKind::RegexCapture {
                regex: capture_regex(&source),
                substitution: substitution_template(&dest),
            }),
            _ if has_filter_syntax(source.prefix) || has_filter_syntax(source.suffix) => {
                Some(DirectiveKind::FixedRegex {
                    regex: format!(
                        "^{}.*{}$",
                        escape_regex(source.prefix),
                        escape_regex(source.suffix)
                    ),
                    redirect_url: rule.to_url.clone(),
                })
            }
            _ => Some(DirectiveKind::PrefixWildcard {
                url_pattern: source.fill("*"),
                redirect_url: rule.to_url.clone(),
            }),
        },
        PatternShape::Empty | PatternShape::Invalid => None,
    }
}

/// Characters a native URL filter gives meaning to (`*` wildcard, `^`
/// separator, `|` anchor). Literal text holding them cannot be a URL filter.
const URL_FILTER_META: &[char] = &['*', '^', '|'];

fn has_filter_syntax(literal: &str) -> bool {
    literal.contains(URL_FILTER_META)
}

// =============================================================================
// Regex Construction
// =============================================================================

const REGEX_META: &[char] = &[
    '.', '*', '+', '?', '^', '$', '{', '}', '(', ')', '|', '[', ']', '\\',
];

/// Escape regex metacharacters in a literal URL segment.
pub fn escape_regex(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len() + 8);
    for ch in literal.chars() {
        if REGEX_META.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Anchored regex capturing the wildcard text as group 1.
///
/// With a suffix the capture is lazy so it stops at the suffix; without one
/// it runs to the end of the URL.
pub fn capture_regex(pattern: &WildcardPattern<'_>) -> String {
    if pattern.suffix.is_empty() {
        format!("^{}(.*)$", escape_regex(pattern.prefix))
    } else {
        format!(
            "^{}(.*?){}$",
            escape_regex(pattern.prefix),
            escape_regex(pattern.suffix)
        )
    }
}

/// Substitution template placing group 1 at the target's marker.
///
/// Backslashes in the literal parts are doubled; the native engine reads a
/// lone backslash as the start of a group reference.
pub fn substitution_template(pattern: &WildcardPattern<'_>) -> String {
    let escape = |s: &str| s.replace('\\', "\\\\");
    format!("{}\\1{}", escape(pattern.prefix), escape(pattern.suffix))
}
