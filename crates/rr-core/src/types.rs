//! Core type definitions for Reroute
//!
//! These types map directly to the JSON documents the extension keeps in
//! its storage area and exchanges through rule import/export.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::pattern::{self, PatternShape};

/// The two-character wildcard marker accepted in rule patterns.
pub const WILDCARD: &str = "**";

/// Section assigned to rules that do not name one.
pub const DEFAULT_SECTION: &str = "Default";

fn default_section() -> String {
    DEFAULT_SECTION.to_string()
}

// =============================================================================
// Rules
// =============================================================================

/// A single redirect rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Rule {
    /// Source pattern, optionally holding one `**` marker
    pub from_url: String,
    /// Destination pattern, optionally holding one `**` marker
    pub to_url: String,
    /// Display label; empty means "derive from URLs"
    #[serde(default)]
    pub name: String,
    /// Section the rule belongs to
    #[serde(default = "default_section")]
    pub section: String,
    /// Per-rule kill switch
    #[serde(default)]
    pub disabled: bool,
}

impl Rule {
    /// Create an enabled rule in the default section.
    pub fn new(from_url: impl Into<String>, to_url: impl Into<String>) -> Self {
        Self {
            from_url: from_url.into(),
            to_url: to_url.into(),
            name: String::new(),
            section: default_section(),
            disabled: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn in_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self.normalize();
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Apply at-rest defaults (a rule never lives without a section).
    pub fn normalize(&mut self) {
        let trimmed = self.section.trim();
        if trimmed.is_empty() {
            self.section = default_section();
        } else if trimmed.len() != self.section.len() {
            self.section = trimmed.to_string();
        }
    }

    /// Label shown in the popup and history.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("{} -> {}", self.from_url, self.to_url)
        } else {
            self.name.clone()
        }
    }

    /// Both URLs are present and neither holds more than one wildcard.
    pub fn is_well_formed(&self) -> bool {
        !matches!(
            PatternShape::classify(&self.from_url),
            PatternShape::Empty | PatternShape::Invalid
        ) && !matches!(
            PatternShape::classify(&self.to_url),
            PatternShape::Empty | PatternShape::Invalid
        )
    }

    /// Test a candidate URL against this rule.
    ///
    /// Activation is not considered here; see [`effective`].
    pub fn test(&self, candidate: &str) -> MatchResult {
        pattern::test_url(&self.from_url, &self.to_url, candidate)
    }
}

/// Effective activation of a rule.
///
/// Every input must independently hold: the global switch, the section
/// switch, the rule's own switch, and both URLs being present.
pub fn effective(rule: &Rule, global_enabled: bool, section_enabled: bool) -> bool {
    global_enabled
        && section_enabled
        && !rule.disabled
        && !rule.from_url.is_empty()
        && !rule.to_url.is_empty()
}

// =============================================================================
// Sections
// =============================================================================

/// A named, independently toggleable group of rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub enabled: bool,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
        }
    }
}

// =============================================================================
// Resource Types (bit mask for the native engine's resource filter)
// =============================================================================

bitflags::bitflags! {
    /// Resource fetch categories a directive applies to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceType: u8 {
        const MAIN_FRAME = 1 << 0;
        const SUB_FRAME = 1 << 1;
        const STYLESHEET = 1 << 2;
        const SCRIPT = 1 << 3;
        const IMAGE = 1 << 4;
        const XMLHTTPREQUEST = 1 << 5;
        const OTHER = 1 << 6;

        /// Every category a redirect directive covers
        const ALL = 0x7F;
    }
}

const RESOURCE_TYPE_NAMES: [(ResourceType, &str); 7] = [
    (ResourceType::MAIN_FRAME, "main_frame"),
    (ResourceType::SUB_FRAME, "sub_frame"),
    (ResourceType::STYLESHEET, "stylesheet"),
    (ResourceType::SCRIPT, "script"),
    (ResourceType::IMAGE, "image"),
    (ResourceType::XMLHTTPREQUEST, "xmlhttprequest"),
    (ResourceType::OTHER, "other"),
];

impl ResourceType {
    /// Parse from browser resource type string.
    pub fn from_str(s: &str) -> Self {
        match s {
            "main_frame" | "document" => Self::MAIN_FRAME,
            "sub_frame" | "subdocument" => Self::SUB_FRAME,
            "stylesheet" | "css" => Self::STYLESHEET,
            "script" | "js" => Self::SCRIPT,
            "image" | "img" => Self::IMAGE,
            "xmlhttprequest" | "xhr" | "fetch" => Self::XMLHTTPREQUEST,
            _ => Self::OTHER,
        }
    }

    /// Browser names of the set categories, in a fixed order.
    pub fn names(self) -> Vec<&'static str> {
        RESOURCE_TYPE_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

// =============================================================================
// Match Result
// =============================================================================

/// Result of testing one candidate URL against one rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MatchResult {
    pub matched: bool,
    /// Destination URL when matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    /// Text captured by the `**` marker of a wildcard source pattern
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_text: Option<String>,
}

impl MatchResult {
    pub fn no_match() -> Self {
        Self::default()
    }
}
