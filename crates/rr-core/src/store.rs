//! In-memory rule book
//!
//! Holds the rule list, the section map and the global switch the extension
//! persists in its storage area. Every successful mutation bumps a
//! generation counter; the directive installer uses it to drop stale
//! installs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{effective, MatchResult, Rule, Section, DEFAULT_SECTION};

/// Error type for rule book mutations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Rule index {index} out of range (rule count {len})")]
    RuleIndexOutOfRange { index: usize, len: usize },
    #[error("Unknown section: {0}")]
    UnknownSection(String),
    #[error("Section already exists: {0}")]
    SectionExists(String),
    #[error("Section name must not be empty")]
    EmptySectionName,
    #[error("Cannot delete the only remaining section: {0}")]
    LastSection(String),
}

/// Serialized form of the rule book.
///
/// Sections missing from `sections` are enabled; only an explicit `false`
/// disables one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub sections: BTreeMap<String, bool>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            enabled: true,
            sections: BTreeMap::new(),
            rules: Vec::new(),
        }
    }
}

/// A partial update applied by [`RuleBook::update_rule`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleEdit {
    pub from_url: Option<String>,
    pub to_url: Option<String>,
    pub name: Option<String>,
    pub section: Option<String>,
    pub disabled: Option<bool>,
}

impl RuleEdit {
    fn apply(self, rule: &mut Rule) {
        if let Some(from_url) = self.from_url {
            rule.from_url = from_url;
        }
        if let Some(to_url) = self.to_url {
            rule.to_url = to_url;
        }
        if let Some(name) = self.name {
            rule.name = name;
        }
        if let Some(section) = self.section {
            rule.section = section;
        }
        if let Some(disabled) = self.disabled {
            rule.disabled = disabled;
        }
        rule.normalize();
    }
}

// =============================================================================
// Rule Book
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleBook {
    enabled: bool,
    sections: Vec<Section>,
    rules: Vec<Rule>,
    generation: u64,
}

impl Default for RuleBook {
    fn default() -> Self {
        Self {
            enabled: true,
            sections: vec![Section::new(DEFAULT_SECTION)],
            rules: Vec::new(),
            generation: 0,
        }
    }
}

impl RuleBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a rule book from its stored form.
    ///
    /// Sections are registered in the order they are first seen in the
    /// section map, then in the rule list.
    pub fn from_state(state: StoreState) -> Self {
        let mut book = Self {
            enabled: state.enabled,
            sections: Vec::new(),
            rules: Vec::with_capacity(state.rules.len()),
            generation: 0,
        };

        for (name, enabled) in &state.sections {
            let name = name.trim();
            if name.is_empty() || book.has_section(name) {
                continue;
            }
            book.sections.push(Section {
                name: name.to_string(),
                enabled: *enabled,
            });
        }

        for mut rule in state.rules {
            rule.normalize();
            book.observe_section(&rule.section);
            book.rules.push(rule);
        }

        if book.sections.is_empty() {
            book.sections.push(Section::new(DEFAULT_SECTION));
        }

        book
    }

    pub fn to_state(&self) -> StoreState {
        StoreState {
            enabled: self.enabled,
            sections: self
                .sections
                .iter()
                .map(|s| (s.name.clone(), s.enabled))
                .collect(),
            rules: self.rules.clone(),
        }
    }

    /// Mutation counter; increases on every successful change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number further mutations after `generation`, so a reloaded book is
    /// never older than the one it replaces.
    pub fn continue_from(&mut self, generation: u64) {
        self.generation = self.generation.max(generation.saturating_add(1));
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.touch();
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.iter().any(|s| s.name == name)
    }

    /// Unknown sections count as enabled.
    pub fn section_enabled(&self, name: &str) -> bool {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .map_or(true, |s| s.enabled)
    }

    pub fn rules_in_section<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s Rule> + 's {
        self.rules.iter().filter(move |r| r.section == name)
    }

    // -------------------------------------------------------------------------
    // Activation
    // -------------------------------------------------------------------------

    pub fn is_rule_active(&self, rule: &Rule) -> bool {
        effective(rule, self.enabled, self.section_enabled(&rule.section))
    }

    /// Rules passing effective activation, in list order.
    pub fn active_rules(&self) -> impl Iterator<Item = &Rule> + '_ {
        self.rules.iter().filter(move |r| self.is_rule_active(r))
    }

    /// First active rule matching `url`, with its index and match result.
    pub fn find_redirect(&self, url: &str) -> Option<(usize, MatchResult)> {
        self.rules.iter().enumerate().find_map(|(index, rule)| {
            if !self.is_rule_active(rule) {
                return None;
            }
            let result = rule.test(url);
            result.matched.then_some((index, result))
        })
    }

    // -------------------------------------------------------------------------
    // Rule CRUD
    // -------------------------------------------------------------------------

    /// Append a rule, registering its section if new. Returns its index.
    pub fn add_rule(&mut self, mut rule: Rule) -> usize {
        rule.normalize();
        self.observe_section(&rule.section);
        self.rules.push(rule);
        self.touch();
        self.rules.len() - 1
    }

    /// Append imported rules. Returns the number added.
    pub fn import_rules(&mut self, rules: Vec<Rule>) -> usize {
        let count = rules.len();
        for mut rule in rules {
            rule.normalize();
            self.observe_section(&rule.section);
            self.rules.push(rule);
        }
        if count > 0 {
            self.touch();
        }
        count
    }

    pub fn update_rule(&mut self, index: usize, edit: RuleEdit) -> Result<(), StoreError> {
        let len = self.rules.len();
        let rule = self
            .rules
            .get_mut(index)
            .ok_or(StoreError::RuleIndexOutOfRange { index, len })?;
        edit.apply(rule);
        let section = rule.section.clone();
        self.observe_section(&section);
        self.touch();
        Ok(())
    }

    pub fn remove_rule(&mut self, index: usize) -> Result<Rule, StoreError> {
        if index >= self.rules.len() {
            return Err(StoreError::RuleIndexOutOfRange {
                index,
                len: self.rules.len(),
            });
        }
        let rule = self.rules.remove(index);
        self.touch();
        Ok(rule)
    }

    // -------------------------------------------------------------------------
    // Section CRUD
    // -------------------------------------------------------------------------

    pub fn add_section(&mut self, name: &str) -> Result<(), StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptySectionName);
        }
        if self.has_section(name) {
            return Err(StoreError::SectionExists(name.to_string()));
        }
        self.sections.push(Section::new(name));
        self.touch();
        Ok(())
    }

    /// Rename a section; member rules follow and the switch is preserved.
    pub fn rename_section(&mut self, old: &str, new: &str) -> Result<(), StoreError> {
        let new = new.trim();
        if new.is_empty() {
            return Err(StoreError::EmptySectionName);
        }
        let pos = self
            .sections
            .iter()
            .position(|s| s.name == old)
            .ok_or_else(|| StoreError::UnknownSection(old.to_string()))?;
        if old == new {
            return Ok(());
        }
        if self.has_section(new) {
            return Err(StoreError::SectionExists(new.to_string()));
        }

        self.sections[pos].name = new.to_string();
        for rule in self.rules.iter_mut().filter(|r| r.section == old) {
            rule.section = new.to_string();
        }
        self.touch();
        Ok(())
    }

    /// Delete a section and every rule in it. Returns the number of rules
    /// removed.
    pub fn remove_section(&mut self, name: &str) -> Result<usize, StoreError> {
        let pos = self
            .sections
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| StoreError::UnknownSection(name.to_string()))?;
        if self.sections.len() == 1 {
            return Err(StoreError::LastSection(name.to_string()));
        }

        self.sections.remove(pos);
        let before = self.rules.len();
        self.rules.retain(|r| r.section != name);
        let removed = before - self.rules.len();
        log::debug!("removed section '{}' with {} rules", name, removed);
        self.touch();
        Ok(removed)
    }

    pub fn set_section_enabled(&mut self, name: &str, enabled: bool) -> Result<(), StoreError> {
        let section = self
            .sections
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| StoreError::UnknownSection(name.to_string()))?;
        section.enabled = enabled;
        self.touch();
        Ok(())
    }

    fn observe_section(&mut self, name: &str) {
        if !self.has_section(name) {
            self.sections.push(Section::new(name));
        }
    }

    fn touch(&mut self) {
        self.generation = self.generation.saturating_add(1);
    }
}
