//! Rule file import and export
//!
//! The rule file is a flat JSON array of rule objects, with no wrapper and
//! no schema version. Import only requires `fromUrl` and `toUrl`; every
//! other field falls back to its default.

use serde_json::{Map, Value};

use crate::store::StoreState;
use crate::types::{Rule, DEFAULT_SECTION};

/// Error type for rule imports.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Rule file must be a JSON array of rules")]
    NotAnArray,
    #[error("No valid rules found (each rule needs fromUrl and toUrl)")]
    NoValidRules,
}

/// Parse a rule file.
///
/// Entries without string `fromUrl`/`toUrl` keys are skipped. Fails when
/// nothing valid remains, so callers can leave their store untouched.
pub fn parse_rules(text: &str) -> Result<Vec<Rule>, ImportError> {
    let value: Value = serde_json::from_str(text)?;
    let entries = value.as_array().ok_or(ImportError::NotAnArray)?;

    let mut rules = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        match entry.as_object().and_then(rule_from_object) {
            Some(rule) => rules.push(rule),
            None => log::warn!("skipping rule entry {}: missing fromUrl or toUrl", idx),
        }
    }

    if rules.is_empty() {
        return Err(ImportError::NoValidRules);
    }
    Ok(rules)
}

/// Parse either a rule file or a full store state document.
pub fn parse_document(text: &str) -> Result<StoreState, ImportError> {
    let value: Value = serde_json::from_str(text)?;
    if value.is_array() {
        return Ok(StoreState {
            rules: parse_rules(text)?,
            ..StoreState::default()
        });
    }
    if !value.is_object() {
        return Err(ImportError::NotAnArray);
    }
    Ok(serde_json::from_value(value)?)
}

/// Serialize rules into the rule file format.
pub fn export_rules(rules: &[Rule]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(rules)
}

fn rule_from_object(obj: &Map<String, Value>) -> Option<Rule> {
    let from_url = obj.get("fromUrl")?.as_str()?;
    let to_url = obj.get("toUrl")?.as_str()?;

    let mut rule = Rule {
        from_url: from_url.to_string(),
        to_url: to_url.to_string(),
        name: string_field(obj, "name").unwrap_or_default(),
        section: string_field(obj, "section").unwrap_or_else(|| DEFAULT_SECTION.to_string()),
        disabled: obj.get("disabled").and_then(Value::as_bool).unwrap_or(false),
    };
    rule.normalize();
    Some(rule)
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}
