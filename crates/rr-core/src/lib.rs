//! Reroute Core Library
//!
//! This crate provides the rule model and URL pattern matcher behind the
//! Reroute redirect extension.
//!
//! # Architecture
//!
//! A rule pairs a `fromUrl` pattern with a `toUrl` pattern. Each pattern may
//! hold a single `**` wildcard marker. The matcher decides whether a
//! candidate URL matches a rule and builds the destination URL; the
//! `rr-compiler` crate turns the same patterns into native declarative
//! redirect directives, sharing the [`pattern::WildcardPattern`] split so
//! that live previews and installed directives never disagree.
//!
//! # Modules
//!
//! - `types`: Rule, section and result types
//! - `pattern`: Wildcard pattern parsing and URL testing
//! - `store`: In-memory rule book (rules, sections, global switch)
//! - `io`: JSON import/export of rule files and store state
//! - `history`: Bounded redirect history

pub mod history;
pub mod io;
pub mod pattern;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use history::{BoundedHistory, RedirectEntry, RedirectLog};
pub use io::{export_rules, parse_document, parse_rules, ImportError};
pub use pattern::{test_url, PatternShape, WildcardPattern};
pub use store::{RuleBook, RuleEdit, StoreError, StoreState};
pub use types::{effective, MatchResult, ResourceType, Rule, Section, DEFAULT_SECTION, WILDCARD};
