//! Background-page state behind the wasm exports.
//!
//! Plain Rust so it can be tested without a JS host.

use rr_compiler::{compile_book, InstallOutcome, InstallPlan, Installer};
use rr_core::history::DEFAULT_HISTORY_CAPACITY;
use rr_core::{
    parse_document, parse_rules, BoundedHistory, ImportError, MatchResult, RedirectEntry,
    RedirectLog, Rule, RuleBook, StoreState,
};

pub struct EngineState {
    pub book: RuleBook,
    pub history: BoundedHistory,
    installer: Installer,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            book: RuleBook::new(),
            history: BoundedHistory::new(DEFAULT_HISTORY_CAPACITY),
            installer: Installer::new(),
        }
    }
}

impl EngineState {
    /// Replace the rule book with a stored state document (or rule array).
    pub fn load(&mut self, text: &str) -> Result<(), ImportError> {
        let state = parse_document(text)?;
        let mut book = RuleBook::from_state(state);
        book.continue_from(self.book.generation());
        self.book = book;
        Ok(())
    }

    pub fn state(&self) -> StoreState {
        self.book.to_state()
    }

    /// Append rules from a rule file. The book is untouched on error.
    pub fn import(&mut self, text: &str) -> Result<usize, ImportError> {
        let rules = parse_rules(text)?;
        Ok(self.book.import_rules(rules))
    }

    /// Ids currently present in the native engine, read at startup.
    pub fn adopt_installed(&mut self, ids: Vec<u32>) {
        self.installer = Installer::with_installed_ids(ids);
    }

    /// Compile the active rules into an in-flight replacement.
    pub fn prepare_install(&mut self) -> Option<InstallPlan> {
        let generation = self.book.generation();
        let directives = compile_book(&self.book);
        self.installer.plan(generation, &directives)
    }

    /// Record that the native engine accepted the plan for `generation`.
    pub fn commit_install(&mut self, generation: u64) -> Option<InstallOutcome> {
        let outcome = self.installer.commit_generation(generation);
        if outcome.is_none() {
            log::warn!("no pending install for generation {}", generation);
        }
        outcome
    }

    /// Record that the native engine rejected the plan for `generation`.
    pub fn abandon_install(&mut self, generation: u64) -> bool {
        self.installer.abandon(generation)
    }

    /// Match a navigated URL against the active rules and record a hit.
    pub fn observe(&mut self, url: &str, timestamp_ms: u64) -> Option<MatchResult> {
        let (index, result) = self.book.find_redirect(url)?;
        let rule_name = self
            .book
            .rule(index)
            .map(Rule::display_name)
            .unwrap_or_default();
        if let Some(to_url) = &result.redirect_url {
            self.history.record(RedirectEntry {
                from_url: url.to_string(),
                to_url: to_url.clone(),
                rule_name,
                timestamp_ms,
            });
        }
        Some(result)
    }
}
