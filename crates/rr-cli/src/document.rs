use std::fs;
use std::path::Path;

use rr_compiler::{compile_book, Directive, NativeRule};
use rr_core::{parse_document, RuleBook};

/// Load a rule file or store state document into a rule book.
pub fn load_book(path: &Path) -> Result<RuleBook, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    let state = parse_document(&text)
        .map_err(|e| format!("Failed to load '{}': {}", path.display(), e))?;
    let book = RuleBook::from_state(state);
    log::debug!(
        "loaded {} rules in {} sections from '{}'",
        book.rules().len(),
        book.sections().len(),
        path.display()
    );
    Ok(book)
}

/// Compile the active rules of a book into the native wire shape.
pub fn native_rules(book: &RuleBook) -> Vec<NativeRule> {
    compile_book(book).iter().map(Directive::to_native).collect()
}

pub fn write_output(path: &Path, text: &str) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    fs::write(path, text).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_core::Rule;

    #[test]
    fn native_rules_follow_activation() {
        let mut book = RuleBook::new();
        book.add_rule(Rule::new("https://a.com/**", "https://b.com/**"));
        book.add_rule(Rule::new("https://c.com/", "https://d.com/").disabled(true));
        let native = native_rules(&book);
        assert_eq!(native.len(), 1);
        assert_eq!(native[0].condition.regex_filter.as_deref(), Some("^https://a\\.com/(.*)$"));
    }

    #[test]
    fn load_book_reports_missing_file() {
        let err = load_book(Path::new("/nonexistent/rules.json")).expect_err("missing file");
        assert!(err.starts_with("Failed to read"));
    }
}
