//! Redirect history
//!
//! The debug panel shows a running redirect counter and the most recent
//! redirects. Both live behind the [`RedirectLog`] trait so the matcher and
//! compiler never own process-wide state.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Entries kept by default.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// One performed redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RedirectEntry {
    pub from_url: String,
    pub to_url: String,
    /// Display name of the rule that fired
    pub rule_name: String,
    /// Milliseconds since the Unix epoch, as reported by the browser
    #[ts(type = "number")]
    pub timestamp_ms: u64,
}

/// Append-only sink for performed redirects.
pub trait RedirectLog {
    fn record(&mut self, entry: RedirectEntry);
}

/// Drop-oldest ring of recent redirects plus a lifetime counter.
#[derive(Debug, Clone)]
pub struct BoundedHistory {
    capacity: usize,
    entries: VecDeque<RedirectEntry>,
    total: u64,
}

impl Default for BoundedHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl BoundedHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            total: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Redirects recorded since creation, including dropped ones.
    pub fn total_redirects(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &RedirectEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&RedirectEntry> {
        self.entries.back()
    }

    /// Drop retained entries; the counter is kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl RedirectLog for BoundedHistory {
    fn record(&mut self, entry: RedirectEntry) {
        self.total += 1;
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: u64) -> RedirectEntry {
        RedirectEntry {
            from_url: format!("https://a.com/{n}"),
            to_url: format!("https://b.com/{n}"),
            rule_name: "mirror".to_string(),
            timestamp_ms: n,
        }
    }

    #[test]
    fn drops_oldest_beyond_capacity() {
        let mut history = BoundedHistory::new(3);
        for n in 0..5 {
            history.record(entry(n));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.total_redirects(), 5);
        let kept: Vec<u64> = history.entries().map(|e| e.timestamp_ms).collect();
        assert_eq!(kept, vec![2, 3, 4]);
        assert_eq!(history.latest().map(|e| e.timestamp_ms), Some(4));
    }

    #[test]
    fn zero_capacity_only_counts() {
        let mut history = BoundedHistory::new(0);
        history.record(entry(1));
        assert!(history.is_empty());
        assert_eq!(history.total_redirects(), 1);
    }

    #[test]
    fn clear_keeps_counter() {
        let mut history = BoundedHistory::default();
        history.record(entry(1));
        history.record(entry(2));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.total_redirects(), 2);
        assert_eq!(history.capacity(), DEFAULT_HISTORY_CAPACITY);
    }
}
