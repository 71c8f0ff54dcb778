//! Bounded, deduplicated caption log

use crate::labels::Label;
use std::collections::VecDeque;

/// Ordered list of confirmed labels, newest last
///
/// A label equal to the current last entry is never appended again, and only
/// the K most recent entries are kept.
#[derive(Debug, Clone)]
pub struct CaptionLog {
    entries: VecDeque<Label>,
    capacity: usize,
}

impl CaptionLog {
    /// Create an empty log keeping at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a label; returns whether the log changed
    pub fn append(&mut self, label: Label) -> bool {
        if self.entries.back() == Some(&label) {
            return false;
        }

        self.entries.push_back(label);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        true
    }

    /// Current caption text: entries joined by a single space
    pub fn render(&self) -> String {
        let mut text = String::new();
        for (i, label) in self.entries.iter().enumerate() {
            if i > 0 {
                text.push(' ');
            }
            text.push_str(label.as_str());
        }
        text
    }

    pub fn last(&self) -> Option<&Label> {
        self.entries.back()
    }

    /// Entries oldest first
    pub fn entries(&self) -> impl Iterator<Item = &Label> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(log: &CaptionLog) -> Vec<&str> {
        log.entries().map(|l| l.as_str()).collect()
    }

    #[test]
    fn test_empty_log_renders_empty_string() {
        let log = CaptionLog::new(5);
        assert_eq!(log.render(), "");
        assert!(log.last().is_none());
    }

    #[test]
    fn test_consecutive_duplicates_are_dropped() {
        let mut log = CaptionLog::new(5);
        assert!(log.append("hello".into()));
        assert!(!log.append("hello".into()));
        assert_eq!(labels(&log), vec!["hello"]);

        assert!(log.append("thanks".into()));
        assert!(log.append("hello".into()));
        assert_eq!(log.render(), "hello thanks hello");
    }

    #[test]
    fn test_bounded_to_capacity() {
        let mut log = CaptionLog::new(5);
        for name in ["l1", "l2", "l3", "l4", "l5", "l6"] {
            log.append(name.into());
        }

        assert_eq!(log.len(), 5);
        assert_eq!(labels(&log), vec!["l2", "l3", "l4", "l5", "l6"]);
        assert_eq!(log.render(), "l2 l3 l4 l5 l6");
    }

    #[test]
    fn test_render_is_pure() {
        let mut log = CaptionLog::new(3);
        log.append("how".into());
        log.append("you".into());

        let first = log.render();
        let second = log.render();
        assert_eq!(first, second);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_duplicate_of_evicted_entry_is_allowed() {
        let mut log = CaptionLog::new(2);
        log.append("a".into());
        log.append("b".into());
        log.append("c".into());
        assert!(log.append("a".into()));
        assert_eq!(labels(&log), vec!["c", "a"]);
    }
}
