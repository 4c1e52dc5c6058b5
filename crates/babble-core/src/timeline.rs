//! Per-client timeline store.
//!
//! A timeline keeps the last `capacity` publications delivered to one
//! client (its own and those of the clients it follows) and a running
//! count of everything ever delivered. Older items are evicted first.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// One published message as stored in a timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    /// Login name of the publisher.
    pub author: String,
    pub text: String,
    pub published_at: DateTime<Utc>,
}

impl Publication {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Publication {
            author: author.into(),
            text: text.into(),
            published_at: Utc::now(),
        }
    }

    /// `[HH:MM:SS] author: text`
    pub fn render_line(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.published_at.format("%H:%M:%S"),
            self.author,
            self.text
        )
    }
}

/// Bounded ring of recent publications.
#[derive(Debug)]
pub struct Timeline {
    items: VecDeque<Publication>,
    capacity: usize,
    total: u64,
}

impl Timeline {
    /// A zero capacity is bumped to one so the latest item is always visible.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Timeline {
            items: VecDeque::with_capacity(capacity),
            capacity,
            total: 0,
        }
    }

    pub fn append(&mut self, publication: Publication) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(publication);
        self.total += 1;
    }

    /// Retained items, most recent first.
    pub fn render(&self) -> Vec<Publication> {
        self.items.iter().rev().cloned().collect()
    }

    /// Number of publications ever appended, including evicted ones.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_most_recent_first() {
        let mut t = Timeline::new(4);
        t.append(Publication::new("alice", "hello"));
        t.append(Publication::new("alice", "world"));

        let items = t.render();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "world");
        assert_eq!(items[1].text, "hello");
    }

    #[test]
    fn evicts_oldest_but_keeps_total() {
        let mut t = Timeline::new(2);
        for i in 0..5 {
            t.append(Publication::new("bob", format!("msg{}", i)));
        }

        assert_eq!(t.len(), 2);
        assert_eq!(t.total(), 5);
        let texts: Vec<_> = t.render().into_iter().map(|p| p.text).collect();
        assert_eq!(texts, vec!["msg4", "msg3"]);
    }

    #[test]
    fn render_line_contains_author_and_text() {
        let p = Publication::new("carol", "hi there");
        let line = p.render_line();
        assert!(line.starts_with('['));
        assert!(line.ends_with("carol: hi there"));
    }
}
