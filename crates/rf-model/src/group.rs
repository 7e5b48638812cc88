//! User-defined groups of feed identities.

use serde::{Deserialize, Serialize};

/// A named membership list, re-expanded into a merged feed on every refresh.
///
/// `feed_links` never holds duplicates; insertion order is kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub title: String,
    pub feed_links: Vec<String>,
}

impl Group {
    pub fn new<I, S>(title: impl Into<String>, feed_links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut group = Self {
            title: title.into(),
            feed_links: Vec::new(),
        };
        group.absorb(feed_links);
        group
    }

    /// Union `feed_links` into the membership. Returns how many were new.
    pub fn absorb<I, S>(&mut self, feed_links: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.feed_links.len();
        for link in feed_links {
            let link = link.into();
            if !self.feed_links.contains(&link) {
                self.feed_links.push(link);
            }
        }
        self.feed_links.len() - before
    }

    pub fn contains(&self, feed_link: &str) -> bool {
        self.feed_links.iter().any(|l| l == feed_link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_drops_duplicates() {
        let group = Group::new("G", ["u1", "u2", "u1"]);
        assert_eq!(group.feed_links, vec!["u1", "u2"]);
    }

    #[test]
    fn absorb_is_a_union() {
        let mut group = Group::new("G", ["u1", "u2"]);
        let added = group.absorb(["u2", "u3"]);
        assert_eq!(added, 1);
        assert_eq!(group.feed_links, vec!["u1", "u2", "u3"]);
    }

    #[test]
    fn absorb_same_members_is_idempotent() {
        let mut group = Group::new("G", ["u1", "u2"]);
        assert_eq!(group.absorb(["u1", "u2"]), 0);
        assert_eq!(group.feed_links, vec!["u1", "u2"]);
    }

    #[test]
    fn contains_member() {
        let group = Group::new("G", ["u1"]);
        assert!(group.contains("u1"));
        assert!(!group.contains("u2"));
    }
}
