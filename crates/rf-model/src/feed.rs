//! Feed and item types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Color value of a feed that has not been through the color collaborator yet.
pub const UNASSIGNED_COLOR: i32 = -1;

/// Color given to feeds produced by the merge engine.
pub const NEUTRAL_COLOR: i32 = 15;

const DISPLAY_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A merged feed was asked for its single source identity.
    #[error("merged feed \"{title}\" has no single source identity")]
    MergedFeedHasNoIdentity { title: String },
    /// A non-merged feed carries no feed link at all.
    #[error("feed \"{title}\" has no feed link")]
    MissingFeedLink { title: String },
}

/// One article/entry of a feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    /// Identity of the source feed this item came from. Survives merges.
    pub belong: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub pub_date: DateTime<Utc>,
    /// Color of the source feed, kept so merged views can tag rows.
    pub color: i32,
}

impl Item {
    /// Publish time in the `YYYY/MM/DD HH:MM:SS` display form.
    pub fn format_time(&self) -> String {
        self.pub_date.format(DISPLAY_TIME_FORMAT).to_string()
    }
}

/// A named collection of items from one or more sources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feed {
    pub title: String,
    pub description: String,
    /// Site URL, display only.
    pub link: String,
    /// Source identities merged into this feed. Exactly one for a plain feed.
    pub feed_links: Vec<String>,
    /// Opaque display hint. Negative means unassigned.
    pub color: i32,
    /// Sorted by descending publish time.
    pub items: Vec<Item>,
    /// Set on engine-produced feeds so a single-source merge still counts as merged.
    #[serde(default)]
    pub merged: bool,
    /// Title forced by the user; re-applied on every fetch.
    #[serde(default)]
    pub title_override: Option<String>,
    /// Group this feed was expanded from. `None` for fetched feeds.
    #[serde(default)]
    pub group: Option<String>,
}

impl Feed {
    /// A feed known only by its source, waiting for its first refresh.
    pub fn pending(source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            title: source.clone(),
            description: String::new(),
            link: String::new(),
            feed_links: vec![source],
            color: UNASSIGNED_COLOR,
            items: Vec::new(),
            merged: false,
            title_override: None,
            group: None,
        }
    }

    pub fn is_merged(&self) -> bool {
        self.merged || self.feed_links.len() > 1
    }

    /// Produced by the merge engine rather than fetched, including a
    /// single-source group that was left unmerged.
    pub fn is_group_output(&self) -> bool {
        self.group.is_some() || self.is_merged()
    }

    pub fn has_color(&self) -> bool {
        self.color >= 0
    }

    /// The single feed link of a plain feed.
    pub fn identity(&self) -> Result<&str, ModelError> {
        if self.is_merged() {
            return Err(ModelError::MergedFeedHasNoIdentity {
                title: self.title.clone(),
            });
        }
        self.feed_links
            .first()
            .map(String::as_str)
            .ok_or_else(|| ModelError::MissingFeedLink {
                title: self.title.clone(),
            })
    }

    /// The string the cache keys this feed by: its title when it is a group
    /// output, its feed link otherwise.
    pub fn cache_identity(&self) -> Result<&str, ModelError> {
        if self.is_group_output() {
            Ok(&self.title)
        } else {
            self.identity()
        }
    }

    pub fn sort_items(&mut self) {
        sort_items(&mut self.items);
    }

    /// Take over the content of a freshly fetched copy of this feed.
    ///
    /// The existing color wins unless it was never assigned; items are
    /// re-tagged with whichever color is kept.
    pub fn apply_fetched(&mut self, fresh: Feed) {
        if !self.has_color() {
            self.color = fresh.color;
        }
        self.title = fresh.title;
        self.description = fresh.description;
        self.link = fresh.link;
        self.items = fresh.items;
        let color = self.color;
        for item in &mut self.items {
            item.color = color;
        }
    }

    /// Replace the content with a failure placeholder. Feed links, color and
    /// title override are kept so the next refresh can recover.
    ///
    /// Live items are cleared; the last good copy stays in the cache only.
    pub fn mark_failed(&mut self, reason: &str) {
        let label = match &self.title_override {
            Some(title) => title.clone(),
            None => self.feed_links.first().cloned().unwrap_or_default(),
        };
        self.title = format!("[fetch failed] {label}: {reason}");
        self.description = reason.to_string();
        self.link.clear();
        self.items.clear();
    }
}

/// Stable sort by publish time, newest first.
pub fn sort_items(items: &mut [Item]) {
    items.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(title: &str, secs: i64) -> Item {
        Item {
            belong: "https://example.com/feed".to_string(),
            title: title.to_string(),
            description: String::new(),
            link: format!("https://example.com/{title}"),
            pub_date: Utc.timestamp_opt(secs, 0).unwrap(),
            color: 3,
        }
    }

    #[test]
    fn sort_items_newest_first() {
        let mut items = vec![item("old", 100), item("new", 300), item("mid", 200)];
        sort_items(&mut items);
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);
    }

    #[test]
    fn sort_items_keeps_tie_order() {
        let mut items = vec![item("a", 100), item("b", 100), item("c", 200)];
        sort_items(&mut items);
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "a", "b"]);
    }

    #[test]
    fn sort_items_idempotent() {
        let mut once = vec![item("x", 5), item("y", 9), item("z", 5), item("w", 1)];
        sort_items(&mut once);
        let mut twice = once.clone();
        sort_items(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn pending_feed_has_single_identity() {
        let feed = Feed::pending("https://example.com/rss");
        assert!(!feed.is_merged());
        assert!(!feed.has_color());
        assert_eq!(feed.identity().unwrap(), "https://example.com/rss");
        assert_eq!(feed.cache_identity().unwrap(), "https://example.com/rss");
    }

    #[test]
    fn merged_feed_has_no_identity() {
        let mut feed = Feed::pending("u1");
        feed.feed_links.push("u2".to_string());
        feed.title = "G".to_string();
        assert!(feed.is_merged());
        assert_eq!(
            feed.identity(),
            Err(ModelError::MergedFeedHasNoIdentity {
                title: "G".to_string()
            })
        );
        assert_eq!(feed.cache_identity().unwrap(), "G");
    }

    #[test]
    fn merged_flag_counts_with_single_link() {
        let mut feed = Feed::pending("u1");
        feed.merged = true;
        assert!(feed.is_merged());
        assert!(feed.identity().is_err());
    }

    #[test]
    fn unmerged_group_output_is_keyed_by_title() {
        let mut feed = Feed::pending("u1");
        feed.title = "Solo".to_string();
        feed.group = Some("Solo".to_string());
        assert!(!feed.is_merged());
        assert!(feed.is_group_output());
        assert_eq!(feed.identity().unwrap(), "u1");
        assert_eq!(feed.cache_identity().unwrap(), "Solo");
    }

    #[test]
    fn missing_link_is_an_error() {
        let mut feed = Feed::pending("u1");
        feed.feed_links.clear();
        assert!(matches!(
            feed.identity(),
            Err(ModelError::MissingFeedLink { .. })
        ));
    }

    #[test]
    fn apply_fetched_keeps_assigned_color() {
        let mut feed = Feed::pending("u1");
        feed.color = 0;
        let mut fresh = Feed::pending("u1");
        fresh.title = "Fresh".to_string();
        fresh.color = 42;
        fresh.items = vec![item("a", 10)];

        feed.apply_fetched(fresh);

        assert_eq!(feed.title, "Fresh");
        assert_eq!(feed.color, 0);
        assert_eq!(feed.items[0].color, 0);
    }

    #[test]
    fn apply_fetched_takes_color_when_unset() {
        let mut feed = Feed::pending("u1");
        let mut fresh = Feed::pending("u1");
        fresh.color = 42;
        feed.apply_fetched(fresh);
        assert_eq!(feed.color, 42);
    }

    #[test]
    fn mark_failed_clears_live_items_and_keeps_links() {
        let mut feed = Feed::pending("u1");
        feed.items = vec![item("a", 10)];
        feed.mark_failed("connection refused");
        assert!(feed.items.is_empty());
        assert!(feed.title.contains("u1"));
        assert!(feed.title.contains("connection refused"));
        assert_eq!(feed.description, "connection refused");
        assert_eq!(feed.identity().unwrap(), "u1");
    }

    #[test]
    fn mark_failed_prefers_title_override() {
        let mut feed = Feed::pending("curl -s example.com | scrape");
        feed.title_override = Some("Scraped".to_string());
        feed.mark_failed("exit status 1");
        assert!(feed.title.contains("Scraped"));
    }

    #[test]
    fn format_time_display() {
        let it = Item {
            pub_date: Utc.with_ymd_and_hms(2023, 1, 2, 15, 4, 5).unwrap(),
            ..item("a", 0)
        };
        assert_eq!(it.format_time(), "2023/01/02 15:04:05");
    }
}
