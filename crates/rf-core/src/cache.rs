//! Content-addressed cache of feeds and groups.
//!
//! Every entry is a single file named by the lowercase hex MD5 of its
//! identity: the feed link of a plain feed, the title of a merged feed or of
//! a group. Feeds and groups live in separate directories. File contents are
//! a private bincode encoding and are not meant to be read by anything else.
//!
//! Writes are plain `fs::write`; a crash mid-write can leave a truncated
//! file, which later fails to decode and is skipped with a warning.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use rf_model::{Feed, Group, ModelError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to encode cache entry: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("cache I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Deleting an entry that is missing or cannot be removed.
    #[error("failed to remove {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Identity(#[from] ModelError),
}

/// File name for `identity`.
pub fn cache_key(identity: &str) -> String {
    hex::encode(Md5::digest(identity.as_bytes()))
}

/// Every regular file below `dir`, sorted. A missing directory is empty.
pub fn list_all(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();
    paths
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    feed_dir: PathBuf,
    group_dir: PathBuf,
}

impl CacheStore {
    pub fn new(feed_dir: impl Into<PathBuf>, group_dir: impl Into<PathBuf>) -> Self {
        Self {
            feed_dir: feed_dir.into(),
            group_dir: group_dir.into(),
        }
    }

    pub fn feed_dir(&self) -> &Path {
        &self.feed_dir
    }

    pub fn group_dir(&self) -> &Path {
        &self.group_dir
    }

    pub fn feed_path(&self, identity: &str) -> PathBuf {
        self.feed_dir.join(cache_key(identity))
    }

    pub fn group_path(&self, title: &str) -> PathBuf {
        self.group_dir.join(cache_key(title))
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Write `feed` under its cache identity, replacing any previous entry.
    pub fn save_feed(&self, feed: &Feed) -> Result<PathBuf, CacheError> {
        self.save_feed_as(feed.cache_identity()?, feed)
    }

    /// Write `feed` under an explicit identity.
    pub fn save_feed_as(&self, identity: &str, feed: &Feed) -> Result<PathBuf, CacheError> {
        let path = self.feed_path(identity);
        write_entry(&path, feed)?;
        debug!(identity, path = %path.display(), items = feed.items.len(), "cached feed");
        Ok(path)
    }

    pub fn save_group(&self, group: &Group) -> Result<PathBuf, CacheError> {
        let path = self.group_path(&group.title);
        write_entry(&path, group)?;
        debug!(group = %group.title, path = %path.display(), "cached group");
        Ok(path)
    }

    /// Move the entry of a feed previously cached as `old_identity` to the
    /// feed's current identity.
    pub fn rename_feed(&self, old_identity: &str, feed: &Feed) -> Result<PathBuf, CacheError> {
        let path = self.save_feed(feed)?;
        let old = self.feed_path(old_identity);
        if old != path {
            remove(&old)?;
        }
        Ok(path)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn load_feed(&self, path: &Path) -> Result<Feed, CacheError> {
        read_entry(path)
    }

    pub fn load_group(&self, path: &Path) -> Result<Group, CacheError> {
        read_entry(path)
    }

    /// Every decodable feed in the cache. Corrupt entries are logged and
    /// skipped.
    pub fn load_all_feeds(&self) -> Vec<Feed> {
        load_all(&self.feed_dir, |path| self.load_feed(path))
    }

    /// Every decodable group in the cache. Corrupt entries are logged and
    /// skipped.
    pub fn load_all_groups(&self) -> Vec<Group> {
        load_all(&self.group_dir, |path| self.load_group(path))
    }

    /// Whether some cached feed file carries the hash of `identity`.
    ///
    /// Compares hashes, not identities: two identities with colliding MD5
    /// count as the same entry.
    pub fn contains_identity(&self, identity: &str) -> bool {
        let key = cache_key(identity);
        list_all(&self.feed_dir)
            .iter()
            .any(|path| path.file_name().is_some_and(|name| name == key.as_str()))
    }

    // -----------------------------------------------------------------------
    // Deletes
    // -----------------------------------------------------------------------

    /// Remove the entry cached under `identity`. Missing entries are an error.
    pub fn delete_feed(&self, identity: &str) -> Result<(), CacheError> {
        remove(&self.feed_path(identity))
    }

    pub fn delete_group(&self, title: &str) -> Result<(), CacheError> {
        remove(&self.group_path(title))
    }
}

fn write_entry<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
    let bytes = bincode::serialize(value).map_err(CacheError::Encode)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| CacheError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, bytes).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_entry<T: DeserializeOwned>(path: &Path) -> Result<T, CacheError> {
    let bytes = fs::read(path).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    bincode::deserialize(&bytes).map_err(|source| CacheError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

fn remove(path: &Path) -> Result<(), CacheError> {
    fs::remove_file(path).map_err(|source| CacheError::RemoveFailed {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "removed cache entry");
    Ok(())
}

fn load_all<T>(dir: &Path, load: impl Fn(&Path) -> Result<T, CacheError>) -> Vec<T> {
    list_all(dir)
        .iter()
        .filter_map(|path| match load(path) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable cache entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rf_model::Item;

    fn store(dir: &Path) -> CacheStore {
        CacheStore::new(dir.join("feeds"), dir.join("groups"))
    }

    fn sample_feed(link: &str) -> Feed {
        let mut feed = Feed::pending(link);
        feed.title = "Example".to_string();
        feed.color = 0;
        feed.items = vec![Item {
            belong: link.to_string(),
            title: "entry".to_string(),
            description: "body".to_string(),
            link: "https://example.com/1".to_string(),
            pub_date: Utc.with_ymd_and_hms(2023, 1, 2, 15, 4, 5).unwrap(),
            color: 0,
        }];
        feed
    }

    #[test]
    fn cache_key_is_hex_md5() {
        assert_eq!(cache_key(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            cache_key("https://example.com/feed.xml").len(),
            32
        );
    }

    #[test]
    fn feed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let feed = sample_feed("https://example.com/feed.xml");

        let path = store.save_feed(&feed).unwrap();

        assert_eq!(path, store.feed_path("https://example.com/feed.xml"));
        assert_eq!(store.load_feed(&path).unwrap(), feed);
    }

    #[test]
    fn merged_feed_is_keyed_by_title() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let mut merged = sample_feed("u1");
        merged.feed_links.push("u2".to_string());
        merged.title = "G".to_string();

        let path = store.save_feed(&merged).unwrap();

        assert_eq!(path, store.feed_dir().join(cache_key("G")));
        assert_eq!(store.load_feed(&path).unwrap(), merged);
    }

    #[test]
    fn save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let mut feed = sample_feed("u1");
        store.save_feed(&feed).unwrap();
        feed.title = "Renamed".to_string();
        let path = store.save_feed(&feed).unwrap();

        assert_eq!(store.load_feed(&path).unwrap().title, "Renamed");
        assert_eq!(list_all(store.feed_dir()).len(), 1);
    }

    #[test]
    fn group_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let group = Group::new("G", ["u1", "u2"]);

        let path = store.save_group(&group).unwrap();

        assert!(path.starts_with(store.group_dir()));
        assert_eq!(store.load_group(&path).unwrap(), group);
    }

    #[test]
    fn contains_identity_compares_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(!store.contains_identity("u1"));
        store.save_feed(&sample_feed("u1")).unwrap();
        assert!(store.contains_identity("u1"));
        assert!(!store.contains_identity("u2"));
    }

    #[test]
    fn delete_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.save_feed(&sample_feed("u1")).unwrap();

        store.delete_feed("u1").unwrap();
        let err = store.delete_feed("u1").unwrap_err();

        assert!(matches!(err, CacheError::RemoveFailed { .. }));
    }

    #[test]
    fn delete_missing_group_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(dir.path()).delete_group("nope").unwrap_err();
        assert!(matches!(err, CacheError::RemoveFailed { .. }));
    }

    #[test]
    fn corrupt_entry_is_decode_error_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.save_feed(&sample_feed("u1")).unwrap();
        let bad = store.feed_path("u2");
        fs::write(&bad, b"\x01\x02").unwrap();

        assert!(matches!(
            store.load_feed(&bad),
            Err(CacheError::Decode { .. })
        ));
        let feeds = store.load_all_feeds();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].identity().unwrap(), "u1");
    }

    #[test]
    fn list_all_walks_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("top"), b"").unwrap();
        fs::write(nested.join("deep"), b"").unwrap();

        let paths = list_all(dir.path());
        assert_eq!(paths.len(), 2);
        assert!(list_all(&dir.path().join("missing")).is_empty());
    }

    #[test]
    fn rename_moves_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let mut merged = sample_feed("u1");
        merged.merged = true;
        merged.title = "Old".to_string();
        store.save_feed(&merged).unwrap();

        merged.title = "New".to_string();
        store.rename_feed("Old", &merged).unwrap();

        assert!(!store.feed_path("Old").exists());
        assert_eq!(
            store.load_feed(&store.feed_path("New")).unwrap().title,
            "New"
        );
    }

    #[test]
    fn plain_feed_without_link_cannot_be_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut feed = sample_feed("u1");
        feed.feed_links.clear();
        let err = store(dir.path()).save_feed(&feed).unwrap_err();
        assert!(matches!(err, CacheError::Identity(_)));
    }
}
