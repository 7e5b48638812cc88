//! The live feed and group collections, and the refresh cycle over them.
//!
//! A refresh fetches every plain feed concurrently, each task writing only
//! its own slot of the feed list. Once all of them are done the results are
//! persisted and every group is re-expanded into its merged feed, so a
//! group never sees a half-refreshed set of members.
//!
//! Group outputs are keyed by their group's title, never fetched, and
//! rebuilt from their group on every refresh. A plain feed is never mistaken
//! for one, whatever its title.

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use rf_fetch::{FetchCause, FetchError, Fetcher};
use rf_model::{Feed, Group, Item, ModelError};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, CacheError, CacheStore};
use crate::config::{Config, MergePolicy};
use crate::merge;
use crate::sources::SourceList;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("failed to set up fetcher: {0}")]
    Fetcher(#[source] FetchCause),
    #[error("source list {path}: {source}")]
    Sources {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("empty feed source")]
    EmptySource,
    #[error("{0} is already tracked")]
    AlreadyTracked(String),
    #[error("no tracked feed with identity {0}")]
    UnknownFeed(String),
}

/// What happened to one feed during a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Fetched, applied and written to the cache.
    Updated { items: usize },
    /// The fetch failed; the feed now shows a failure placeholder and its
    /// cache entry is untouched.
    FetchFailed(String),
    /// Fetched and applied, but the cache write failed.
    PersistFailed(String),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    /// Per feed identity, in feed list order.
    pub outcomes: Vec<(String, FeedOutcome)>,
    /// Groups re-expanded after the fetches.
    pub groups: usize,
}

impl RefreshReport {
    pub fn outcome(&self, identity: &str) -> Option<&FeedOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == identity)
            .map(|(_, outcome)| outcome)
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, FeedOutcome::Updated { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| !matches!(o, FeedOutcome::Updated { .. }))
    }

    fn count(&self, pred: impl Fn(&FeedOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Change notifications for whoever renders the collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    FeedAdded { identity: String },
    FeedUpdated { identity: String },
    FeedFailed { identity: String, reason: String },
    FeedDeleted { key: String },
    GroupChanged { title: String },
    GroupDeleted { title: String },
    RefreshFinished { updated: usize, failed: usize },
}

/// Owner of the live feeds and groups.
pub struct Registry {
    feeds: Vec<Feed>,
    groups: Vec<Group>,
    cache: CacheStore,
    sources: SourceList,
    fetcher: Fetcher,
    policy: MergePolicy,
    concurrency: Option<usize>,
    events: broadcast::Sender<RegistryEvent>,
}

impl Registry {
    /// Load the cache and source list named by `config`, with the default
    /// HTTP/command fetcher.
    pub fn open(config: &Config) -> Result<Self, RegistryError> {
        let fetcher = Fetcher::new(&config.fetch.settings()).map_err(RegistryError::Fetcher)?;
        Self::with_fetcher(config, fetcher)
    }

    /// Like [`open`](Self::open) with a caller-supplied fetcher.
    ///
    /// Every decodable cached feed and group is loaded; each source-list
    /// line with no cached feed becomes a pending feed.
    pub fn with_fetcher(config: &Config, fetcher: Fetcher) -> Result<Self, RegistryError> {
        let cache = CacheStore::new(
            config.storage.resolve_cache_dir(),
            config.storage.resolve_group_dir(),
        );
        let sources = SourceList::new(config.storage.resolve_source_list());

        let groups = cache.load_all_groups();
        let mut feeds = cache.load_all_feeds();

        let known: HashSet<String> = feeds
            .iter()
            .filter(|feed| !feed.is_group_output())
            .filter_map(|feed| feed.identity().ok())
            .map(cache_key)
            .collect();
        let listed = sources.read().map_err(|source| RegistryError::Sources {
            path: sources.path().to_path_buf(),
            source,
        })?;
        for source in listed {
            if !known.contains(&cache_key(&source)) {
                debug!(source = %source, "tracking uncached source");
                feeds.push(Feed::pending(source));
            }
        }

        info!(
            feeds = feeds.len(),
            groups = groups.len(),
            cache = %cache.feed_dir().display(),
            "opened feed registry"
        );

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            feeds,
            groups,
            cache,
            sources,
            fetcher,
            policy: config.groups.single_source,
            concurrency: config.fetch.concurrency_limit(),
            events,
        })
    }

    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn sources(&self) -> &SourceList {
        &self.sources
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// The feed cached under `key`: a plain feed's identity, or the title of
    /// a merged feed.
    pub fn feed(&self, key: &str) -> Option<&Feed> {
        self.feeds
            .iter()
            .find(|feed| feed.cache_identity().is_ok_and(|k| k == key))
    }

    pub fn group(&self, title: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.title == title)
    }

    /// Group outputs first, then by title.
    pub fn sorted_feeds(&self) -> Vec<&Feed> {
        let mut view: Vec<&Feed> = self.feeds.iter().collect();
        view.sort_by(|a, b| {
            b.is_group_output()
                .cmp(&a.is_group_output())
                .then_with(|| a.title.cmp(&b.title))
        });
        view
    }

    /// The plain feed `item` was fetched from.
    pub fn source_of(&self, item: &Item) -> Option<&Feed> {
        self.find_plain(&item.belong).map(|i| &self.feeds[i])
    }

    // -----------------------------------------------------------------------
    // Refresh
    // -----------------------------------------------------------------------

    /// Refetch every plain feed, persist the successes, then re-expand every
    /// group.
    pub async fn refresh_all(&mut self) -> Result<RefreshReport, RegistryError> {
        let start = Instant::now();
        let targets: Vec<bool> = self
            .feeds
            .iter()
            .map(is_refreshable)
            .collect();
        let mut slots: Vec<Option<Result<usize, String>>> = vec![None; self.feeds.len()];

        let fetcher = &self.fetcher;
        stream::iter(
            self.feeds
                .iter_mut()
                .zip(slots.iter_mut())
                .zip(targets)
                .filter_map(|(slot, target)| target.then_some(slot)),
        )
        .for_each_concurrent(self.concurrency, |(feed, slot)| async move {
            *slot = Some(fetch_into(fetcher, feed).await);
        })
        .await;

        let mut report = RefreshReport::default();
        for (feed, slot) in self.feeds.iter().zip(slots) {
            if let Some(result) = slot {
                let outcome = self.settle(feed, result);
                report.outcomes.push((display_identity(feed), outcome));
            }
        }

        report.groups = self.expand_groups()?;

        info!(
            updated = report.updated(),
            failed = report.failed(),
            groups = report.groups,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "refresh finished"
        );
        self.notify(RegistryEvent::RefreshFinished {
            updated: report.updated(),
            failed: report.failed(),
        });
        Ok(report)
    }

    /// Refetch one plain feed and re-expand the groups it belongs to.
    pub async fn refresh_one(&mut self, identity: &str) -> Result<FeedOutcome, RegistryError> {
        let index = self
            .find_plain(identity)
            .ok_or_else(|| RegistryError::UnknownFeed(identity.to_string()))?;

        let result = fetch_into(&self.fetcher, &mut self.feeds[index]).await;
        let outcome = self.settle(&self.feeds[index], result);

        let titles: Vec<String> = self
            .groups
            .iter()
            .filter(|g| g.contains(identity))
            .map(|g| g.title.clone())
            .collect();
        for title in &titles {
            self.expand_group(title)?;
        }
        Ok(outcome)
    }

    /// Persist a fetched feed and announce the outcome.
    fn settle(&self, feed: &Feed, result: Result<usize, String>) -> FeedOutcome {
        let identity = display_identity(feed);
        match result {
            Ok(items) => match self.cache.save_feed(feed) {
                Ok(_) => {
                    self.notify(RegistryEvent::FeedUpdated { identity });
                    FeedOutcome::Updated { items }
                }
                Err(e) => {
                    warn!(feed = %identity, error = %e, "failed to cache refreshed feed");
                    self.notify(RegistryEvent::FeedFailed {
                        identity,
                        reason: e.to_string(),
                    });
                    FeedOutcome::PersistFailed(e.to_string())
                }
            },
            Err(reason) => {
                self.notify(RegistryEvent::FeedFailed {
                    identity,
                    reason: reason.clone(),
                });
                FeedOutcome::FetchFailed(reason)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Create `title`, or union `feed_links` into it if it exists, persist it
    /// and rebuild its merged feed.
    pub fn add_group<I, S>(&mut self, title: &str, feed_links: I) -> Result<&Group, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = match self.groups.iter().position(|g| g.title == title) {
            Some(i) => {
                let added = self.groups[i].absorb(feed_links);
                debug!(group = title, added, "extended group");
                i
            }
            None => {
                self.groups.push(Group::new(title, feed_links));
                self.groups.len() - 1
            }
        };
        self.cache.save_group(&self.groups[index])?;
        self.expand_group(title)?;
        self.notify(RegistryEvent::GroupChanged {
            title: title.to_string(),
        });
        Ok(&self.groups[index])
    }

    /// Rebuild the merged feed of every group. Returns how many were built.
    pub fn expand_groups(&mut self) -> Result<usize, RegistryError> {
        let titles: Vec<String> = self.groups.iter().map(|g| g.title.clone()).collect();
        for title in &titles {
            self.expand_group(title)?;
        }
        Ok(titles.len())
    }

    /// Merge the current members of `title`, replace that group's previous
    /// output (or append one), and cache it under the title.
    fn expand_group(&mut self, title: &str) -> Result<(), RegistryError> {
        let Some(group) = self.groups.iter().find(|g| g.title == title) else {
            return Ok(());
        };
        let merged = merge::expand(group, &self.feeds, self.policy)?;
        self.cache.save_feed_as(&merged.title, &merged)?;

        match self
            .feeds
            .iter()
            .position(|feed| feed.is_group_output() && feed.title == merged.title)
        {
            Some(i) => self.feeds[i] = merged,
            None => self.feeds.push(merged),
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Adding and deleting
    // -----------------------------------------------------------------------

    /// Track a new source, record it in the source list and fetch it.
    pub async fn add_feed(
        &mut self,
        source: &str,
        title_override: Option<&str>,
    ) -> Result<FeedOutcome, RegistryError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(RegistryError::EmptySource);
        }
        if self.find_plain(source).is_some() {
            return Err(RegistryError::AlreadyTracked(source.to_string()));
        }

        self.sources
            .append(source)
            .map_err(|e| self.sources_error(e))?;
        let mut feed = Feed::pending(source);
        if let Some(title) = title_override {
            feed.title = title.to_string();
            feed.title_override = Some(title.to_string());
        }
        self.feeds.push(feed);
        self.notify(RegistryEvent::FeedAdded {
            identity: source.to_string(),
        });

        self.refresh_one(source).await
    }

    /// Stop tracking the feed cached under `key` and remove its cache entry.
    ///
    /// Deleting a merged feed also deletes its group. Deleting a plain feed
    /// drops its source-list line. Every step is attempted; the first
    /// failure is returned, e.g. a cache `RemoveFailed` when there is no
    /// cache entry on a second delete.
    pub fn delete_feed(&mut self, key: &str) -> Result<(), RegistryError> {
        let removed = self
            .feeds
            .iter()
            .position(|feed| feed.cache_identity().is_ok_and(|k| k == key))
            .map(|i| self.feeds.remove(i));

        let mut results: Vec<Result<(), RegistryError>> = Vec::new();
        match &removed {
            Some(feed) if feed.is_group_output() => {
                if let Some(i) = self.groups.iter().position(|g| g.title == key) {
                    self.groups.remove(i);
                    results.push(self.cache.delete_group(key).map_err(Into::into));
                    self.notify(RegistryEvent::GroupDeleted {
                        title: key.to_string(),
                    });
                }
            }
            Some(_) => results.push(
                self.sources
                    .remove(key)
                    .map(|_| ())
                    .map_err(|e| self.sources_error(e)),
            ),
            None => {}
        }
        results.push(self.cache.delete_feed(key).map_err(Into::into));

        if removed.is_some() {
            self.notify(RegistryEvent::FeedDeleted {
                key: key.to_string(),
            });
        }
        results.into_iter().collect()
    }

    /// Delete a group together with its merged feed and both cache entries.
    pub fn delete_group(&mut self, title: &str) -> Result<(), RegistryError> {
        let feed_position = self
            .feeds
            .iter()
            .position(|feed| feed.is_group_output() && feed.title == title);
        if let Some(i) = self.groups.iter().position(|g| g.title == title) {
            self.groups.remove(i);
        }

        let group_result = self.cache.delete_group(title);
        let feed_result = match feed_position {
            Some(i) => {
                self.feeds.remove(i);
                self.cache.delete_feed(title)
            }
            None => Ok(()),
        };
        group_result?;
        feed_result?;

        self.notify(RegistryEvent::GroupDeleted {
            title: title.to_string(),
        });
        Ok(())
    }

    fn find_plain(&self, identity: &str) -> Option<usize> {
        self.feeds.iter().position(|feed| {
            is_refreshable(feed) && feed.identity().is_ok_and(|id| id == identity)
        })
    }

    fn sources_error(&self, source: io::Error) -> RegistryError {
        RegistryError::Sources {
            path: self.sources.path().to_path_buf(),
            source,
        }
    }

    fn notify(&self, event: RegistryEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Fetch `feed`'s source and apply the result in place. On failure the feed
/// becomes a placeholder and the reason is returned.
async fn fetch_into(fetcher: &Fetcher, feed: &mut Feed) -> Result<usize, String> {
    let identity = feed.identity().map_err(|e| e.to_string())?.to_string();
    let title_override = feed.title_override.clone();

    match fetcher.fetch(&identity, title_override.as_deref()).await {
        Ok(fresh) => {
            feed.apply_fetched(fresh);
            Ok(feed.items.len())
        }
        Err(FetchError::FetchFailed { cause, .. }) => {
            let reason = cause.to_string();
            warn!(source = %identity, error = %reason, "fetch failed");
            feed.mark_failed(&reason);
            Err(reason)
        }
    }
}

fn is_refreshable(feed: &Feed) -> bool {
    !feed.is_group_output() && feed.identity().is_ok()
}

fn display_identity(feed: &Feed) -> String {
    feed.identity()
        .map(str::to_string)
        .unwrap_or_else(|_| feed.title.clone())
}
