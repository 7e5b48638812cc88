//! Fetch a source and normalize it into a [`Feed`].

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rf_model::{time, Feed, Item};
use thiserror::Error;
use tracing::{debug, info};

use crate::color::{ColorAssigner, RandomColors};
use crate::parser::{FeedParser, ParseError, ParsedFeed, SyndicationParser};
use crate::retrieve::{FetchSettings, Retrieve, SourceRetriever};
use crate::source::Source;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch {origin}: {cause}")]
    FetchFailed {
        origin: String,
        #[source]
        cause: FetchCause,
    },
}

impl FetchError {
    pub fn origin(&self) -> &str {
        match self {
            FetchError::FetchFailed { origin, .. } => origin,
        }
    }
}

/// Why a single fetch failed.
#[derive(Debug, Error)]
pub enum FetchCause {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("command failed ({status}): {stderr}")]
    Command { status: String, stderr: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

/// Retrieves, parses and post-processes feed sources.
pub struct Fetcher {
    retriever: Box<dyn Retrieve>,
    parser: Box<dyn FeedParser>,
    colors: Box<dyn ColorAssigner>,
    timeout: Option<Duration>,
    forced_color: Option<i32>,
}

impl Fetcher {
    /// HTTP/command retrieval, RSS/Atom parsing, random palette colors.
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchCause> {
        let fetcher = Self::with_parts(
            SourceRetriever::new(settings)?,
            SyndicationParser,
            RandomColors::default(),
        );
        Ok(fetcher.with_timeout(settings.timeout))
    }

    pub fn with_parts(
        retriever: impl Retrieve + 'static,
        parser: impl FeedParser + 'static,
        colors: impl ColorAssigner + 'static,
    ) -> Self {
        Self {
            retriever: Box::new(retriever),
            parser: Box::new(parser),
            colors: Box::new(colors),
            timeout: None,
            forced_color: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Skip the color collaborator and use `color` for every feed.
    pub fn with_forced_color(mut self, color: i32) -> Self {
        self.forced_color = Some(color);
        self
    }

    /// Fetch `origin` and build a fresh, non-merged feed from it.
    pub async fn fetch(&self, origin: &str, title_override: Option<&str>) -> Result<Feed, FetchError> {
        self.fetch_at(origin, title_override, Utc::now()).await
    }

    /// Like [`fetch`](Self::fetch), dropping items dated after `now`.
    pub async fn fetch_at(
        &self,
        origin: &str,
        title_override: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Feed, FetchError> {
        let failed = |cause: FetchCause| FetchError::FetchFailed {
            origin: origin.to_string(),
            cause,
        };

        let source = Source::parse(origin);
        let start = Instant::now();
        debug!(source = origin, command = source.is_command(), "fetching");

        let document = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.retriever.retrieve(&source))
                .await
                .map_err(|_| failed(FetchCause::TimedOut(limit)))?,
            None => self.retriever.retrieve(&source).await,
        }
        .map_err(failed)?;

        let parsed = self
            .parser
            .parse(&document)
            .map_err(|e| failed(e.into()))?;

        let color = self
            .forced_color
            .unwrap_or_else(|| self.colors.assign(origin));
        let feed = build_feed(origin, parsed, title_override, color, now);

        info!(
            source = origin,
            items = feed.items.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "fetched feed"
        );
        Ok(feed)
    }
}

/// Normalize dates, drop future items and sort.
fn build_feed(
    origin: &str,
    parsed: ParsedFeed,
    title_override: Option<&str>,
    color: i32,
    now: DateTime<Utc>,
) -> Feed {
    let mut items: Vec<Item> = parsed
        .items
        .into_iter()
        .map(|item| Item {
            belong: origin.to_string(),
            title: item.title,
            description: item.description,
            link: item.link,
            pub_date: time::parse(item.published.as_deref().unwrap_or_default()),
            color,
        })
        .filter(|item| item.pub_date <= now)
        .collect();
    rf_model::sort_items(&mut items);

    Feed {
        title: title_override
            .map(str::to_string)
            .unwrap_or(parsed.title),
        description: parsed.description,
        link: parsed.link,
        feed_links: vec![origin.to_string()],
        color,
        items,
        merged: false,
        title_override: title_override.map(str::to_string),
        group: None,
    }
}
