//! Feed document parsing.
//!
//! Parsers only extract text fields; publish dates are handed back as raw
//! strings so the fetcher can run them through `rf_model::time`.

use thiserror::Error;

#[derive(Debug, Error)]
#[error("unrecognized feed document (rss: {rss}; atom: {atom})")]
pub struct ParseError {
    pub rss: String,
    pub atom: String,
}

/// Result of parsing one feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: String,
    pub description: String,
    pub link: String,
    pub items: Vec<ParsedItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedItem {
    pub title: String,
    pub description: String,
    pub link: String,
    /// Publish date exactly as the document wrote it.
    pub published: Option<String>,
}

/// Turns raw document bytes into a [`ParsedFeed`].
pub trait FeedParser: Send + Sync {
    fn parse(&self, document: &[u8]) -> Result<ParsedFeed, ParseError>;
}

/// RSS 2.0 first, Atom 1.0 as the fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyndicationParser;

impl FeedParser for SyndicationParser {
    fn parse(&self, document: &[u8]) -> Result<ParsedFeed, ParseError> {
        let rss_err = match rss::Channel::read_from(document) {
            Ok(channel) => return Ok(from_rss(&channel)),
            Err(e) => e,
        };
        match atom_syndication::Feed::read_from(document) {
            Ok(feed) => Ok(from_atom(&feed)),
            Err(atom_err) => Err(ParseError {
                rss: rss_err.to_string(),
                atom: atom_err.to_string(),
            }),
        }
    }
}

fn from_rss(channel: &rss::Channel) -> ParsedFeed {
    ParsedFeed {
        title: channel.title().to_string(),
        description: channel.description().to_string(),
        link: channel.link().to_string(),
        items: channel
            .items()
            .iter()
            .map(|item| ParsedItem {
                title: item.title().unwrap_or_default().to_string(),
                description: item.description().unwrap_or_default().to_string(),
                link: item.link().unwrap_or_default().to_string(),
                published: item.pub_date().map(str::to_string),
            })
            .collect(),
    }
}

fn from_atom(feed: &atom_syndication::Feed) -> ParsedFeed {
    ParsedFeed {
        title: feed.title().value.clone(),
        description: feed
            .subtitle()
            .map(|text| text.value.clone())
            .unwrap_or_default(),
        link: alternate_link(feed.links()),
        items: feed
            .entries()
            .iter()
            .map(|entry| {
                // Atom dates arrive already parsed; re-render them in the
                // ISO-8601 offset layout.
                let when = entry.published().unwrap_or(entry.updated());
                ParsedItem {
                    title: entry.title().value.clone(),
                    description: entry
                        .summary()
                        .map(|text| text.value.clone())
                        .unwrap_or_default(),
                    link: alternate_link(entry.links()),
                    published: Some(when.format("%Y-%m-%dT%H:%M:%S%:z").to_string()),
                }
            })
            .collect(),
    }
}

fn alternate_link(links: &[atom_syndication::Link]) -> String {
    links
        .iter()
        .find(|link| link.rel() == "alternate")
        .or_else(|| links.first())
        .map(|link| link.href().to_string())
        .unwrap_or_default()
}
