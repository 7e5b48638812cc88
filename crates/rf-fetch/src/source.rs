//! Feed source classification.

use std::fmt;

use reqwest::Url;

/// Where a feed document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Absolute URL with scheme and host.
    Url(Url),
    /// Anything else: a shell command line whose stdout is the document.
    Command(String),
}

impl Source {
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) if url.has_host() && matches!(url.scheme(), "http" | "https") => {
                Source::Url(url)
            }
            _ => Source::Command(raw.to_string()),
        }
    }

    pub fn is_command(&self) -> bool {
        matches!(self, Source::Command(_))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Url(url) => write!(f, "{url}"),
            Source::Command(line) => write!(f, "{line}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_url() {
        let source = Source::parse("https://example.com/feed.xml");
        assert!(matches!(source, Source::Url(_)));
        assert!(!source.is_command());
    }

    #[test]
    fn http_url_with_port_and_query() {
        let source = Source::parse("http://localhost:8080/rss?lang=en");
        assert!(matches!(source, Source::Url(_)));
    }

    #[test]
    fn plain_command() {
        let source = Source::parse("python3 scrape.py --site news");
        assert_eq!(
            source,
            Source::Command("python3 scrape.py --site news".to_string())
        );
    }

    #[test]
    fn command_with_url_argument() {
        let source = Source::parse("curl -s https://example.com/feed.xml");
        assert!(source.is_command());
    }

    #[test]
    fn hostless_urls_are_commands() {
        assert!(Source::parse("file:///tmp/feed.xml").is_command());
        assert!(Source::parse("mailto:someone@example.com").is_command());
    }

    #[test]
    fn display_round_trips_command() {
        let source = Source::parse("cat feed.xml");
        assert_eq!(source.to_string(), "cat feed.xml");
    }
}
