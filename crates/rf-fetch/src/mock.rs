//! Mock retriever for testing.
//!
//! Serves canned documents keyed by source, so the fetcher, the cache and the
//! refresh orchestrator can be exercised without network or subprocesses.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::sleep;

use crate::fetcher::FetchCause;
use crate::retrieve::Retrieve;
use crate::source::Source;

/// Configurable mock responses for testing.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return these bytes as the feed document.
    Document { body: Vec<u8> },
    /// Fail as if the connection was refused.
    Error { message: String },
}

impl MockResponse {
    pub fn document(body: impl Into<Vec<u8>>) -> Self {
        MockResponse::Document { body: body.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        MockResponse::Error {
            message: message.into(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    responses: HashMap<String, MockResponse>,
    calls: Vec<String>,
}

/// Cheap to clone; clones share responses and counters, so a test can keep a
/// handle after moving one into a `Fetcher`.
#[derive(Debug, Clone, Default)]
pub struct MockRetriever {
    state: Arc<Mutex<State>>,
    delay_ms: Option<u64>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, origin: &str, response: MockResponse) -> Self {
        self.set_response(origin, response);
        self
    }

    /// Sleep this long inside every retrieval.
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = Some(ms);
        self
    }

    /// Replace the response for `origin`; later retrievals see the new one.
    pub fn set_response(&self, origin: &str, response: MockResponse) {
        let key = Source::parse(origin).to_string();
        self.lock().responses.insert(key, response);
    }

    /// Every source retrieved so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Highest number of retrievals that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Retrieve for MockRetriever {
    fn retrieve<'a>(&'a self, source: &'a Source) -> BoxFuture<'a, Result<Vec<u8>, FetchCause>> {
        Box::pin(async move {
            let key = source.to_string();
            let response = {
                let mut state = self.lock();
                state.calls.push(key.clone());
                state.responses.get(&key).cloned()
            };

            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);
            if let Some(ms) = self.delay_ms {
                sleep(Duration::from_millis(ms)).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match response {
                Some(MockResponse::Document { body }) => Ok(body),
                Some(MockResponse::Error { message }) => Err(FetchCause::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    message,
                ))),
                None => Err(FetchCause::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no mock response for {key}"),
                ))),
            }
        })
    }
}

/// Built-in documents for common scenarios.
pub mod fixtures {
    /// An RSS 2.0 channel with `(title, link, pubDate)` items.
    pub fn rss(title: &str, items: &[(&str, &str, &str)]) -> String {
        let mut doc = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\">\n<channel>\n\
             <title>{}</title>\n<link>https://example.com/</link>\n\
             <description>{} description</description>\n",
            escape(title),
            escape(title),
        );
        for (item_title, link, date) in items {
            doc.push_str(&format!(
                "<item><title>{}</title><link>{}</link><pubDate>{}</pubDate></item>\n",
                escape(item_title),
                escape(link),
                escape(date),
            ));
        }
        doc.push_str("</channel>\n</rss>\n");
        doc
    }

    fn escape(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{FeedParser, SyndicationParser};

    #[tokio::test]
    async fn serves_registered_document() {
        let mock = MockRetriever::new()
            .with_response("https://a.example/rss", MockResponse::document("<rss/>"));

        let body = mock
            .retrieve(&Source::parse("https://a.example/rss"))
            .await
            .unwrap();

        assert_eq!(body, b"<rss/>");
        assert_eq!(mock.calls(), vec!["https://a.example/rss"]);
    }

    #[tokio::test]
    async fn keys_are_normalized_like_sources() {
        let mock = MockRetriever::new()
            .with_response("https://a.example", MockResponse::document("x"));

        assert!(mock
            .retrieve(&Source::parse("https://a.example"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn error_response_is_io_error() {
        let mock = MockRetriever::new().with_response("cmd", MockResponse::error("down"));
        let err = mock.retrieve(&Source::parse("cmd")).await.unwrap_err();
        assert!(matches!(err, FetchCause::Io(e) if e.kind() == io::ErrorKind::ConnectionRefused));
    }

    #[tokio::test]
    async fn unknown_source_fails() {
        let err = MockRetriever::new()
            .retrieve(&Source::parse("nothing"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no mock response"));
    }

    #[tokio::test]
    async fn set_response_is_shared_between_clones() {
        let mock = MockRetriever::new();
        let handle = mock.clone();
        handle.set_response("cmd", MockResponse::document("later"));

        assert_eq!(mock.retrieve(&Source::parse("cmd")).await.unwrap(), b"later");
    }

    #[test]
    fn rss_fixture_parses() {
        let doc = fixtures::rss("A & B", &[("one", "https://x/1", "2023-01-02T15:04:05Z")]);
        let parsed = SyndicationParser.parse(doc.as_bytes()).unwrap();
        assert_eq!(parsed.title, "A & B");
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(
            parsed.items[0].published.as_deref(),
            Some("2023-01-02T15:04:05Z")
        );
    }
}
