//! rf-fetch: Feed retrieval for rfeed.
//!
//! A feed source is either an absolute URL, fetched over HTTP, or a shell
//! command line whose stdout is a feed document. The [`Fetcher`] retrieves
//! the document, hands it to a [`FeedParser`], and normalizes the result into
//! an `rf_model::Feed`.

pub mod color;
pub mod fetcher;
pub mod mock;
pub mod parser;
pub mod retrieve;
pub mod source;

pub use color::{ColorAssigner, FixedColor, RandomColors};
pub use fetcher::{FetchCause, FetchError, Fetcher};
pub use mock::{MockResponse, MockRetriever};
pub use parser::{FeedParser, ParseError, ParsedFeed, ParsedItem, SyndicationParser};
pub use retrieve::{FetchSettings, Retrieve, SourceRetriever};
pub use source::Source;
