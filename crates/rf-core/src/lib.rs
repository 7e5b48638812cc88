//! rf-core: Stateful core of rfeed.
//!
//! Owns the live feed and group collections, persists them through the
//! [`CacheStore`], and refreshes every tracked source concurrently through an
//! `rf_fetch::Fetcher`. A UI drives the [`Registry`] and listens for
//! [`RegistryEvent`]s to know when to redraw.

pub mod cache;
pub mod config;
pub mod merge;
pub mod registry;
pub mod sources;

pub use cache::{CacheError, CacheStore};
pub use config::{Config, MergePolicy};
pub use registry::{FeedOutcome, RefreshReport, Registry, RegistryError, RegistryEvent};
pub use sources::SourceList;
