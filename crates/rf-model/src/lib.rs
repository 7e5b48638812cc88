//! rf-model: Shared entity types for rfeed.
//!
//! This crate defines the feed, item and group types exchanged between the
//! fetcher, the cache store and the refresh orchestrator, plus the timestamp
//! normalizer every fetched item passes through.

pub mod feed;
pub mod group;
pub mod time;

pub use feed::{sort_items, Feed, Item, ModelError, NEUTRAL_COLOR, UNASSIGNED_COLOR};
pub use group::Group;
