//! RSS feed monitoring.
//!
//! Feeds are fetched through a [`FeedFetcher`], parsed with the `rss` crate
//! and filtered by case-insensitive title substrings. Matching links are
//! handed to the registry exactly once per feed.

mod fetch;
mod monitor;
mod types;

pub use fetch::{parse_feed, FeedFetcher, HttpFeedFetcher};
pub use monitor::RssMonitor;
pub use types::{
    match_title, FeedCheckReport, FeedEntry, FeedItem, FilterRule, PersistedFeed, RssError,
};
