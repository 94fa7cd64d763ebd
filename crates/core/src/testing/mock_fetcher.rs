//! Mock feed fetcher for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::rss::{FeedFetcher, RssError};

/// Serves canned feed documents keyed by URL.
///
/// Unknown URLs and URLs marked as failing return [`RssError::Fetch`].
#[derive(Debug, Default, Clone)]
pub struct StaticFeedFetcher {
    bodies: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    failing: Arc<RwLock<HashMap<String, String>>>,
    fetches: Arc<RwLock<Vec<String>>>,
}

impl StaticFeedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub async fn set_body(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.failing.write().await.remove(url);
        self.bodies.write().await.insert(url.to_string(), body.into());
    }

    /// Fail every fetch of `url` with `message`.
    pub async fn set_failure(&self, url: &str, message: &str) {
        self.failing
            .write()
            .await
            .insert(url.to_string(), message.to_string());
    }

    /// URLs fetched so far, in order.
    pub async fn fetched_urls(&self) -> Vec<String> {
        self.fetches.read().await.clone()
    }
}

#[async_trait]
impl FeedFetcher for StaticFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RssError> {
        self.fetches.write().await.push(url.to_string());

        if let Some(message) = self.failing.read().await.get(url) {
            return Err(RssError::Fetch(message.clone()));
        }

        self.bodies
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| RssError::Fetch(format!("no such feed: {}", url)))
    }
}
