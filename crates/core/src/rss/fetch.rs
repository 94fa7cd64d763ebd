use async_trait::async_trait;
use std::time::Duration;

use super::types::{FeedItem, RssError};

/// Retrieves raw documents over the network.
///
/// Used both for feed documents and for `.torrent` links found in feeds.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RssError>;
}

/// reqwest-backed fetcher with a per-request timeout.
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self, RssError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tamer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RssError::Fetch(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RssError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RssError::Fetch(format!("{url}: {e}")))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RssError::Fetch(format!("read {url}: {e}")))?;

        Ok(bytes.to_vec())
    }
}

/// Parse an RSS document into items.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedItem>, RssError> {
    let channel = ::rss::Channel::read_from(bytes).map_err(|e| RssError::Parse(e.to_string()))?;

    Ok(channel
        .items()
        .iter()
        .map(|item: &::rss::Item| FeedItem {
            title: item.title().map(|s| s.trim().to_string()),
            link: item.link().map(|s| s.trim().to_string()),
        })
        .collect())
}
