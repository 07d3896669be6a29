use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::UpstreamFetchError;

/// One raw item as the upstream feed delivers it. The schema is an
/// opaque contract; unknown fields are ignored, optional ones default.
#[derive(Debug, Clone, Deserialize)]
pub struct RawNewsItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub hash_id: String,
    #[serde(default)]
    pub source_url: String,
}

/// One page of the upstream feed plus the cursor where the next page
/// starts. Pagination semantics belong to the upstream; the cursor is
/// never interpreted here.
#[derive(Debug, Clone)]
pub struct FeedBatch {
    pub items: Vec<RawNewsItem>,
    pub next_cursor: String,
}

/// Raw article payload from the summarization collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct RawArticle {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub full_text: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Deserialize)]
struct FeedPage {
    #[serde(default)]
    items: Vec<RawNewsItem>,
    #[serde(default)]
    min_news_id: Option<String>,
}

/// HTTP client for the upstream news feed and the article summarization
/// collaborator. One shared reqwest client, fixed timeout.
pub struct UpstreamClient {
    client: reqwest::Client,
    feed_base_url: String,
    summary_base_url: String,
    page_size: u32,
}

impl UpstreamClient {
    pub fn new(
        feed_base_url: impl Into<String>,
        summary_base_url: impl Into<String>,
        page_size: u32,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("Newsveil/0.1.0")
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            feed_base_url: feed_base_url.into(),
            summary_base_url: summary_base_url.into(),
            page_size,
        })
    }

    /// Fetch the newest page of the feed.
    pub async fn latest(&self) -> Result<FeedBatch, UpstreamFetchError> {
        self.fetch_page(None).await
    }

    /// Fetch the page starting at the given cursor.
    pub async fn more(&self, cursor: &str) -> Result<FeedBatch, UpstreamFetchError> {
        self.fetch_page(Some(cursor)).await
    }

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedBatch, UpstreamFetchError> {
        let mut query: Vec<(&str, String)> = vec![("page_size", self.page_size.to_string())];
        if let Some(c) = cursor {
            query.push(("min_news_id", c.to_string()));
        }

        let response = self
            .client
            .get(&self.feed_base_url)
            .query(&query)
            .send()
            .await
            .map_err(UpstreamFetchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamFetchError::Status(status.as_u16()));
        }

        let page: FeedPage = response
            .json()
            .await
            .map_err(UpstreamFetchError::Malformed)?;

        // Next-page cursor: the page-level marker when present, otherwise
        // the last item's id (the upstream accepts either).
        let next_cursor = page
            .min_news_id
            .filter(|c| !c.is_empty())
            .or_else(|| page.items.last().map(|i| i.hash_id.clone()))
            .unwrap_or_default();

        Ok(FeedBatch {
            items: page.items,
            next_cursor,
        })
    }

    /// Fetch one article's title, full text, image and summary from the
    /// summarization collaborator.
    pub async fn article(&self, url: &str) -> Result<RawArticle, UpstreamFetchError> {
        let response = self
            .client
            .get(&self.summary_base_url)
            .query(&[("url", url)])
            .send()
            .await
            .map_err(UpstreamFetchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamFetchError::Status(status.as_u16()));
        }

        response.json().await.map_err(UpstreamFetchError::Malformed)
    }
}
