use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::rewrite::{RewritePrompts, RewriteProvider, RewriteSpec};
use crate::token::TokenCodec;
use crate::upstream::{RawArticle, RawNewsItem};

/// One normalized news item as served to clients. Immutable once built;
/// owned by the cache entry holding its batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub index: usize,
    pub title: String,
    pub content: String,
    /// Tokenized relay URL; the origin host never appears here.
    pub image_url: String,
    /// Where the next page starts, shared by the whole batch.
    pub pagination_cursor: String,
    pub source_hash_id: String,
    pub source_url: String,
}

/// Ordered batch of normalized items from one upstream fetch. Order is
/// display order and equals upstream order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NewsBatch {
    pub items: Vec<NewsItem>,
}

/// Normalized single-article payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
    pub title: String,
    pub full_text: String,
    pub image_url: String,
    pub summary: String,
}

/// Fixed sentinel value served when the summarization collaborator has
/// nothing for a URL. A deliberate user-visible degrade, not an error.
pub const NO_DATA: &str = "no data";

impl ArticleSummary {
    pub fn no_data() -> Self {
        Self {
            title: NO_DATA.to_string(),
            full_text: NO_DATA.to_string(),
            image_url: NO_DATA.to_string(),
            summary: NO_DATA.to_string(),
        }
    }
}

/// Turns raw upstream batches into normalized ones: rewritten titles
/// (falling back to originals), tokenized image URLs, a uniform
/// pagination cursor. Rewrite failures degrade, they never fail a batch.
pub struct Assembler {
    codec: Arc<TokenCodec>,
    rewriter: Option<Arc<dyn RewriteProvider>>,
    prompts: RewritePrompts,
}

impl Assembler {
    pub fn new(
        codec: Arc<TokenCodec>,
        rewriter: Option<Arc<dyn RewriteProvider>>,
        prompts: RewritePrompts,
    ) -> Self {
        Self {
            codec,
            rewriter,
            prompts,
        }
    }

    /// Assemble a normalized batch from raw upstream items.
    ///
    /// Titles are rewritten in one batched call; position `i` of the
    /// response replaces title `i` when present and non-empty, otherwise
    /// the original stays. A total rewrite failure keeps every original
    /// title. Everything else passes through unchanged except the image
    /// URL, which is tokenized.
    pub async fn assemble(&self, items: Vec<RawNewsItem>, cursor: &str) -> NewsBatch {
        let titles: Vec<String> = items.iter().map(|i| i.title.clone()).collect();

        let rewritten = match &self.rewriter {
            Some(r) if !titles.is_empty() => {
                match r.rewrite_titles(&titles, &self.prompts.titles).await {
                    Ok(lines) => lines,
                    Err(e) => {
                        warn!(%e, "batch title rewrite failed, keeping original titles");
                        Vec::new()
                    }
                }
            }
            _ => Vec::new(),
        };

        let out = items
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let title = rewritten
                    .get(index)
                    .map(|t| t.trim())
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| raw.title.clone());

                NewsItem {
                    index,
                    title,
                    content: raw.content,
                    image_url: self.tokenize_image(&raw.image_url),
                    pagination_cursor: cursor.to_string(),
                    source_hash_id: raw.hash_id,
                    source_url: raw.source_url,
                }
            })
            .collect();

        NewsBatch { items: out }
    }

    /// Normalize one article: rewrite the full text and the title
    /// independently (each falls back to its original on failure),
    /// tokenize the image. An article with no title or no text yields
    /// the fixed "no data" payload and makes no rewrite calls.
    pub async fn summarize(&self, raw: RawArticle) -> ArticleSummary {
        if raw.title.trim().is_empty() || raw.full_text.trim().is_empty() {
            return ArticleSummary::no_data();
        }

        let full_text = self
            .rewrite_or_keep(&raw.full_text, &self.prompts.article_text, "article text")
            .await;
        let title = self
            .rewrite_or_keep(&raw.title, &self.prompts.article_title, "article title")
            .await;

        ArticleSummary {
            title,
            full_text,
            image_url: self.tokenize_image(&raw.image_url),
            summary: raw.summary,
        }
    }

    async fn rewrite_or_keep(&self, text: &str, spec: &RewriteSpec, what: &str) -> String {
        match &self.rewriter {
            Some(r) => match r.rewrite_text(text, spec).await {
                Ok(t) if !t.trim().is_empty() => t,
                Ok(_) => text.to_string(),
                Err(e) => {
                    warn!(%e, "{what} rewrite failed, keeping original");
                    text.to_string()
                }
            },
            None => text.to_string(),
        }
    }

    fn tokenize_image(&self, origin: &str) -> String {
        if origin.is_empty() {
            return String::new();
        }
        match self.codec.image_url(origin) {
            Ok(wrapped) => wrapped,
            Err(e) => {
                warn!(%e, "image tokenization failed, dropping image");
                String::new()
            }
        }
    }
}
