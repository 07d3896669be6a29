use serde::{Deserialize, Serialize};

use crate::error::RewriteError;

/// Core trait for text-rewrite backends (remote today, local later).
///
/// Both methods carry a uniform failure contract: any transport, status,
/// timeout or empty-completion problem is a [`RewriteError`]. No silent
/// empty-string masking happens at this layer; fallback is the caller's
/// decision.
#[async_trait::async_trait]
pub trait RewriteProvider: Send + Sync {
    /// Rewrite a single piece of text under the given call-site spec.
    async fn rewrite_text(&self, text: &str, spec: &RewriteSpec) -> Result<String, RewriteError>;

    /// Rewrite a batch of titles in one call.
    ///
    /// The response is split into one line per input title, order
    /// preserved positionally. The returned sequence may be shorter than
    /// the input when the backend truncates; callers treat missing or
    /// empty positions as fallback-eligible.
    async fn rewrite_titles(
        &self,
        titles: &[String],
        spec: &RewriteSpec,
    ) -> Result<Vec<String>, RewriteError>;
}

/// One rewrite call site: which model to ask and what to ask it.
/// Injected from configuration rather than hard-coded at the call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteSpec {
    pub model: String,
    pub prompt: String,
}

/// Fallback model used when a call site does not name one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const TITLES_PROMPT: &str = "You rewrite news headlines. Rewrite each of the following headlines \
to be clear and engaging while preserving its meaning and original language. Return exactly one \
rewritten headline per line, in the same order, with no numbering and no extra lines.";

const ARTICLE_TEXT_PROMPT: &str = "Rewrite the following article in your own words, preserving \
all facts, the structure and the original language. Return only the rewritten article.";

const ARTICLE_TITLE_PROMPT: &str = "Rewrite the following news headline to be clear and engaging \
while preserving its meaning and original language. Return only the rewritten headline.";

/// The three rewrite call sites the assembler uses, each a `{model,
/// prompt}` pair with compiled-in defaults overridable from config.
#[derive(Debug, Clone)]
pub struct RewritePrompts {
    pub titles: RewriteSpec,
    pub article_text: RewriteSpec,
    pub article_title: RewriteSpec,
}

impl Default for RewritePrompts {
    fn default() -> Self {
        Self {
            titles: RewriteSpec {
                model: DEFAULT_MODEL.to_string(),
                prompt: TITLES_PROMPT.to_string(),
            },
            article_text: RewriteSpec {
                model: DEFAULT_MODEL.to_string(),
                prompt: ARTICLE_TEXT_PROMPT.to_string(),
            },
            article_title: RewriteSpec {
                model: DEFAULT_MODEL.to_string(),
                prompt: ARTICLE_TITLE_PROMPT.to_string(),
            },
        }
    }
}

pub mod remote;
