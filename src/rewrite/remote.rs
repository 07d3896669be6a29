use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{RewriteProvider, RewriteSpec};
use crate::error::RewriteError;

/// Remote rewrite backend speaking the OpenAI-compatible chat API.
pub struct RemoteRewriteProvider {
    api_url: String,
    api_key: String,
    default_timeout: Duration,
    default_max_tokens: usize,
    temperature: f32,
    client: reqwest::Client,
}

impl RemoteRewriteProvider {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            default_timeout: Duration::from_secs(30),
            default_max_tokens: 1000,
            temperature: 0.7,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_defaults(mut self, timeout_secs: u64, max_tokens: usize, temperature: f32) -> Self {
        self.default_timeout = Duration::from_secs(timeout_secs);
        self.default_max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// One chat completion round-trip. Returns the first choice's content.
    async fn complete(&self, model: &str, prompt: String) -> Result<String, RewriteError> {
        let req_body = ChatRequest {
            model: model.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
            max_tokens: Some(self.default_max_tokens),
            temperature: Some(self.temperature),
        };

        // One deadline for the whole round trip, body read included.
        let round_trip = async {
            let response = self
                .client
                .post(&self.api_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&req_body)
                .send()
                .await
                .map_err(RewriteError::Transport)?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(RewriteError::Api { status, body });
            }

            response
                .json::<ChatResponse>()
                .await
                .map_err(RewriteError::Malformed)
        };

        let resp_body = tokio::time::timeout(self.default_timeout, round_trip)
            .await
            .map_err(|_| RewriteError::Timeout)??;

        let content = resp_body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(RewriteError::EmptyCompletion)?;

        if content.trim().is_empty() {
            return Err(RewriteError::EmptyCompletion);
        }

        Ok(content)
    }
}

#[async_trait::async_trait]
impl RewriteProvider for RemoteRewriteProvider {
    async fn rewrite_text(&self, text: &str, spec: &RewriteSpec) -> Result<String, RewriteError> {
        let prompt = format!("{}\n\n{}", spec.prompt, text);
        let content = self.complete(&spec.model, prompt).await?;
        Ok(content.trim().to_string())
    }

    async fn rewrite_titles(
        &self,
        titles: &[String],
        spec: &RewriteSpec,
    ) -> Result<Vec<String>, RewriteError> {
        // Titles become one line each in the request; embedded newlines
        // would shift every later position, so flatten them first.
        let joined = titles
            .iter()
            .map(|t| t.replace(['\n', '\r'], " "))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!("{}\n\n{}", spec.prompt, joined);
        let content = self.complete(&spec.model, prompt).await?;

        let mut lines: Vec<String> = content.lines().map(|l| l.trim().to_string()).collect();
        // Trailing blank lines are formatting noise; interior blanks stay,
        // they mark positions the caller must fall back on.
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        Ok(lines)
    }
}

// OpenAI-compatible request/response structures
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}
