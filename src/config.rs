/*!
Configuration types for newsveil.

Deserialized from TOML, loaded as an optional defaults file merged with
an optional override file. Secret material (rewrite API key, token
cipher key) is never stored in the file itself; the file names the
environment variables that hold it.
*/

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_TTL;
use crate::rewrite::{RewritePrompts, RewriteSpec};

/// HTTP server bind configuration, merged into Rocket's figment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Upstream feed + summarization collaborator endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the paginated news feed.
    pub feed_base_url: String,
    /// Base URL of the single-article summarization collaborator.
    pub summary_base_url: String,
    pub page_size: Option<u32>,
    pub fetch_timeout_seconds: Option<u64>,
}

/// Token codec configuration. The key itself lives in the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Env var holding the hex-encoded 32-byte cipher key.
    pub key_env: Option<String>,
    /// Public, routable base path tokens are embedded under. Must point
    /// back at this server's image relay route.
    pub public_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub connect_timeout_seconds: Option<u64>,
}

/// Per-call-site override of model and prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteSiteConfig {
    pub model: Option<String>,
    pub prompt: Option<String>,
}

/// Rewrite backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    pub adapter: Option<String>, // "remote", "none"
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub titles: Option<RewriteSiteConfig>,
    pub article_text: Option<RewriteSiteConfig>,
    pub article_title: Option<RewriteSiteConfig>,
}

/// Top-level application configuration (deserialized from config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: Option<ServerConfig>,
    pub upstream: UpstreamConfig,
    pub token: Option<TokenConfig>,
    pub cache: Option<CacheConfig>,
    pub relay: Option<RelayConfig>,
    pub rewrite: Option<RewriteConfig>,
}

pub const DEFAULT_KEY_ENV: &str = "NEWSVEIL_TOKEN_KEY";
pub const DEFAULT_PUBLIC_BASE: &str = "http://127.0.0.1:8000/image-urls";

impl Config {
    /// Load configuration from a TOML file asynchronously.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional
    /// override file. If both are present, they are merged (override
    /// takes precedence).
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value =
                    toml::from_str(&data).context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read override config: {}", path.display()))?;
                let val: toml::Value =
                    toml::from_str(&data).context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value
            .try_into()
            .context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    pub fn token_key_env(&self) -> &str {
        self.token
            .as_ref()
            .and_then(|t| t.key_env.as_deref())
            .unwrap_or(DEFAULT_KEY_ENV)
    }

    pub fn public_base(&self) -> &str {
        self.token
            .as_ref()
            .and_then(|t| t.public_base.as_deref())
            .unwrap_or(DEFAULT_PUBLIC_BASE)
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache
            .as_ref()
            .and_then(|c| c.ttl_seconds)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TTL)
    }

    /// Resolve the three rewrite call sites: compiled-in defaults with
    /// any configured model/prompt overrides applied.
    pub fn rewrite_prompts(&self) -> RewritePrompts {
        let defaults = RewritePrompts::default();
        let Some(rw) = &self.rewrite else {
            return defaults;
        };
        RewritePrompts {
            titles: merge_site(defaults.titles, rw.titles.as_ref()),
            article_text: merge_site(defaults.article_text, rw.article_text.as_ref()),
            article_title: merge_site(defaults.article_title, rw.article_title.as_ref()),
        }
    }
}

fn merge_site(base: RewriteSpec, over: Option<&RewriteSiteConfig>) -> RewriteSpec {
    let Some(over) = over else { return base };
    RewriteSpec {
        model: over.model.clone().unwrap_or(base.model),
        prompt: over.prompt.clone().unwrap_or(base.prompt),
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
