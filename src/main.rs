/*
newsveil - single-binary main.rs
Starts the Rocket HTTP server that fronts the upstream news feed.
*/

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use newsveil::assembler::Assembler;
use newsveil::cache::BatchCache;
use newsveil::config::Config;
use newsveil::relay;
use newsveil::rewrite::remote::RemoteRewriteProvider;
use newsveil::rewrite::RewriteProvider;
use newsveil::server::{self, AppState};
use newsveil::token::TokenCodec;
use newsveil::upstream::UpstreamClient;

#[derive(Parser, Debug)]
#[command(name = "newsveil", about = "Newsveil news proxy server")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the listening port from the config
    #[arg(long)]
    port: Option<u16>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Resolve config paths: packaged defaults plus an optional override.
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    let config = Config::load_with_defaults(
        if default_path.exists() {
            Some(&default_path)
        } else {
            None
        },
        override_path.as_deref(),
    )
    .await
    .context("failed to load configuration")?;
    info!(default = ?default_path, override_file = ?override_path, "configuration loaded");

    // Token cipher key: process-wide, read-only from here on. Encode and
    // decode must see the same key within a deployment.
    let key_env = config.token_key_env();
    let key_hex = std::env::var(key_env)
        .with_context(|| format!("token key env var '{}' not set", key_env))?;
    let codec = Arc::new(TokenCodec::from_hex_key(&key_hex, config.public_base())?);
    info!(public_base = %config.public_base(), "token codec initialized");

    let upstream = UpstreamClient::new(
        &config.upstream.feed_base_url,
        &config.upstream.summary_base_url,
        config.upstream.page_size.unwrap_or(20),
        config.upstream.fetch_timeout_seconds.unwrap_or(10),
    )?;

    // A missing rewrite backend degrades to pass-through titles rather
    // than refusing to start.
    let rewriter = match create_rewrite_provider(&config) {
        Ok(p) => p,
        Err(e) => {
            error!(%e, "failed to initialize rewrite provider; titles will pass through");
            None
        }
    };
    if rewriter.is_some() {
        info!("rewrite provider initialized");
    }

    let rewrite_enabled = rewriter.is_some();
    let assembler = Assembler::new(codec.clone(), rewriter, config.rewrite_prompts());

    let relay_connect_timeout = config
        .relay
        .as_ref()
        .and_then(|r| r.connect_timeout_seconds)
        .unwrap_or(10);

    let state = AppState {
        started_at: Utc::now(),
        cache: BatchCache::new(config.cache_ttl()),
        upstream,
        assembler,
        codec,
        relay_client: relay::relay_client(relay_connect_timeout)?,
        rewrite_enabled,
    };

    server::launch(&config, state, args.port).await
}

/// Create a rewrite provider based on configuration. `None` means the
/// pipeline runs without rewriting.
fn create_rewrite_provider(config: &Config) -> Result<Option<Arc<dyn RewriteProvider>>> {
    let Some(rw) = &config.rewrite else {
        return Ok(None);
    };

    match rw.adapter.as_deref().unwrap_or("none") {
        "remote" => {
            let api_url = rw
                .api_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434/v1/chat/completions".to_string());

            let api_key_env = rw
                .api_key_env
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("missing api_key_env in rewrite config"))?;
            let api_key = std::env::var(api_key_env)
                .with_context(|| format!("rewrite API key env var '{}' not set", api_key_env))?;

            let provider = RemoteRewriteProvider::new(api_url, api_key).with_defaults(
                rw.timeout_seconds.unwrap_or(30),
                rw.max_tokens.unwrap_or(1000),
                rw.temperature.unwrap_or(0.7),
            );
            Ok(Some(Arc::new(provider)))
        }
        "none" => Ok(None),
        other => anyhow::bail!("unknown rewrite adapter type: {}", other),
    }
}
