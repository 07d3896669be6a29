use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::serde::json::Json;
use rocket::{get, post, routes, Build, Rocket, Route, State};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::assembler::{ArticleSummary, Assembler, NewsBatch};
use crate::cache::{more_key, BatchCache, LATEST_KEY};
use crate::config::Config;
use crate::error::ApiError;
use crate::relay::{self, RelayedImage};
use crate::token::TokenCodec;
use crate::upstream::UpstreamClient;

/// Application state stored inside Rocket managed state.
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub cache: BatchCache,
    pub upstream: UpstreamClient,
    pub assembler: Assembler,
    pub codec: Arc<TokenCodec>,
    pub relay_client: reqwest::Client,
    pub rewrite_enabled: bool,
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Response structure for `/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    cache_entries: u64,
    rewrite_enabled: bool,
}

#[get("/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
        cache_entries: state.cache.entry_count(),
        rewrite_enabled: state.rewrite_enabled,
    })
}

/// Latest batch: cached when fresh, otherwise one coalesced
/// fetch-and-assemble. A failed assembly is never cached.
#[get("/news")]
async fn latest_news(state: &State<AppState>) -> Result<Json<NewsBatch>, ApiError> {
    let batch = state
        .cache
        .fetch_with(LATEST_KEY, async {
            let page = state.upstream.latest().await?;
            Ok(state.assembler.assemble(page.items, &page.next_cursor).await)
        })
        .await?;
    Ok(Json(batch.as_ref().clone()))
}

/// Request body for `/news-more`. The field is required; it arrives
/// camel-cased from clients.
#[derive(Deserialize)]
struct NewsMoreRequest {
    #[serde(rename = "minNewsId")]
    min_news_id: Option<String>,
}

#[post("/news-more", data = "<body>")]
async fn news_more(
    state: &State<AppState>,
    body: Json<NewsMoreRequest>,
) -> Result<Json<NewsBatch>, ApiError> {
    let Some(cursor) = body.min_news_id.clone().filter(|c| !c.is_empty()) else {
        return Err(ApiError::MissingField("minNewsId"));
    };

    let batch = state
        .cache
        .fetch_with(more_key(&cursor), async {
            let page = state.upstream.more(&cursor).await?;
            Ok(state.assembler.assemble(page.items, &page.next_cursor).await)
        })
        .await?;
    Ok(Json(batch.as_ref().clone()))
}

#[derive(Deserialize)]
struct SummarizeRequest {
    url: Option<String>,
}

#[post("/summarize", data = "<body>")]
async fn summarize_article(
    state: &State<AppState>,
    body: Json<SummarizeRequest>,
) -> Result<Json<ArticleSummary>, ApiError> {
    let Some(url) = body.url.clone().filter(|u| !u.is_empty()) else {
        return Err(ApiError::MissingField("url"));
    };

    let raw = state.upstream.article(&url).await?;
    Ok(Json(state.assembler.summarize(raw).await))
}

/// Image relay: the query parameter is the opaque token produced by the
/// codec, never an origin URL.
#[get("/image-urls?<url>")]
async fn image_relay(state: &State<AppState>, url: &str) -> Result<RelayedImage, ApiError> {
    let image = relay::relay(&state.relay_client, &state.codec, url).await?;
    Ok(image)
}

fn api_routes() -> Vec<Route> {
    routes![
        health,
        status,
        latest_news,
        news_more,
        summarize_article,
        image_relay,
    ]
}

/// Build a Rocket instance with the given state mounted. Split from
/// [`launch`] so tests can drive it with a local client.
pub fn rocket(state: AppState) -> Rocket<Build> {
    rocket::build().manage(state).mount("/", api_routes())
}

/// Build and launch the Rocket server, applying `[server]` bind/port
/// from the config (and an optional CLI port override) to the figment.
/// Blocks until Rocket shuts down.
pub async fn launch(config: &Config, state: AppState, port_override: Option<u16>) -> Result<()> {
    let mut fig = rocket::Config::figment();
    if let Some(server) = &config.server {
        if let Some(bind) = &server.bind {
            fig = fig.merge(("address", bind.clone()));
        }
        if let Some(port) = server.port {
            fig = fig.merge(("port", port));
        }
    }
    if let Some(port) = port_override {
        fig = fig.merge(("port", port));
    }

    info!("Starting Rocket HTTP server");
    rocket::custom(fig)
        .manage(state)
        .mount("/", api_routes())
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    info!("Rocket HTTP server has shut down");
    Ok(())
}
