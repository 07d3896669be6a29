use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mockito::Matcher;
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;

use newsveil::assembler::Assembler;
use newsveil::cache::BatchCache;
use newsveil::rewrite::RewritePrompts;
use newsveil::server::{self, AppState};
use newsveil::token::{TokenCodec, KEY_LEN};
use newsveil::upstream::UpstreamClient;

fn test_state(upstream_url: &str, ttl: Duration) -> AppState {
    let codec = Arc::new(TokenCodec::new(&[5u8; KEY_LEN], "/image-urls"));
    AppState {
        started_at: Utc::now(),
        cache: BatchCache::new(ttl),
        upstream: UpstreamClient::new(
            format!("{upstream_url}/news"),
            format!("{upstream_url}/article"),
            2,
            5,
        )
        .expect("upstream client"),
        assembler: Assembler::new(codec.clone(), None, RewritePrompts::default()),
        codec,
        relay_client: reqwest::Client::new(),
        rewrite_enabled: false,
    }
}

async fn test_client(state: AppState) -> Client {
    Client::tracked(server::rocket(state))
        .await
        .expect("rocket client")
}

#[tokio::test]
async fn news_more_without_cursor_is_400_plain_text() {
    let server = mockito::Server::new_async().await;
    let client = test_client(test_state(&server.url(), Duration::from_secs(60))).await;

    let resp = client
        .post("/news-more")
        .header(ContentType::JSON)
        .body("{}")
        .dispatch()
        .await;

    assert_eq!(resp.status(), Status::BadRequest);
    assert_eq!(resp.into_string().await.unwrap(), "minNewsId is required");
}

#[tokio::test]
async fn summarize_without_url_is_400_plain_text() {
    let server = mockito::Server::new_async().await;
    let client = test_client(test_state(&server.url(), Duration::from_secs(60))).await;

    let resp = client
        .post("/summarize")
        .header(ContentType::JSON)
        .body("{}")
        .dispatch()
        .await;

    assert_eq!(resp.status(), Status::BadRequest);
    assert_eq!(resp.into_string().await.unwrap(), "url is required");
}

#[tokio::test]
async fn cached_cursor_page_skips_the_upstream_fetch() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/news")
        .match_query(Matcher::UrlEncoded("min_news_id".into(), "abc".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"items": [{"title": "A", "hash_id": "h1"}], "min_news_id": "next"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = test_client(test_state(&server.url(), Duration::from_secs(60))).await;

    for _ in 0..2 {
        let resp = client
            .post("/news-more")
            .header(ContentType::JSON)
            .body(r#"{"minNewsId": "abc"}"#)
            .dispatch()
            .await;
        assert_eq!(resp.status(), Status::Ok);

        let items: serde_json::Value =
            serde_json::from_str(&resp.into_string().await.unwrap()).unwrap();
        assert_eq!(items[0]["title"], "A");
        assert_eq!(items[0]["paginationCursor"], "next");
    }

    // Exactly one upstream call despite two requests.
    mock.assert_async().await;
}

#[tokio::test]
async fn news_serves_a_normalized_batch() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/news")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "items": [
                    {"title": "A", "content": "c1", "image_url": "http://origin/1.png",
                     "hash_id": "h1", "source_url": "http://news/1"}
                ],
                "min_news_id": "m1"
            }"#,
        )
        .create_async()
        .await;

    let client = test_client(test_state(&server.url(), Duration::from_secs(60))).await;
    let resp = client.get("/news").dispatch().await;
    assert_eq!(resp.status(), Status::Ok);

    let items: serde_json::Value =
        serde_json::from_str(&resp.into_string().await.unwrap()).unwrap();
    assert_eq!(items[0]["index"], 0);
    assert_eq!(items[0]["title"], "A");
    assert_eq!(items[0]["content"], "c1");
    assert_eq!(items[0]["paginationCursor"], "m1");
    assert_eq!(items[0]["sourceHashId"], "h1");

    // The image URL is the relay indirection, never the origin.
    let image_url = items[0]["imageUrl"].as_str().unwrap();
    assert!(image_url.starts_with("/image-urls?url="));
    assert!(!image_url.contains("origin"));
}

#[tokio::test]
async fn upstream_failure_is_500_json_with_generic_error() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/news")
        .with_status(502)
        .create_async()
        .await;

    let client = test_client(test_state(&server.url(), Duration::from_secs(60))).await;
    let resp = client.get("/news").dispatch().await;

    assert_eq!(resp.status(), Status::InternalServerError);
    let body: serde_json::Value =
        serde_json::from_str(&resp.into_string().await.unwrap()).unwrap();
    assert_eq!(body["error"], "failed to assemble news batch");
}

#[tokio::test]
async fn summarize_serves_the_no_data_sentinel() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/article")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"title": "", "full_text": "", "image_url": "x", "summary": "y"}"#)
        .create_async()
        .await;

    let client = test_client(test_state(&server.url(), Duration::from_secs(60))).await;
    let resp = client
        .post("/summarize")
        .header(ContentType::JSON)
        .body(r#"{"url": "http://news/1"}"#)
        .dispatch()
        .await;
    assert_eq!(resp.status(), Status::Ok);

    let body: serde_json::Value =
        serde_json::from_str(&resp.into_string().await.unwrap()).unwrap();
    assert_eq!(body["title"], "no data");
    assert_eq!(body["fullText"], "no data");
    assert_eq!(body["imageUrl"], "no data");
    assert_eq!(body["summary"], "no data");
}

#[tokio::test]
async fn relay_streams_origin_bytes_with_original_content_type() {
    let mut server = mockito::Server::new_async().await;
    let payload: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 1, 2, 3];

    let _origin = server
        .mock("GET", "/pic.png")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(payload)
        .create_async()
        .await;

    let state = test_state(&server.url(), Duration::from_secs(60));
    let codec = state.codec.clone();
    let client = test_client(state).await;

    let wrapped = codec
        .image_url(&format!("{}/pic.png", server.url()))
        .unwrap();
    let resp = client.get(wrapped.as_str()).dispatch().await;

    assert_eq!(resp.status(), Status::Ok);
    assert_eq!(resp.content_type(), Some(ContentType::PNG));
    assert_eq!(resp.into_bytes().await.unwrap(), payload);
}

#[tokio::test]
async fn relay_rejects_a_forged_token_without_leaking() {
    let server = mockito::Server::new_async().await;
    let client = test_client(test_state(&server.url(), Duration::from_secs(60))).await;

    let resp = client.get("/image-urls?url=not-a-token").dispatch().await;

    assert_eq!(resp.status(), Status::InternalServerError);
    assert_eq!(resp.into_string().await.unwrap(), "image relay failed");
}
