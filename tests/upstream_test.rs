use mockito::Matcher;
use newsveil::error::UpstreamFetchError;
use newsveil::upstream::UpstreamClient;

fn client(server: &mockito::Server) -> UpstreamClient {
    UpstreamClient::new(
        format!("{}/news", server.url()),
        format!("{}/article", server.url()),
        20,
        5,
    )
    .expect("build upstream client")
}

#[tokio::test]
async fn latest_parses_items_and_page_cursor() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/news")
        .match_query(Matcher::UrlEncoded("page_size".into(), "20".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "items": [
                    {"title": "A", "content": "c1", "image_url": "http://x/1.png",
                     "hash_id": "h1", "source_url": "http://news/1"},
                    {"title": "B", "content": "c2", "image_url": "",
                     "hash_id": "h2", "source_url": "http://news/2"}
                ],
                "min_news_id": "m1"
            }"#,
        )
        .create_async()
        .await;

    let batch = client(&server).latest().await.unwrap();

    assert_eq!(batch.items.len(), 2);
    assert_eq!(batch.items[0].title, "A");
    assert_eq!(batch.items[1].hash_id, "h2");
    assert_eq!(batch.next_cursor, "m1");
    mock.assert_async().await;
}

#[tokio::test]
async fn cursor_falls_back_to_last_item_id() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/news")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"items": [{"title": "A", "hash_id": "h1"}, {"title": "B", "hash_id": "h2"}]}"#,
        )
        .create_async()
        .await;

    let batch = client(&server).latest().await.unwrap();
    assert_eq!(batch.next_cursor, "h2");
}

#[tokio::test]
async fn more_sends_the_cursor() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/news")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page_size".into(), "20".into()),
            Matcher::UrlEncoded("min_news_id".into(), "cursor-7".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"items": [], "min_news_id": "cursor-8"}"#)
        .create_async()
        .await;

    let batch = client(&server).more("cursor-7").await.unwrap();
    assert!(batch.items.is_empty());
    assert_eq!(batch.next_cursor, "cursor-8");
    mock.assert_async().await;
}

#[tokio::test]
async fn non_success_status_is_typed() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/news")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let err = client(&server).latest().await.unwrap_err();
    assert!(matches!(err, UpstreamFetchError::Status(503)));
}

#[tokio::test]
async fn undecodable_body_is_distinct_from_outage() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/news")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("<html>definitely not the feed</html>")
        .create_async()
        .await;

    let err = client(&server).latest().await.unwrap_err();
    assert!(matches!(err, UpstreamFetchError::Malformed(_)));
}

#[tokio::test]
async fn article_parses_with_defaults_for_missing_fields() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/article")
        .match_query(Matcher::UrlEncoded(
            "url".into(),
            "http://news/1".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"title": "T", "full_text": "body"}"#)
        .create_async()
        .await;

    let article = client(&server).article("http://news/1").await.unwrap();
    assert_eq!(article.title, "T");
    assert_eq!(article.full_text, "body");
    assert_eq!(article.image_url, "");
    assert_eq!(article.summary, "");
    mock.assert_async().await;
}
