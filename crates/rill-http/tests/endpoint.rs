//! Feed endpoint behavior over real requests: control options, start
//! selection, dialects, and subscription lifecycle.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use tower::ServiceExt;

use rill_core::{Entry, MemoryPersister, Stream};
use rill_http::{CURRENT_STREAM_SIZE_HEADER, SUBSCRIPTION_ID_HEADER};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Item {
    tag: String,
}

impl Entry for Item {
    fn language_schemas() -> BTreeMap<String, String> {
        BTreeMap::from([("rust".to_string(), "struct Item { tag: String }".to_string())])
    }
}

fn item(tag: &str) -> Item {
    Item {
        tag: tag.to_string(),
    }
}

/// Stream with entries at fixed timestamps 100, 200, 300.
fn feed() -> (Arc<Stream<MemoryPersister<Item>>>, Router) {
    let stream = Arc::new(Stream::<MemoryPersister<Item>>::in_memory());
    stream.publish_at(item("a"), 100).unwrap();
    stream.publish_at(item("b"), 200).unwrap();
    stream.publish_at(item("c"), 300).unwrap();
    let app = rill_http::router(Arc::clone(&stream));
    (stream, app)
}

fn empty_feed() -> (Arc<Stream<MemoryPersister<Item>>>, Router) {
    let stream = Arc::new(Stream::<MemoryPersister<Item>>::in_memory());
    let app = rill_http::router(Arc::clone(&stream));
    (stream, app)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// --- control options ---

#[tokio::test]
async fn test_sizeonly_get_reports_header_and_body() {
    let (_stream, app) = feed();
    let response = app.oneshot(get("/?sizeonly")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CURRENT_STREAM_SIZE_HEADER].to_str().unwrap(),
        "3"
    );
    assert_eq!(body_text(response).await, "3\n");
}

#[tokio::test]
async fn test_sizeonly_head_has_header_but_no_body() {
    let (_stream, app) = feed();
    let request = Request::builder()
        .method("HEAD")
        .uri("/?sizeonly")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CURRENT_STREAM_SIZE_HEADER].to_str().unwrap(),
        "3"
    );
    assert!(body_text(response).await.is_empty());
}

#[tokio::test]
async fn test_non_get_head_is_method_not_allowed() {
    let (_stream, app) = feed();
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_invalid_json_dialect_is_not_found() {
    let (_stream, app) = feed();
    let response = app.oneshot(get("/?json=xml")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("`?json`"));
}

#[tokio::test]
async fn test_malformed_number_is_bad_request() {
    let (_stream, app) = feed();
    let response = app.oneshot(get("/?i=abc")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// --- schema ---

#[tokio::test]
async fn test_schema_default_is_full_descriptor() {
    let (_stream, app) = feed();
    let response = app.oneshot(get("/?schema")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(doc["type_name"], "Item");
    assert!(doc["type_id"].is_u64());
    assert!(doc["language"]["rust"].is_string());
}

#[tokio::test]
async fn test_schema_simple_reports_namespace() {
    let (_stream, app) = feed();
    let response = app.oneshot(get("/?schema&format=simple")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(doc["entry_name"], "TopLevelEntry");
    assert_eq!(doc["namespace_name"], "RillSchema");
    assert_eq!(doc["type_id"], serde_json::json!(Item::type_id()));
}

#[tokio::test]
async fn test_schema_language_text_is_served_verbatim() {
    let (_stream, app) = feed();
    let response = app.oneshot(get("/?schema&format=rust")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "struct Item { tag: String }");
}

#[tokio::test]
async fn test_schema_unknown_format_is_structured_404() {
    let (_stream, app) = feed();
    let response = app.oneshot(get("/?schema&format=bogus")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let doc: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(doc["unsupported_format_requested"], "bogus");
    assert!(doc["error"].as_str().unwrap().contains("Unsupported"));
}

// --- start selection and bounded reads ---

#[tokio::test]
async fn test_tail_one_with_n_one_delivers_exactly_the_last_entry() {
    let (_stream, app) = feed();
    let response = app.oneshot(get("/?tail=1&n=1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1);
    let (cursor, entry) = lines[0].split_once('\t').unwrap();
    let cursor: serde_json::Value = serde_json::from_str(cursor).unwrap();
    assert_eq!(cursor["index"], 2);
    assert_eq!(entry, r#"{"tag":"c"}"#);
}

#[tokio::test]
async fn test_since_starts_at_absolute_timestamp() {
    let (_stream, app) = feed();
    let response = app.oneshot(get("/?since=200&n=2")).await.unwrap();
    let text = body_text(response).await;
    let tags: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line.split_once('\t').unwrap().1).unwrap())
        .collect();
    assert_eq!(tags, vec![
        serde_json::json!({"tag": "b"}),
        serde_json::json!({"tag": "c"}),
    ]);
}

#[tokio::test]
async fn test_nowait_closes_at_end_of_stream() {
    let (_stream, app) = feed();
    let response = app.oneshot(get("/?nowait")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    assert_eq!(text.lines().count(), 3);
}

#[tokio::test]
async fn test_nowait_past_the_end_returns_empty_200() {
    let (_stream, app) = feed();
    let response = app.oneshot(get("/?i=3&nowait")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.is_empty());
}

#[tokio::test]
async fn test_n_zero_returns_empty_200() {
    let (stream, app) = feed();
    let response = app.oneshot(get("/?n=0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.is_empty());
    assert_eq!(stream.http_subscription_count(), 0);
}

#[tokio::test]
async fn test_minimal_dialect_frames_bare_entries() {
    let (_stream, app) = feed();
    let response = app.oneshot(get("/?json=js&n=1")).await.unwrap();
    assert_eq!(body_text(response).await, "{\"tag\":\"a\"}\n");
}

#[tokio::test]
async fn test_fsharp_dialect_wraps_cases() {
    let (_stream, app) = feed();
    let response = app.oneshot(get("/?json=fs&n=1")).await.unwrap();
    let doc: serde_json::Value =
        serde_json::from_str(body_text(response).await.trim_end()).unwrap();
    assert_eq!(doc["Case"], "Item");
    assert_eq!(doc["Fields"][0]["tag"], "a");
}

// --- subscription lifecycle ---

#[tokio::test]
async fn test_terminate_unknown_subscription_is_not_found() {
    let (_stream, app) = feed();
    let response = app.oneshot(get("/?terminate=nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_terminate_closes_a_live_subscription() {
    let (stream, app) = empty_feed();

    // Open a subscription that would otherwise wait forever.
    let response = app.clone().oneshot(get("/?n=5")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let id = response.headers()[SUBSCRIPTION_ID_HEADER]
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(stream.http_subscription_count(), 1);
    drop(response);

    let response = app
        .clone()
        .oneshot(get(&format!("/?terminate={id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The deferred eraser clears the registry within a bounded time.
    for _ in 0..500 {
        if stream.http_subscription_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(stream.http_subscription_count(), 0);

    let response = app
        .oneshot(get(&format!("/?terminate={id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
