//! The reqwest-backed node and completion clients against loopback servers.

mod common;

use std::sync::Arc;
use std::time::Duration;

use nilstash_core::{
    AllotSplitter, ChatMessage, ClusterConfig, CompletionConfig, CompletionError, ContentRecord,
    HttpCompletionClient, HttpNodeClient, NodeClientConfig, NodeDescriptor, NodeTransport,
    TextCompletion, UploadCoordinator, UploadError,
};
use serde_json::json;

fn node_client() -> HttpNodeClient {
    let config = NodeClientConfig::default()
        .with_request_timeout(Duration::from_secs(5))
        .with_connect_timeout(Duration::from_secs(2))
        .with_system_proxy(false);
    HttpNodeClient::new(&config).unwrap()
}

fn local_config(base_url: &str) -> CompletionConfig {
    CompletionConfig::new(base_url, "m").with_system_proxy(false)
}

// ===========================================================================
// HttpNodeClient
// ===========================================================================

#[tokio::test]
async fn node_client_posts_share_with_bearer_auth() {
    let server = common::serve(vec![(200, r#"{"data":{"created":["r1"]},"errors":[]}"#)]).await;
    let node = NodeDescriptor::new(server.base_url.as_str(), "tok-0");
    let share = json!({"_id": "r1", "team": "t", "text": {"$share": "AAEC"}});

    let response = node_client().send(&node, "schema-1", &share).await;

    assert_eq!(response.status, Some(200));
    assert!(response.errors.is_empty());
    assert!(response.is_accepted());

    let requests = server.requests().await;
    let head = requests[0].to_ascii_lowercase();
    assert!(head.starts_with("post /api/v1/data/create "));
    assert!(head.contains("authorization: bearer tok-0"));
    assert!(head.contains("content-type: application/json"));
    assert_eq!(
        common::request_body(&requests[0]),
        json!({"schema": "schema-1", "data": [share]})
    );
}

#[tokio::test]
async fn node_client_reports_error_list_on_ok_status() {
    let server = common::serve(vec![(200, r#"{"errors":["document failed validation"]}"#)]).await;
    let node = NodeDescriptor::new(server.base_url.as_str(), "tok-0");

    let response = node_client().send(&node, "schema-1", &json!({})).await;

    assert_eq!(response.status, Some(200));
    assert_eq!(response.errors, vec!["document failed validation".to_string()]);
    assert!(!response.is_accepted());
}

#[tokio::test]
async fn node_client_reports_server_error_status() {
    let server = common::serve(vec![(500, r#"{"message":"internal"}"#)]).await;
    let node = NodeDescriptor::new(server.base_url.as_str(), "tok-0");

    let response = node_client().send(&node, "schema-1", &json!({})).await;

    assert_eq!(response.status, Some(500));
    assert!(!response.is_accepted());
    assert_eq!(response.body.as_deref(), Some(r#"{"message":"internal"}"#));
}

#[tokio::test]
async fn node_client_rejects_non_json_body_on_ok_status() {
    let server = common::serve(vec![(200, "<html>proxy login</html>")]).await;
    let node = NodeDescriptor::new(server.base_url.as_str(), "tok-0");

    let response = node_client().send(&node, "schema-1", &json!({})).await;

    assert_eq!(response.status, Some(200));
    assert_eq!(response.errors.len(), 1);
    assert!(!response.is_accepted());
}

#[tokio::test]
async fn node_client_accepts_empty_body_on_ok_status() {
    let server = common::serve(vec![(200, "")]).await;
    let node = NodeDescriptor::new(server.base_url.as_str(), "tok-0");

    let response = node_client().send(&node, "schema-1", &json!({})).await;

    assert!(response.is_accepted());
    assert_eq!(response.body, None);
}

#[tokio::test]
async fn node_client_turns_connection_refused_into_outcome() {
    let node = NodeDescriptor::new(common::closed_url().await, "tok-0");

    let response = node_client().send(&node, "schema-1", &json!({})).await;

    assert_eq!(response.status, None);
    assert_eq!(response.errors.len(), 1);
    assert!(!response.is_accepted());
}

#[tokio::test]
async fn coordinator_over_http_stops_at_first_failing_node() {
    let first = common::serve(vec![(200, r#"{"errors":[]}"#)]).await;
    let second = common::serve(vec![(500, "")]).await;
    let (third, third_url) = common::idle_listener().await;

    let cluster = ClusterConfig {
        hosts: vec![
            NodeDescriptor::new(first.base_url.as_str(), "a"),
            NodeDescriptor::new(second.base_url.as_str(), "b"),
            NodeDescriptor::new(third_url, "c"),
        ],
    };
    let coordinator =
        UploadCoordinator::new(cluster, "schema-1", AllotSplitter, Arc::new(node_client()));

    let err = coordinator
        .upload_detailed(&ContentRecord::new("team", "Call me Ishmael"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        UploadError::NodeRejected {
            node_index: 1,
            status: Some(500),
            ..
        }
    ));
    assert_eq!(first.requests().await.len(), 1);
    assert_eq!(second.requests().await.len(), 1);
    let untouched = tokio::time::timeout(Duration::from_millis(200), third.accept()).await;
    assert!(untouched.is_err(), "node 2 must never be contacted");
}

#[tokio::test]
async fn rejection_carries_raw_response_body() {
    let server = common::serve(vec![(500, "database unavailable: shard 7 read-only")]).await;
    let cluster = ClusterConfig {
        hosts: vec![NodeDescriptor::new(server.base_url.as_str(), "a")],
    };
    let coordinator =
        UploadCoordinator::new(cluster, "schema-1", AllotSplitter, Arc::new(node_client()));

    let err = coordinator
        .upload_detailed(&ContentRecord::new("team", "Call me Ishmael"))
        .await
        .unwrap_err();

    match &err {
        UploadError::NodeRejected { detail, .. } => assert_eq!(
            detail.as_deref(),
            Some("database unavailable: shard 7 read-only")
        ),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("shard 7 read-only"));
    server.requests().await;
}

// ===========================================================================
// HttpCompletionClient
// ===========================================================================

#[tokio::test]
async fn completion_client_returns_first_choice() {
    let server = common::serve(vec![(
        200,
        r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"{\"content\":\"hi\"}"}}]}"#,
    )])
    .await;
    let config = CompletionConfig::new(&server.base_url, "test-model")
        .with_api_key("sk-test")
        .with_system_proxy(false);
    let client = HttpCompletionClient::new(config).unwrap();

    let messages = vec![ChatMessage::system("rules"), ChatMessage::user("store hi")];
    let response = client.complete(&messages).await.unwrap();

    assert_eq!(response, r#"{"content":"hi"}"#);

    let requests = server.requests().await;
    let head = requests[0].to_ascii_lowercase();
    assert!(head.starts_with("post /chat/completions "));
    assert!(head.contains("authorization: bearer sk-test"));
    assert_eq!(
        common::request_body(&requests[0]),
        json!({
            "model": "test-model",
            "messages": [
                {"role": "system", "content": "rules"},
                {"role": "user", "content": "store hi"},
            ],
        })
    );
}

#[tokio::test]
async fn completion_client_surfaces_error_status() {
    let server = common::serve(vec![(429, r#"{"error":"rate limited"}"#)]).await;
    let client = HttpCompletionClient::new(local_config(&server.base_url)).unwrap();

    let err = client.complete(&[ChatMessage::user("x")]).await.unwrap_err();

    assert!(matches!(err, CompletionError::Status { status: 429, .. }));
    server.requests().await;
}

#[tokio::test]
async fn completion_client_rejects_empty_choices() {
    let server = common::serve(vec![(200, r#"{"choices":[]}"#)]).await;
    let client = HttpCompletionClient::new(local_config(&server.base_url)).unwrap();

    let err = client.complete(&[ChatMessage::user("x")]).await.unwrap_err();

    assert!(matches!(err, CompletionError::MalformedResponse(_)));
    server.requests().await;
}
