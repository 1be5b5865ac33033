mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{TestApp, embed};

const BOUNDARY: &str = "dedup-test-boundary";

fn router(app: &TestApp) -> Router {
    app.container.create_http_server().router()
}

fn upload_request(user_id: Option<&str>, filename: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: text/plain\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri("/files")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(user_id) = user_id {
        builder = builder.header("x-user-id", user_id);
    }
    builder.body(Body::from(body)).unwrap()
}

fn get(uri: &str, user_id: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-id", user_id)
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str, user_id: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("x-user-id", user_id)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, user_id: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user-id", user_id)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::in_memory();
    let (status, body) = send(&router(&app), get("/health", "anyone")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
}

#[tokio::test]
async fn test_upload_requires_user_header() {
    let app = TestApp::in_memory();
    let (status, body) = send(&router(&app), upload_request(None, "a.txt", b"hello")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "MISSING_USER");
    assert_eq!(app.stats().await.global_files, 0);
}

#[tokio::test]
async fn test_upload_created_then_linked() {
    let app = TestApp::in_memory();
    let router = router(&app);

    let (status, body) = send(&router, upload_request(Some("u1"), "a.txt", b"hello world")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "created");
    assert_eq!(body["data"]["chunks_total"], 1);
    assert_eq!(
        body["data"]["content_hash"],
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );

    let (status, body) = send(&router, upload_request(Some("u2"), "b.txt", b"hello world")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "linked");
    assert_eq!(body["data"]["chunks_total"], 0);
}

#[tokio::test]
async fn test_upload_parse_failure_is_unprocessable() {
    let app = TestApp::in_memory();
    let (status, body) = send(
        &router(&app),
        upload_request(Some("u1"), "bad.txt", &[0xc3, 0x28, 0xa0]),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "PARSE_FAILED");
    assert_eq!(app.stats().await, Default::default());
}

#[tokio::test]
async fn test_file_endpoints_are_scoped_to_the_caller() {
    let app = TestApp::in_memory();
    let router = router(&app);

    let (_, body) = send(&router, upload_request(Some("owner"), "notes.md", b"first\nsecond")).await;
    let file_id = body["data"]["file_id"].as_str().unwrap().to_string();

    let (status, body) = send(&router, get(&format!("/files/{file_id}"), "owner")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["filename"], "notes.md");
    assert_eq!(body["data"]["size"], 12);
    assert_eq!(body["data"]["chunk_count"], 2);

    let (status, body) = send(&router, get(&format!("/files/{file_id}"), "stranger")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "FILE_NOT_FOUND");

    let (status, body) = send(&router, get(&format!("/files/{file_id}/chunks"), "owner")).await;
    assert_eq!(status, StatusCode::OK);
    let chunks = body["data"]["chunks"].as_array().unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0]["content"], "first");
    assert_eq!(chunks[1]["chunk_index"], 1);

    let (status, _) = send(&router, get(&format!("/files/{file_id}/chunks"), "stranger")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&router, get("/files", "owner")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["files"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["meta"]["total"], 1);

    let (_, body) = send(&router, get("/files", "stranger")).await;
    assert!(body["data"]["files"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_files_paginates() {
    let app = TestApp::in_memory();
    let router = router(&app);

    for i in 0..3 {
        let name = format!("f{i}.txt");
        let text = format!("document number {i}");
        send(&router, upload_request(Some("u"), &name, text.as_bytes())).await;
    }

    let (status, body) = send(&router, get("/files?skip=1&limit=1", "u")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["files"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["meta"]["offset"], 1);
    assert_eq!(body["data"]["meta"]["limit"], 1);
    assert_eq!(body["data"]["meta"]["total"], 3);
}

#[tokio::test]
async fn test_search_with_text_and_embedding() {
    let app = TestApp::in_memory();
    let router = router(&app);

    send(&router, upload_request(Some("u"), "fruit.txt", b"apple banana\ncar engine")).await;

    let (status, body) = send(
        &router,
        post_json("/search", "u", json!({ "query": "apple banana", "top_k": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_results"], 1);
    assert_eq!(body["data"]["results"][0]["content"], "apple banana");

    let (status, body) = send(
        &router,
        post_json("/search", "u", json!({ "query_embedding": embed("car engine") })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["results"][0]["content"], "car engine");

    let (status, body) = send(&router, post_json("/search", "other", json!({ "query": "apple" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_results"], 0);
}

#[tokio::test]
async fn test_search_without_query_is_rejected() {
    let app = TestApp::in_memory();
    let (status, _) = send(&router(&app), post_json("/search", "u", json!({ "top_k": 3 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &router(&app),
        post_json("/search", "u", json!({ "query_embedding": [1.0, 2.0] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_and_stats() {
    let app = TestApp::in_memory();
    let router = router(&app);

    let (_, body) = send(&router, upload_request(Some("u"), "tmp.txt", b"ephemeral")).await;
    let file_id = body["data"]["file_id"].as_str().unwrap().to_string();

    let (_, body) = send(&router, get("/stats", "u")).await;
    assert_eq!(body["data"]["global_files"], 1);
    assert_eq!(body["data"]["chunk_associations"], 1);

    let (status, body) = send(&router, delete(&format!("/files/{file_id}"), "stranger")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pointer_removed"], false);

    let (status, body) = send(&router, delete(&format!("/files/{file_id}"), "u")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], true);
    assert_eq!(body["data"]["content_collected"], true);
    assert_eq!(body["data"]["chunks_collected"], 1);

    let (_, body) = send(&router, get("/stats", "u")).await;
    assert_eq!(body["data"]["global_files"], 0);
    assert_eq!(body["data"]["global_chunks"], 0);
    assert_eq!(body["data"]["files"], 0);
}
