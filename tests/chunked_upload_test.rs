use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chunked_upload_backend::config::UploadConfig;
use chunked_upload_backend::services::ingestion::{DocumentIngestor, IngestionResponse};
use chunked_upload_backend::services::reassembler::{compress_payload, split_into_chunks};
use chunked_upload_backend::services::tiered_store::TieredKeyValueStore;
use chunked_upload_backend::services::tiers::{ProcessMemory, Tier, UnavailableTier};
use chunked_upload_backend::services::upload_coordinator::UploadCoordinator;
use chunked_upload_backend::{AppState, create_app};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Records documents and answers with a fixed status.
struct StubIngestor {
    status: u16,
    received: Mutex<Vec<(Option<String>, Value)>>,
}

impl StubIngestor {
    fn new(status: u16) -> Self {
        Self {
            status,
            received: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DocumentIngestor for StubIngestor {
    async fn create(&self, document: Value) -> IngestionResponse {
        self.received.lock().unwrap().push((None, document.clone()));
        IngestionResponse::new(self.status, json!({ "id": "route-1", "route": document }))
    }

    async fn update(&self, persistent_id: &str, document: Value) -> IngestionResponse {
        self.received
            .lock()
            .unwrap()
            .push((Some(persistent_id.to_string()), document));
        IngestionResponse::new(self.status, json!({ "id": persistent_id, "updated": true }))
    }
}

fn setup(ingestor: Arc<StubIngestor>) -> Router {
    setup_with(ingestor, UploadConfig::development())
}

fn setup_with(ingestor: Arc<StubIngestor>, config: UploadConfig) -> Router {
    let store = Arc::new(TieredKeyValueStore::new(
        Arc::new(UnavailableTier::new(Tier::Fast)),
        Arc::new(UnavailableTier::new(Tier::Durable)),
        Arc::new(ProcessMemory::new()),
    ));
    let coordinator = Arc::new(UploadCoordinator::new(
        store.clone(),
        ingestor,
        config.clone(),
    ));

    create_app(AppState {
        coordinator,
        store,
        config,
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    let request = match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn start(app: &Router, body: Value) -> String {
    let (status, json) = send(app, "POST", "/chunked/start", Some(body)).await;
    assert_eq!(status, StatusCode::OK, "start failed: {json}");
    json["sessionId"].as_str().unwrap().to_string()
}

async fn upload(app: &Router, session_id: &str, index: i64, data: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/chunked/upload",
        Some(json!({ "sessionId": session_id, "chunkIndex": index, "data": data })),
    )
    .await
}

#[tokio::test]
async fn test_out_of_order_plain_upload() {
    let ingestor = Arc::new(StubIngestor::new(201));
    let app = setup(ingestor.clone());

    let session_id = start(&app, json!({ "totalChunks": 3, "totalSize": 13 })).await;

    let (status, json) = upload(&app, &session_id, 2, "2}").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({ "success": true, "receivedChunks": 1, "totalChunks": 3 })
    );
    upload(&app, &session_id, 0, "{\"a\":1,").await;
    let (_, json) = upload(&app, &session_id, 1, "\"b\":").await;
    assert_eq!(json["receivedChunks"], 3);

    let (status, json) = send(
        &app,
        "POST",
        "/chunked/complete",
        Some(json!({ "sessionId": session_id })),
    )
    .await;

    // Ingestion status and body are passed through
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json, json!({ "id": "route-1", "route": { "a": 1, "b": 2 } }));
    assert_eq!(ingestor.received.lock().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/chunked/status/{}", session_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_compressed_update_upload() {
    let ingestor = Arc::new(StubIngestor::new(200));
    let app = setup(ingestor.clone());

    let document = json!({ "name": "Coastal loop", "points": [[43.1, -8.4], [43.2, -8.5]] });
    let encoded = compress_payload(&document.to_string()).unwrap();
    let parts = split_into_chunks(&encoded, 3);

    let session_id = start(
        &app,
        json!({
            "persistentId": "route-77",
            "totalChunks": parts.len(),
            "totalSize": encoded.len(),
            "isUpdate": true,
            "isCompressed": true
        }),
    )
    .await;

    for (i, part) in parts.iter().enumerate().rev() {
        let (status, _) = upload(&app, &session_id, i as i64, part).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, json) = send(
        &app,
        "POST",
        "/chunked/complete",
        Some(json!({ "sessionId": session_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "id": "route-77", "updated": true }));

    let received = ingestor.received.lock().unwrap();
    assert_eq!(received[0].0.as_deref(), Some("route-77"));
    assert_eq!(received[0].1, document);
}

#[tokio::test]
async fn test_complete_before_all_chunks() {
    let ingestor = Arc::new(StubIngestor::new(201));
    let app = setup(ingestor.clone());

    let session_id = start(&app, json!({ "totalChunks": 3, "totalSize": 3 })).await;
    upload(&app, &session_id, 0, "[").await;
    upload(&app, &session_id, 0, "[").await;

    let (status, json) = send(
        &app,
        "POST",
        "/chunked/complete",
        Some(json!({ "sessionId": session_id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json,
        json!({ "error": "Not all chunks received", "receivedChunks": 1, "totalChunks": 3 })
    );
    assert!(ingestor.received.lock().unwrap().is_empty());

    let (status, json) = send(
        &app,
        "GET",
        &format!("/chunked/status/{}", session_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phase"], "receiving");
    assert_eq!(json["missingChunks"], json!([1, 2]));
    assert_eq!(json["tier"], "memory");
}

#[tokio::test]
async fn test_rejected_requests() {
    let app = setup(Arc::new(StubIngestor::new(201)));

    let (status, _) = send(&app, "POST", "/chunked/start", Some(json!({ "totalChunks": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/chunked/start",
        Some(json!({ "totalChunks": 2, "isUpdate": true })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = upload(&app, "missing-session", 0, "x").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].is_string());

    let session_id = start(&app, json!({ "totalChunks": 2 })).await;
    let (status, _) = upload(&app, &session_id, 5, "x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_corrupt_compressed_payload_is_server_error() {
    let ingestor = Arc::new(StubIngestor::new(201));
    let app = setup(ingestor.clone());

    let session_id = start(
        &app,
        json!({ "totalChunks": 1, "isCompressed": true }),
    )
    .await;
    upload(&app, &session_id, 0, "definitely not gzip").await;

    let (status, json) = send(
        &app,
        "POST",
        "/chunked/complete",
        Some(json!({ "sessionId": session_id })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["details"].as_str().unwrap().starts_with("Decompression failed"));
    assert!(ingestor.received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_json_payload_is_server_error() {
    let ingestor = Arc::new(StubIngestor::new(201));
    let app = setup(ingestor.clone());

    let session_id = start(&app, json!({ "totalChunks": 2 })).await;
    upload(&app, &session_id, 0, "{\"a\":").await;
    upload(&app, &session_id, 1, "}").await;

    let (status, json) = send(
        &app,
        "POST",
        "/chunked/complete",
        Some(json!({ "sessionId": session_id })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["details"].as_str().unwrap().starts_with("Malformed payload"));
    assert!(ingestor.received.lock().unwrap().is_empty());

    // Left in place for a retry
    let (status, _) = send(
        &app,
        "GET",
        &format!("/chunked/status/{}", session_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_expired_session_returns_not_found() {
    let ingestor = Arc::new(StubIngestor::new(201));
    let config = UploadConfig {
        session_ttl_secs: 1,
        ..UploadConfig::development()
    };
    let app = setup_with(ingestor.clone(), config);

    let session_id = start(&app, json!({ "totalChunks": 2 })).await;
    upload(&app, &session_id, 0, "[1,").await;
    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

    let (status, _) = upload(&app, &session_id, 1, "2]").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(
        &app,
        "POST",
        "/chunked/complete",
        Some(json!({ "sessionId": session_id })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].is_string());
    assert!(ingestor.received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_health_reports_degraded_tiers() {
    let app = setup(Arc::new(StubIngestor::new(201)));

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "degraded");
    assert_eq!(
        json["tiers"],
        json!([
            { "tier": "fast", "status": "disconnected" },
            { "tier": "durable", "status": "disconnected" },
            { "tier": "memory", "status": "connected" }
        ])
    );
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = setup(Arc::new(StubIngestor::new(201)));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "abc-123");

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
