use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;

/// Status and body produced by the downstream create/update logic. Passed
/// back to the uploading client untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionResponse {
    pub status: u16,
    pub body: Value,
}

impl IngestionResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Receives fully reassembled route documents.
#[async_trait]
pub trait DocumentIngestor: Send + Sync {
    async fn create(&self, document: Value) -> IngestionResponse;

    async fn update(&self, persistent_id: &str, document: Value) -> IngestionResponse;
}

/// Forwards documents to the route API over HTTP: `POST {base}` to create,
/// `PUT {base}/{persistentId}` to update.
pub struct HttpDocumentIngestor {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpDocumentIngestor {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url = reqwest::Url::parse(base_url.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Ingestion URL cannot carry a path: {}", base_url);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client, base_url })
    }

    async fn forward(&self, request: reqwest::RequestBuilder) -> IngestionResponse {
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("❌ Ingestion request failed: {}", e);
                return IngestionResponse::new(
                    502,
                    json!({ "error": "Document ingestion unavailable" }),
                );
            }
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!("❌ Failed to read ingestion response: {}", e);
                return IngestionResponse::new(
                    502,
                    json!({ "error": "Document ingestion response unreadable" }),
                );
            }
        };

        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text }))
        };
        IngestionResponse::new(status, body)
    }
}

#[async_trait]
impl DocumentIngestor for HttpDocumentIngestor {
    async fn create(&self, document: Value) -> IngestionResponse {
        let request = self.client.post(self.base_url.clone()).json(&document);
        self.forward(request).await
    }

    async fn update(&self, persistent_id: &str, document: Value) -> IngestionResponse {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(persistent_id);
        }
        let request = self.client.put(url).json(&document);
        self.forward(request).await
    }
}
