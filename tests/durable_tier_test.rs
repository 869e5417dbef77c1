use async_trait::async_trait;
use chunked_upload_backend::config::UploadConfig;
use chunked_upload_backend::entities::prelude::ChunkedKv;
use chunked_upload_backend::infrastructure::database::run_migrations;
use chunked_upload_backend::services::ingestion::{DocumentIngestor, IngestionResponse};
use chunked_upload_backend::services::tiered_store::TieredKeyValueStore;
use chunked_upload_backend::services::tiers::{
    DurableStore, ProcessMemory, Tier, UnavailableTier,
};
use chunked_upload_backend::services::upload_coordinator::{
    StartUploadRequest, UploadChunkRequest, UploadCoordinator,
};
use sea_orm::{Database, EntityTrait, PaginatorTrait};
use serde_json::{Value, json};
use std::sync::Arc;

struct EchoIngestor;

#[async_trait]
impl DocumentIngestor for EchoIngestor {
    async fn create(&self, document: Value) -> IngestionResponse {
        IngestionResponse::new(201, document)
    }

    async fn update(&self, _persistent_id: &str, document: Value) -> IngestionResponse {
        IngestionResponse::new(200, document)
    }
}

#[tokio::test]
async fn test_upload_survives_on_durable_tier_when_fast_tier_is_down() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    run_migrations(&db).await.unwrap();

    let memory = Arc::new(ProcessMemory::new());
    let store = Arc::new(TieredKeyValueStore::new(
        Arc::new(UnavailableTier::new(Tier::Fast)),
        Arc::new(DurableStore::new(db.clone())),
        memory.clone(),
    ));
    let coordinator = UploadCoordinator::new(
        store,
        Arc::new(EchoIngestor),
        UploadConfig::development(),
    );

    let session_id = coordinator
        .start(StartUploadRequest {
            persistent_id: None,
            total_chunks: 2,
            total_size: 16,
            is_update: false,
            is_compressed: false,
        })
        .await
        .unwrap()
        .session_id;

    for (index, data) in [(1, "\"ok\"]"), (0, "[\"still\",")] {
        coordinator
            .upload_chunk(UploadChunkRequest {
                session_id: session_id.clone(),
                chunk_index: index,
                data: data.to_string(),
            })
            .await
            .unwrap();
    }

    // Session plus two chunks, nothing in process memory
    assert_eq!(ChunkedKv::find().count(&db).await.unwrap(), 3);
    assert!(memory.is_empty());

    let status = coordinator.status(&session_id).await.unwrap();
    assert_eq!(status.tier, Tier::Durable);
    assert_eq!(status.received_chunks, 2);

    let res = coordinator.complete(&session_id).await.unwrap();
    assert_eq!(res.status, 201);
    assert_eq!(res.body, json!(["still", "ok"]));

    assert_eq!(ChunkedKv::find().count(&db).await.unwrap(), 0);
}
