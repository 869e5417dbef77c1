pub mod chunk_store;
pub mod cleanup;
pub mod expiration;
pub mod ingestion;
pub mod reassembler;
pub mod session_store;
pub mod tiered_store;
pub mod tiers;
pub mod upload_coordinator;
