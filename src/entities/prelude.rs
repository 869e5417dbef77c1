pub use super::chunked_kv::Entity as ChunkedKv;
