pub mod prelude;

pub mod chunked_kv;
