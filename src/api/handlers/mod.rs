pub mod chunked;
pub mod health;
