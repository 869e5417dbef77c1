use std::env;

/// Longest session TTL honored, 30 days.
pub const MAX_SESSION_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Configuration for the chunked upload service
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// TTL applied to session and chunk records in every tier (default: 3600 s)
    pub session_ttl_secs: u64,

    /// Upper bound for `totalChunks` on start (default: 10 000)
    pub max_total_chunks: u32,

    /// Upper bound for the client-declared `totalSize` (default: 256 MB)
    pub max_total_size: u64,

    /// Request body limit for a single chunk upload (default: 4 MB)
    pub max_chunk_bytes: usize,

    /// Redis URL for the fast tier. Unset means the tier is unavailable.
    pub redis_url: Option<String>,

    /// Per-operation timeout against Redis in milliseconds (default: 1500)
    pub fast_cache_timeout_ms: u64,

    /// How long Redis is skipped after a failure (default: 30 s)
    pub fast_cache_cooldown_secs: u64,

    /// Database URL for the durable tier. Unset means the tier is unavailable.
    pub database_url: Option<String>,

    /// Expiry sweep period for the memory and durable tiers (default: 300 s)
    pub memory_sweep_interval_secs: u64,

    /// Purge session state even when ingestion fails (default: true)
    pub purge_on_ingest_failure: bool,

    /// Base URL of the downstream route create/update API
    pub ingest_base_url: String,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 60 * 60,
            max_total_chunks: 10_000,
            max_total_size: 256 * 1024 * 1024, // 256 MB
            max_chunk_bytes: 4 * 1024 * 1024,  // 4 MB
            redis_url: None,
            fast_cache_timeout_ms: 1500,
            fast_cache_cooldown_secs: 30,
            database_url: None,
            memory_sweep_interval_secs: 300,
            purge_on_ingest_failure: true,
            ingest_base_url: "http://127.0.0.1:8080/api/routes".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl UploadConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            session_ttl_secs: parse_var("SESSION_TTL_SECS").unwrap_or(default.session_ttl_secs),

            max_total_chunks: parse_var("MAX_TOTAL_CHUNKS").unwrap_or(default.max_total_chunks),

            max_total_size: parse_var("MAX_TOTAL_SIZE").unwrap_or(default.max_total_size),

            max_chunk_bytes: parse_var("MAX_CHUNK_BYTES").unwrap_or(default.max_chunk_bytes),

            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty()),

            fast_cache_timeout_ms: parse_var("FAST_CACHE_TIMEOUT_MS")
                .unwrap_or(default.fast_cache_timeout_ms),

            fast_cache_cooldown_secs: parse_var("FAST_CACHE_COOLDOWN_SECS")
                .unwrap_or(default.fast_cache_cooldown_secs),

            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),

            memory_sweep_interval_secs: parse_var("MEMORY_SWEEP_INTERVAL_SECS")
                .unwrap_or(default.memory_sweep_interval_secs),

            purge_on_ingest_failure: env::var("PURGE_ON_INGEST_FAILURE")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(default.purge_on_ingest_failure),

            ingest_base_url: env::var("INGEST_BASE_URL").unwrap_or(default.ingest_base_url),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development and tests (memory tier only, short sweeps)
    pub fn development() -> Self {
        Self {
            memory_sweep_interval_secs: 30,
            ..Self::default()
        }
    }

    /// Session TTL clamped between one second, the smallest expiry Redis
    /// accepts, and [`MAX_SESSION_TTL_SECS`].
    pub fn effective_ttl_secs(&self) -> u64 {
        self.session_ttl_secs.clamp(1, MAX_SESSION_TTL_SECS)
    }
}
