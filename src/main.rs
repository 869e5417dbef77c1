use chunked_upload_backend::config::UploadConfig;
use chunked_upload_backend::infrastructure::{cache, database};
use chunked_upload_backend::services::expiration::ExpiryWorker;
use chunked_upload_backend::services::ingestion::HttpDocumentIngestor;
use chunked_upload_backend::services::tiered_store::TieredKeyValueStore;
use chunked_upload_backend::services::tiers::{
    DurableStore, ProcessMemory, Tier, TierBackend, UnavailableTier,
};
use chunked_upload_backend::services::upload_coordinator::UploadCoordinator;
use chunked_upload_backend::{AppState, create_app};
use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service type to run (api, sweeper, all)
    #[arg(short, long, default_value = "all")]
    mode: String,

    /// Port for the API server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & logging
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chunked_upload_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !["api", "sweeper", "all"].contains(&args.mode.as_str()) {
        anyhow::bail!("Unknown mode '{}', expected api, sweeper or all", args.mode);
    }

    info!("🚀 Starting Chunked Upload Backend [Mode: {}]...", args.mode);

    let config = UploadConfig::from_env();
    info!(
        "🛡️  Upload Config: TTL={}s, Max Chunks={}, Max Size={}MB, Purge On Ingest Failure={}",
        config.effective_ttl_secs(),
        config.max_total_chunks,
        config.max_total_size / 1024 / 1024,
        config.purge_on_ingest_failure
    );

    // 2. Storage tiers
    let fast = cache::setup_fast_cache(&config);
    let durable_store = database::setup_database(&config)
        .await?
        .map(DurableStore::new);
    let durable: Arc<dyn TierBackend> = match &durable_store {
        Some(store) => Arc::new(store.clone()),
        None => Arc::new(UnavailableTier::new(Tier::Durable)),
    };
    let memory = Arc::new(ProcessMemory::new());
    let store = Arc::new(TieredKeyValueStore::new(fast, durable, memory.clone()));

    let ingestor = Arc::new(HttpDocumentIngestor::new(&config.ingest_base_url)?);
    info!("📨 Ingestion target: {}", config.ingest_base_url);

    let coordinator = Arc::new(UploadCoordinator::new(
        store.clone(),
        ingestor,
        config.clone(),
    ));

    // 3. Shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut handles = Vec::new();

    // 4. Expiry sweeper. Memory tier and locks live in the API process, so
    // it always sweeps them; the durable table is swept by `sweeper` or `all`.
    let serves_api = args.mode == "api" || args.mode == "all";
    let sweeps_durable = args.mode == "sweeper" || args.mode == "all";

    let mut worker = ExpiryWorker::new(
        Duration::from_secs(config.memory_sweep_interval_secs.max(1)),
        shutdown_rx.clone(),
    );
    if serves_api {
        worker = worker.with_process_state(memory, coordinator.locks().clone());
    }
    if sweeps_durable {
        match durable_store {
            Some(durable) => worker = worker.with_durable(durable),
            None => tracing::warn!("👷 No durable tier configured, nothing to sweep there"),
        }
    }
    if worker.has_work() {
        handles.push(tokio::spawn(worker.run()));
        info!("👷 Expiry sweeper initialized.");
    }

    // 5. API server
    if serves_api {
        let state = AppState {
            coordinator,
            store,
            config: config.clone(),
        };

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                info!("📥 {} {}", request.method(), request.uri());
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            );

        let app = create_app(state).layer(trace_layer);
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
        info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", args.port);

        let mut server_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.changed().await;
                })
                .await
            {
                error!("❌ Server runtime error: {}", e);
            }
        }));
    }

    // 6. Wait for a signal, then stop every task
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    info!("🛑 Shutting down backend services...");
    for handle in handles {
        let _ = handle.await;
    }

    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
