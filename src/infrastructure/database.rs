use crate::config::UploadConfig;
use crate::entities::chunked_kv;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::time::Duration;
use tracing::info;

/// Connects the durable tier. Returns `None` when no database is configured.
pub async fn setup_database(config: &UploadConfig) -> anyhow::Result<Option<DatabaseConnection>> {
    let Some(db_url) = config.database_url.as_deref() else {
        tracing::warn!("📂 DATABASE_URL not set, durable tier disabled");
        return Ok(None);
    };

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(Some(db))
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    info!("🔄 Running auto-migrations...");

    let stmt = schema
        .create_table_from_entity(chunked_kv::Entity)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&stmt)).await?;
    info!("   - Table 'chunked_kv' checked/created");

    let index = "CREATE INDEX IF NOT EXISTS idx_chunked_kv_expires_at ON chunked_kv(expires_at)";
    match db
        .execute(sea_orm::Statement::from_string(builder, index.to_owned()))
        .await
    {
        Ok(_) => info!("   - Executed schema update: {}", index),
        Err(e) => tracing::warn!("   - Schema update warning: {} -> {}", index, e),
    }

    Ok(())
}
