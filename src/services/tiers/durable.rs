use super::{MAX_TIER_TTL_SECS, Tier, TierBackend, TierError};
use crate::entities::chunked_kv;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};

fn backend_err(e: DbErr) -> TierError {
    TierError::Backend(Tier::Durable, e.to_string())
}

/// SQL-backed durable tier (postgres or sqlite through sea-orm).
#[derive(Clone)]
pub struct DurableStore {
    db: DatabaseConnection,
}

impl DurableStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Deletes every row past its expiry and returns the number removed.
    pub async fn sweep_expired(&self) -> Result<u64, TierError> {
        let now: chrono::DateTime<chrono::FixedOffset> = Utc::now().into();
        let res = chunked_kv::Entity::delete_many()
            .filter(chunked_kv::Column::ExpiresAt.lt(now))
            .exec(&self.db)
            .await
            .map_err(backend_err)?;
        Ok(res.rows_affected)
    }
}

#[async_trait]
impl TierBackend for DurableStore {
    fn tier(&self) -> Tier {
        Tier::Durable
    }

    async fn get(&self, key: &str) -> Result<Option<String>, TierError> {
        let row = chunked_kv::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await
            .map_err(backend_err)?;

        match row {
            Some(row) if row.expires_at > Utc::now() => Ok(Some(row.value)),
            Some(_) => {
                // Expired but not yet swept
                chunked_kv::Entity::delete_by_id(key.to_string())
                    .exec(&self.db)
                    .await
                    .map_err(backend_err)?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), TierError> {
        let now = Utc::now();
        let ttl = TimeDelta::try_seconds(ttl_secs.min(MAX_TIER_TTL_SECS) as i64)
            .unwrap_or_else(TimeDelta::zero);
        let expires_at = now.checked_add_signed(ttl).unwrap_or(now);
        let row = chunked_kv::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            created_at: Set(now.into()),
            expires_at: Set(expires_at.into()),
        };

        chunked_kv::Entity::insert(row)
            .on_conflict(
                OnConflict::column(chunked_kv::Column::Key)
                    .update_columns([
                        chunked_kv::Column::Value,
                        chunked_kv::Column::CreatedAt,
                        chunked_kv::Column::ExpiresAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), TierError> {
        chunked_kv::Entity::delete_by_id(key.to_string())
            .exec(&self.db)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), TierError> {
        self.db.ping().await.map_err(backend_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::run_migrations;
    use sea_orm::Database;

    async fn setup_store() -> DurableStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        run_migrations(&db).await.unwrap();
        DurableStore::new(db)
    }

    #[tokio::test]
    async fn test_set_get_overwrite_delete() {
        let store = setup_store().await;

        store.set("k", "first", 60).await.unwrap();
        store.set("k", "second", 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("second"));

        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());

        // Deleting a missing key is fine
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_huge_ttl_is_capped() {
        let store = setup_store().await;
        store.set("k", "v", u64::MAX).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_expired_rows_are_hidden_and_swept() {
        let store = setup_store().await;

        store.set("stale", "v", 0).await.unwrap();
        store.set("live", "v", 60).await.unwrap();

        assert_eq!(store.sweep_expired().await.unwrap(), 1);
        assert!(store.get("stale").await.unwrap().is_none());
        assert!(store.get("live").await.unwrap().is_some());
    }
}
