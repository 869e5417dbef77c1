use super::{Tier, TierBackend, TierError};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::timeout;

/// Redis-backed fast tier.
///
/// Every command runs under a timeout. After a failure the cached connection
/// is dropped and the tier reports itself unavailable for a cooldown window,
/// so a dead Redis costs one timeout per window rather than one per request.
pub struct FastCache {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    unavailable_until: Mutex<Option<Instant>>,
    op_timeout: Duration,
    cooldown: Duration,
}

impl FastCache {
    pub fn new(url: &str, op_timeout: Duration, cooldown: Duration) -> Result<Self, TierError> {
        let client =
            redis::Client::open(url).map_err(|e| TierError::Backend(Tier::Fast, e.to_string()))?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
            unavailable_until: Mutex::new(None),
            op_timeout,
            cooldown,
        })
    }

    async fn check_available(&self) -> Result<(), TierError> {
        let lock = self.unavailable_until.lock().await;
        if let Some(until) = *lock {
            if Instant::now() < until {
                return Err(TierError::Unavailable(
                    Tier::Fast,
                    "cooling down after failure".to_string(),
                ));
            }
        }
        Ok(())
    }

    async fn mark_unavailable(&self, reason: &TierError) {
        tracing::warn!(
            "[FastCache] Marking Redis unavailable for {:?}: {}",
            self.cooldown,
            reason
        );
        *self.conn.lock().await = None;
        *self.unavailable_until.lock().await = Some(Instant::now() + self.cooldown);
    }

    async fn connection(&self) -> Result<MultiplexedConnection, TierError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = match timeout(self.op_timeout, self.client.get_multiplexed_async_connection())
            .await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(TierError::Unavailable(Tier::Fast, e.to_string())),
            Err(_) => return Err(TierError::Timeout(Tier::Fast)),
        };
        tracing::info!("[FastCache] Connected to Redis");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn run<T, F, Fut>(&self, op: F) -> Result<T, TierError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        self.check_available().await?;

        let result = match self.connection().await {
            Ok(conn) => match timeout(self.op_timeout, op(conn)).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(TierError::Backend(Tier::Fast, e.to_string())),
                Err(_) => Err(TierError::Timeout(Tier::Fast)),
            },
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            self.mark_unavailable(e).await;
        }
        result
    }
}

#[async_trait]
impl TierBackend for FastCache {
    fn tier(&self) -> Tier {
        Tier::Fast
    }

    async fn get(&self, key: &str) -> Result<Option<String>, TierError> {
        self.run(|mut conn| async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), TierError> {
        self.run(|mut conn| async move { conn.set_ex::<_, _, ()>(key, value, ttl_secs).await })
            .await
    }

    async fn delete(&self, key: &str) -> Result<(), TierError> {
        self.run(|mut conn| async move { conn.del::<_, ()>(key).await })
            .await
    }

    async fn ping(&self) -> Result<(), TierError> {
        self.run(|mut conn| async move { conn.exists::<_, bool>("chunked:health").await })
            .await
            .map(|_| ())
    }
}
