use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool, Runtime};
use redis::AsyncCommands;

use voxguard_state::error::StateError;
use voxguard_state::key::StateKey;
use voxguard_state::store::StateStore;

use crate::config::RedisConfig;

/// Redis-backed [`StateStore`].
///
/// Values are plain Redis strings (bytes); TTLs use `PEXPIRE` so job and
/// audio keyspaces expire on their own independent clocks.
pub struct RedisStateStore {
    pool: Pool,
    prefix: String,
}

impl RedisStateStore {
    /// Build the store and its connection pool. Fails fast on an invalid
    /// URL; actual connectivity is checked lazily per operation.
    pub fn new(config: &RedisConfig) -> Result<Self, StateError> {
        let pool = build_pool(config)?;
        Ok(Self {
            pool,
            prefix: config.prefix.clone(),
        })
    }

    fn render_key(&self, key: &StateKey) -> String {
        format!("{}:{}", self.prefix, key.canonical())
    }

    async fn conn(&self) -> Result<Connection, StateError> {
        self.pool
            .get()
            .await
            .map_err(|e| StateError::Connection(e.to_string()))
    }
}

/// Create a deadpool pool with bounded waits from the config.
pub(crate) fn build_pool(config: &RedisConfig) -> Result<Pool, StateError> {
    let mut cfg = deadpool_redis::Config::from_url(&config.url);
    let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(config.op_timeout);
    pool_config.timeouts.create = Some(config.op_timeout);
    cfg.pool = Some(pool_config);

    cfg.create_pool(Some(Runtime::Tokio1))
        .map_err(|e| StateError::Connection(e.to_string()))
}

#[allow(clippy::cast_possible_truncation)]
fn ttl_millis(ttl: Duration) -> u64 {
    ttl.as_millis().min(u128::from(u64::MAX)) as u64
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn put(
        &self,
        key: &StateKey,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), StateError> {
        let rendered = self.render_key(key);
        let mut conn = self.conn().await?;

        match ttl {
            Some(ttl) => {
                let () = conn
                    .pset_ex(&rendered, value, ttl_millis(ttl))
                    .await
                    .map_err(|e| StateError::Backend(e.to_string()))?;
            }
            None => {
                let () = conn
                    .set(&rendered, value)
                    .await
                    .map_err(|e| StateError::Backend(e.to_string()))?;
            }
        }
        Ok(())
    }

    async fn get(&self, key: &StateKey) -> Result<Option<Vec<u8>>, StateError> {
        let rendered = self.render_key(key);
        let mut conn = self.conn().await?;

        conn.get(&rendered)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))
    }

    async fn delete(&self, key: &StateKey) -> Result<bool, StateError> {
        let rendered = self.render_key(key);
        let mut conn = self.conn().await?;

        let removed: i64 = conn
            .del(&rendered)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(removed > 0)
    }

    async fn increment(
        &self,
        key: &StateKey,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StateError> {
        let rendered = self.render_key(key);
        let mut conn = self.conn().await?;

        let new_value: i64 = conn
            .incr(&rendered, delta)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;

        // First increment created the key; attach the window TTL now.
        if new_value == delta
            && let Some(ttl) = ttl
        {
            let () = conn
                .pexpire(&rendered, i64::try_from(ttl_millis(ttl)).unwrap_or(i64::MAX))
                .await
                .map_err(|e| StateError::Backend(e.to_string()))?;
        }

        Ok(new_value)
    }
}
