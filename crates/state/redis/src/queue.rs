use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use redis::AsyncCommands;

use voxguard_state::error::StateError;
use voxguard_state::queue::JobQueue;

use crate::config::RedisConfig;
use crate::store::build_pool;

/// Redis-backed [`JobQueue`] over a single list.
///
/// `RPUSH` appends at the tail, `BLPOP` removes from the head, so ids come
/// out in push order and each id is handed to exactly one of the competing
/// workers.
pub struct RedisJobQueue {
    pool: Pool,
    queue_key: String,
}

impl RedisJobQueue {
    /// Build the queue and its connection pool.
    pub fn new(config: &RedisConfig) -> Result<Self, StateError> {
        let pool = build_pool(config)?;
        Ok(Self {
            pool,
            queue_key: format!("{}:queue:{}", config.prefix, config.queue_name),
        })
    }

    async fn conn(&self) -> Result<Connection, StateError> {
        self.pool
            .get()
            .await
            .map_err(|e| StateError::Connection(e.to_string()))
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn push(&self, job_id: &str) -> Result<(), StateError> {
        let mut conn = self.conn().await?;
        let () = conn
            .rpush(&self.queue_key, job_id)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn pop_blocking(&self, timeout: Duration) -> Result<Option<String>, StateError> {
        let mut conn = self.conn().await?;

        // BLPOP with timeout 0 blocks forever; a zero-duration pop degrades
        // to a non-blocking LPOP instead.
        if timeout.is_zero() {
            return conn
                .lpop(&self.queue_key, None)
                .await
                .map_err(|e| StateError::Backend(e.to_string()));
        }

        let popped: Option<(String, String)> = conn
            .blpop(&self.queue_key, timeout.as_secs_f64())
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;

        Ok(popped.map(|(_list, id)| id))
    }
}
