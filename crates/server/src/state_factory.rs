use std::sync::Arc;

use voxguard_state::{JobQueue, StateStore};
use voxguard_state_memory::{MemoryJobQueue, MemoryStateStore};
use voxguard_state_redis::{RedisConfig, RedisJobQueue, RedisStateStore};

use crate::config::{QueueConfig, StateConfig};
use crate::error::ServerError;

/// The state store and queue pair, plus the backend's name for health
/// reporting.
pub struct StatePair {
    pub store: Arc<dyn StateStore>,
    pub queue: Arc<dyn JobQueue>,
    pub backend: &'static str,
}

impl std::fmt::Debug for StatePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatePair")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

/// Construct the state backend from configuration.
///
/// This is the single point where the backend is chosen; every later store
/// error is surfaced to operators instead of silently switching backends.
pub fn create_state(config: &StateConfig, queue: &QueueConfig) -> Result<StatePair, ServerError> {
    match config.backend.as_str() {
        "memory" => Ok(create_memory()),
        "redis" => create_redis(config, queue),
        other => Err(ServerError::Config(format!(
            "unsupported state backend: {other}"
        ))),
    }
}

fn create_memory() -> StatePair {
    StatePair {
        store: Arc::new(MemoryStateStore::new()),
        queue: Arc::new(MemoryJobQueue::new()),
        backend: "memory",
    }
}

fn create_redis(config: &StateConfig, queue: &QueueConfig) -> Result<StatePair, ServerError> {
    let redis_config = RedisConfig {
        url: config
            .url
            .clone()
            .unwrap_or_else(|| "redis://127.0.0.1:6379".to_owned()),
        prefix: config
            .prefix
            .clone()
            .unwrap_or_else(|| "voxguard".to_owned()),
        queue_name: queue.name.clone(),
        ..RedisConfig::default()
    };

    let store = RedisStateStore::new(&redis_config)
        .map_err(|e| ServerError::Config(format!("redis store: {e}")))?;
    let job_queue = RedisJobQueue::new(&redis_config)
        .map_err(|e| ServerError::Config(format!("redis queue: {e}")))?;

    Ok(StatePair {
        store: Arc::new(store),
        queue: Arc::new(job_queue),
        backend: "redis",
    })
}
