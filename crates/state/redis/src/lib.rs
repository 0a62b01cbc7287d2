//! Redis state backend for Voxguard.
//!
//! Provides Redis-backed implementations of the [`StateStore`] and
//! [`JobQueue`] traits from `voxguard-state`, used when multiple admission
//! instances and workers must share limits, records, blobs, and the queue.
//!
//! - **State storage**: byte values with per-key TTL (`SET`/`PEXPIRE`).
//! - **Counters**: `INCRBY` with the TTL applied on first creation.
//! - **Queue**: `RPUSH`/`BLPOP` on a single list, which makes a pop atomic
//!   across any number of competing workers.
//! - **Connection pooling**: `deadpool-redis`.
//!
//! [`StateStore`]: voxguard_state::StateStore
//! [`JobQueue`]: voxguard_state::JobQueue

mod config;
mod queue;
mod store;

pub use config::RedisConfig;
pub use queue::RedisJobQueue;
pub use store::RedisStateStore;
