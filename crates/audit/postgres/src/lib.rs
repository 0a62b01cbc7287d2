//! PostgreSQL audit sink for Voxguard.
//!
//! One row per completed analysis in the `analyses` table. The table is
//! created on startup if missing; writes are plain inserts keyed by job id.

mod store;

pub use store::{PostgresAuditStore, PostgresConfig};
