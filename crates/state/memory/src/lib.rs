//! In-memory fallback backend for Voxguard.
//!
//! Used when no shared Redis is configured. State is process-local, so this
//! backend is only meaningful when admission and the worker run in the same
//! process (or for tests); with multiple processes the shared backend is
//! required.

mod queue;
mod store;

pub use queue::MemoryJobQueue;
pub use store::MemoryStateStore;
