//! Backend-neutral storage abstractions for the Voxguard pipeline.
//!
//! Two backends implement these traits: a shared Redis backend
//! (`voxguard-state-redis`) used when admission instances and workers must
//! see the same state, and a single-process in-memory fallback
//! (`voxguard-state-memory`). The backend is chosen once at startup by the
//! server's state factory; it is never switched per call.

pub mod error;
pub mod key;
pub mod queue;
pub mod store;

pub use error::StateError;
pub use key::{KeyKind, StateKey};
pub use queue::JobQueue;
pub use store::StateStore;
