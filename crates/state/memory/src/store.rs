use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use voxguard_state::error::StateError;
use voxguard_state::key::StateKey;
use voxguard_state::store::StateStore;

/// A stored value plus its optional expiry deadline.
#[derive(Debug, Clone)]
struct Slot {
    bytes: Vec<u8>,
    deadline: Option<Instant>,
}

impl Slot {
    fn new(bytes: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            bytes,
            deadline: ttl.map(|d| Instant::now() + d),
        }
    }

    fn live(&self) -> bool {
        match self.deadline {
            Some(deadline) => Instant::now() < deadline,
            None => true,
        }
    }
}

/// In-memory [`StateStore`] backed by a [`DashMap`].
///
/// Expiry is lazy: a slot past its deadline is dropped the next time the
/// key is touched, so an expired value is indistinguishable from one that
/// was never written.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    slots: DashMap<String, Slot>,
}

impl MemoryStateStore {
    /// Create a new, empty in-memory state store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the slot for `rendered` if its deadline has passed.
    fn evict_dead(&self, rendered: &str) {
        self.slots.remove_if(rendered, |_, slot| !slot.live());
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn put(
        &self,
        key: &StateKey,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), StateError> {
        self.slots
            .insert(key.canonical(), Slot::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn get(&self, key: &StateKey) -> Result<Option<Vec<u8>>, StateError> {
        let rendered = key.canonical();
        self.evict_dead(&rendered);
        Ok(self.slots.get(&rendered).map(|slot| slot.bytes.clone()))
    }

    async fn delete(&self, key: &StateKey) -> Result<bool, StateError> {
        let removed = self.slots.remove(&key.canonical());
        Ok(removed.is_some_and(|(_, slot)| slot.live()))
    }

    async fn increment(
        &self,
        key: &StateKey,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StateError> {
        let rendered = key.canonical();
        // An expired counter restarts from zero.
        self.evict_dead(&rendered);

        let mut slot = self
            .slots
            .entry(rendered)
            .or_insert_with(|| Slot::new(b"0".to_vec(), ttl));

        let current: i64 = std::str::from_utf8(&slot.bytes)
            .ok()
            .and_then(|text| text.parse().ok())
            .ok_or_else(|| {
                StateError::Serialization("counter value is not an integer".to_owned())
            })?;

        let next = current + delta;
        slot.bytes = next.to_string().into_bytes();
        Ok(next)
    }
}
