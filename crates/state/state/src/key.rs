use std::fmt;

/// Category of a stored value.
///
/// Job records and audio blobs live in separate keyspaces with independent
/// TTL clocks; rate-limit counters are keyed per client and window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Structured job record, longer TTL.
    Job,
    /// Raw uploaded audio bytes, shorter TTL.
    Audio,
    /// Fixed-window request counter.
    RateLimit,
}

impl KeyKind {
    /// Stable keyspace segment for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Audio => "audio",
            Self::RateLimit => "rl",
        }
    }
}

/// Key that identifies a value within a backend.
///
/// Backends prepend their configured application prefix when rendering the
/// key, so the canonical form here is backend-independent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub kind: KeyKind,
    pub id: String,
}

impl StateKey {
    /// Create a new key.
    #[must_use]
    pub fn new(kind: KeyKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Key for a job record.
    #[must_use]
    pub fn job(id: impl Into<String>) -> Self {
        Self::new(KeyKind::Job, id)
    }

    /// Key for an audio blob.
    #[must_use]
    pub fn audio(id: impl Into<String>) -> Self {
        Self::new(KeyKind::Audio, id)
    }

    /// Key for a rate-limit counter bucket.
    #[must_use]
    pub fn rate_limit(id: impl Into<String>) -> Self {
        Self::new(KeyKind::RateLimit, id)
    }

    /// Return the canonical string form: `kind:id`.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.id)
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}
