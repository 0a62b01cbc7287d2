use async_trait::async_trait;
use dashmap::DashMap;

use voxguard_audit::error::AuditError;
use voxguard_audit::record::AnalysisRow;
use voxguard_audit::store::{effective_limit, AuditStore};

/// In-memory [`AuditStore`] using a `DashMap` keyed by job id.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    rows: DashMap<String, AnalysisRow>,
}

impl MemoryAuditStore {
    /// Create a new empty in-memory audit store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows recorded so far.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether any rows have been recorded.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn record(&self, mut row: AnalysisRow) -> Result<(), AuditError> {
        row.summary = row.bounded_summary().to_owned();
        self.rows.insert(row.id.clone(), row);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AnalysisRow>, AuditError> {
        let mut all: Vec<AnalysisRow> = self.rows.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(effective_limit(limit));
        Ok(all)
    }
}
