use std::sync::Arc;

use voxguard_audit::AuditStore;
use voxguard_audit_memory::MemoryAuditStore;
use voxguard_audit_postgres::{PostgresAuditStore, PostgresConfig};

use crate::config::AuditConfig;
use crate::error::ServerError;

/// Construct the audit sink from configuration.
pub async fn create_audit_store(config: &AuditConfig) -> Result<Arc<dyn AuditStore>, ServerError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryAuditStore::new())),
        "postgres" => {
            let url = config.url.clone().ok_or_else(|| {
                ServerError::Config("postgres audit backend requires 'url' in [audit]".into())
            })?;
            let store = PostgresAuditStore::new(PostgresConfig {
                url,
                table_prefix: config.prefix.clone(),
                ..PostgresConfig::default()
            })
            .await
            .map_err(|e| ServerError::Config(format!("postgres audit: {e}")))?;
            Ok(Arc::new(store))
        }
        other => Err(ServerError::Config(format!(
            "unsupported audit backend: {other}"
        ))),
    }
}
