use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use voxguard_audit::error::AuditError;
use voxguard_audit::record::AnalysisRow;
use voxguard_audit::store::{effective_limit, AuditStore};

/// Connection settings for the Postgres audit backend.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Postgres connection URL.
    pub url: String,
    /// Prefix applied to the `analyses` table name.
    pub table_prefix: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/voxguard".to_owned(),
            table_prefix: "voxguard_".to_owned(),
            max_connections: 5,
        }
    }
}

/// PostgreSQL-backed [`AuditStore`].
pub struct PostgresAuditStore {
    pool: PgPool,
    table: String,
}

impl PostgresAuditStore {
    /// Connect and ensure the audit table exists.
    pub async fn new(config: PostgresConfig) -> Result<Self, AuditError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| AuditError::Connection(e.to_string()))?;

        let table = format!("{}analyses", config.table_prefix);
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                ip TEXT,
                filename TEXT,
                bytes BIGINT,
                scam_score REAL,
                ai_voice_prob REAL,
                stress_level REAL,
                summary TEXT,
                flags JSONB,
                meta JSONB
            )"
        );
        sqlx::query(&ddl)
            .execute(&pool)
            .await
            .map_err(|e| AuditError::Backend(e.to_string()))?;

        tracing::debug!(table = %table, "audit table ready");
        Ok(Self { pool, table })
    }
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn record(&self, row: AnalysisRow) -> Result<(), AuditError> {
        let sql = format!(
            "INSERT INTO {} \
             (id, created_at, ip, filename, bytes, scam_score, ai_voice_prob, stress_level, summary, flags, meta) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (id) DO NOTHING",
            self.table
        );

        sqlx::query(&sql)
            .bind(&row.id)
            .bind(row.created_at)
            .bind(&row.ip)
            .bind(&row.filename)
            .bind(row.bytes)
            .bind(row.scam_score)
            .bind(row.ai_voice_prob)
            .bind(row.stress_level)
            .bind(row.bounded_summary())
            .bind(&row.flags)
            .bind(&row.meta)
            .execute(&self.pool)
            .await
            .map_err(|e| AuditError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AnalysisRow>, AuditError> {
        // Score columns are REAL; cast to float8 so they decode as f64.
        let sql = format!(
            "SELECT id, created_at, ip, filename, bytes, \
             scam_score::float8 AS scam_score, \
             ai_voice_prob::float8 AS ai_voice_prob, \
             stress_level::float8 AS stress_level, \
             summary, flags, meta \
             FROM {} ORDER BY created_at DESC LIMIT $1",
            self.table
        );

        let rows = sqlx::query(&sql)
            .bind(i64::try_from(effective_limit(limit)).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuditError::Backend(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                Ok(AnalysisRow {
                    id: row
                        .try_get::<String, _>("id")
                        .map_err(|e| AuditError::Serialization(e.to_string()))?,
                    created_at: row
                        .try_get::<DateTime<Utc>, _>("created_at")
                        .map_err(|e| AuditError::Serialization(e.to_string()))?,
                    ip: row
                        .try_get::<Option<String>, _>("ip")
                        .map_err(|e| AuditError::Serialization(e.to_string()))?,
                    filename: row
                        .try_get::<Option<String>, _>("filename")
                        .map_err(|e| AuditError::Serialization(e.to_string()))?,
                    bytes: row
                        .try_get::<Option<i64>, _>("bytes")
                        .map_err(|e| AuditError::Serialization(e.to_string()))?,
                    scam_score: row
                        .try_get::<Option<f64>, _>("scam_score")
                        .map_err(|e| AuditError::Serialization(e.to_string()))?
                        .unwrap_or(0.0),
                    ai_voice_prob: row
                        .try_get::<Option<f64>, _>("ai_voice_prob")
                        .map_err(|e| AuditError::Serialization(e.to_string()))?
                        .unwrap_or(0.0),
                    stress_level: row
                        .try_get::<Option<f64>, _>("stress_level")
                        .map_err(|e| AuditError::Serialization(e.to_string()))?
                        .unwrap_or(0.0),
                    summary: row
                        .try_get::<Option<String>, _>("summary")
                        .map_err(|e| AuditError::Serialization(e.to_string()))?
                        .unwrap_or_default(),
                    flags: row
                        .try_get::<Option<serde_json::Value>, _>("flags")
                        .map_err(|e| AuditError::Serialization(e.to_string()))?
                        .unwrap_or(serde_json::Value::Null),
                    meta: row
                        .try_get::<Option<serde_json::Value>, _>("meta")
                        .map_err(|e| AuditError::Serialization(e.to_string()))?
                        .unwrap_or(serde_json::Value::Null),
                })
            })
            .collect()
    }
}
