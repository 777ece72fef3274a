// [libs/infra/db-turso/src/repositories/usage.rs]
//! =================================================================
//! APARATO: USAGE LOG REPOSITORY (V4.0 - COST LEDGER)
//! CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
//! RESPONSABILIDAD: REGISTRO DE USO DE FEATURES Y COSTO POR PROVEEDOR
//! =================================================================

use crate::errors::DbError;
use crate::TursoClient;
use chrono::Utc;
use libsql::params;
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

/// Registro de uso pendiente de persistencia.
#[derive(Debug, Clone, Default)]
pub struct UsageRecord {
    pub organization_id: Option<String>,
    pub deal_id: Option<String>,
    pub user_id: Option<String>,
    pub feature: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub estimated_cost_usd: f64,
    pub status: String,
    pub duration_ms: i64,
    pub error_message: Option<String>,
    pub metadata: Value,
}

pub struct UsageRepository {
    database_client: TursoClient,
}

impl UsageRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { database_client: client }
    }

    /// Persiste un registro de uso. Los llamadores tratan el fallo como
    /// best-effort: el costo es telemetría, nunca bloquea una etapa.
    #[instrument(skip(self, record), fields(feature = %record.feature))]
    pub async fn log_feature_usage(&self, record: UsageRecord) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                INSERT INTO usage_log (id, organization_id, deal_id, user_id, feature,
                                       provider, model, input_tokens, output_tokens,
                                       estimated_cost_usd, status, duration_ms,
                                       error_message, metadata, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                "#,
                params![
                    Uuid::new_v4().to_string(),
                    record.organization_id,
                    record.deal_id,
                    record.user_id,
                    record.feature,
                    record.provider,
                    record.model,
                    record.input_tokens,
                    record.output_tokens,
                    record.estimated_cost_usd,
                    record.status,
                    record.duration_ms,
                    record.error_message,
                    record.metadata.to_string(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;
        Ok(())
    }
}
