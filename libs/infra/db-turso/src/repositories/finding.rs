// [libs/infra/db-turso/src/repositories/finding.rs]
//! =================================================================
//! APARATO: FINDING REPOSITORY (V9.1 - ATOMIC BATCH)
//! CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
//! RESPONSABILIDAD: PERSISTENCIA DE HALLAZGOS Y AVANCE DE ESTATUS
//! =================================================================

use crate::errors::DbError;
use crate::TursoClient;
use acumen_domain_models::{Finding, FindingDomain, FindingDraft, FindingType};
use chrono::Utc;
use libsql::{params, Row};
use tracing::{info, instrument};
use uuid::Uuid;

pub struct FindingRepository {
    database_client: TursoClient,
}

impl FindingRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { database_client: client }
    }

    /// Inserta el lote de hallazgos y avanza el estatus del documento
    /// en una sola transacción.
    #[instrument(skip(self, findings))]
    pub async fn store_findings_and_update_status(
        &self,
        document_id: &str,
        findings: &[FindingDraft],
        new_status: &str,
    ) -> Result<usize, DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction =
            connection.transaction().await.map_err(|_| DbError::TransactionError)?;

        let now = Utc::now().to_rfc3339();
        for finding in findings {
            transaction
                .execute(
                    r#"
                    INSERT INTO findings (id, deal_id, document_id, chunk_id, text,
                                          finding_type, domain, confidence, status,
                                          metadata, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9, ?10)
                    "#,
                    params![
                        Uuid::new_v4().to_string(),
                        finding.deal_id.clone(),
                        finding.document_id.clone(),
                        finding.chunk_id.clone(),
                        finding.text.clone(),
                        finding.finding_type.as_str(),
                        finding.domain.as_str(),
                        finding.confidence,
                        finding.metadata.to_string(),
                        now.clone()
                    ],
                )
                .await?;
        }

        transaction
            .execute(
                "UPDATE documents SET processing_status = ?2, updated_at = ?3 WHERE id = ?1",
                params![document_id, new_status, now.clone()],
            )
            .await?;

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;

        info!("💾 [FINDING_REPO]: Batch persisted {} finding(s) for [{}].", findings.len(), document_id);
        Ok(findings.len())
    }

    pub async fn get_findings_by_deal(&self, deal_id: &str) -> Result<Vec<Finding>, DbError> {
        self.query_findings("WHERE deal_id = ?1", deal_id).await
    }

    pub async fn get_findings_by_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<Finding>, DbError> {
        self.query_findings("WHERE document_id = ?1", document_id).await
    }

    async fn query_findings(&self, filter: &str, key: &str) -> Result<Vec<Finding>, DbError> {
        let connection = self.database_client.get_connection()?;
        let sql = format!(
            r#"
            SELECT id, deal_id, document_id, chunk_id, text, finding_type,
                   domain, confidence, status, metadata, created_at
            FROM findings {} ORDER BY created_at ASC
            "#,
            filter
        );

        let mut rows = connection.query(&sql, params![key]).await?;
        let mut findings = Vec::new();
        while let Some(row) = rows.next().await? {
            findings.push(map_finding_row(&row)?);
        }
        Ok(findings)
    }
}

fn map_finding_row(row: &Row) -> Result<Finding, DbError> {
    let finding_type_raw: String = row.get(5)?;
    let finding_type = FindingType::parse(&finding_type_raw)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_FINDING_TYPE: {}", finding_type_raw)))?;

    let domain_raw: String = row.get(6)?;
    let domain = FindingDomain::parse(&domain_raw).unwrap_or(FindingDomain::General);

    let metadata_raw: String =
        row.get::<Option<String>>(9).ok().flatten().unwrap_or_else(|| "{}".into());
    let metadata = serde_json::from_str(&metadata_raw)
        .map_err(|e| DbError::MappingError(format!("FINDING_METADATA_DECODE: {}", e)))?;

    Ok(Finding {
        id: row.get(0)?,
        deal_id: row.get(1)?,
        document_id: row.get(2)?,
        chunk_id: row.get::<Option<String>>(3).ok().flatten(),
        text: row.get(4)?,
        finding_type,
        domain,
        confidence: row.get(7)?,
        status: row.get(8)?,
        metadata,
        created_at: row.get(10)?,
    })
}
