// [libs/infra/db-turso/src/repositories/document.rs]
/*!
 * =================================================================
 * APARATO: DOCUMENT REPOSITORY (V11.2 - STAGE CURSOR)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CICLO DE VIDA DEL DOCUMENTO Y METADATOS DE RETRY
 *
 * # Logic:
 * El historial de reintentos se muta únicamente a través de este
 * repositorio: acotado a las 10 entradas más recientes, ordenadas
 * por timestamp descendente. 'clear_stage_data' borra los artefactos
 * de la etapa indicada y de todas las posteriores, retrocediendo el
 * cursor fino exactamente un paso.
 * =================================================================
 */

use crate::errors::DbError;
use crate::TursoClient;
use acumen_domain_models::retry::RETRY_HISTORY_LIMIT;
use acumen_domain_models::{Document, RetryHistoryEntry};
use chrono::Utc;
use libsql::{params, Row};
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct DocumentRepository {
    database_client: TursoClient,
}

impl DocumentRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { database_client: client }
    }

    /// Registra un documento recién subido en estado 'pending'.
    #[instrument(skip(self))]
    pub async fn create_document(
        &self,
        deal_id: &str,
        name: &str,
        blob_reference: &str,
        mime_type: &str,
    ) -> Result<String, DbError> {
        let document_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                INSERT INTO documents (id, deal_id, name, blob_reference, mime_type,
                                       processing_status, retry_history, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, 'pending', '[]', ?6, ?6)
                "#,
                params![document_id.clone(), deal_id, name, blob_reference, mime_type, now],
            )
            .await?;

        Ok(document_id)
    }

    pub async fn get_document(&self, document_id: &str) -> Result<Option<Document>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT id, deal_id, name, blob_reference, mime_type,
                       processing_status, last_completed_stage,
                       processing_error, retry_history, created_at, updated_at
                FROM documents WHERE id = ?1
                "#,
                params![document_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_document_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Actualiza la etiqueta gruesa visible al usuario.
    #[instrument(skip(self))]
    pub async fn update_document_status(
        &self,
        document_id: &str,
        processing_status: &str,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let updated = connection
            .execute(
                "UPDATE documents SET processing_status = ?2, updated_at = ?3 WHERE id = ?1",
                params![document_id, processing_status, Utc::now().to_rfc3339()],
            )
            .await?;

        if updated == 0 {
            return Err(DbError::NotFound(format!("document {}", document_id)));
        }
        Ok(())
    }

    /// Mueve el cursor fino autoritativo de progreso.
    #[instrument(skip(self))]
    pub async fn update_document_stage(
        &self,
        document_id: &str,
        last_completed_stage: Option<&str>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE documents SET last_completed_stage = ?2, updated_at = ?3 WHERE id = ?1",
                params![document_id, last_completed_stage, Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    pub async fn get_document_stage(&self, document_id: &str) -> Result<Option<String>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT last_completed_stage FROM documents WHERE id = ?1",
                params![document_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<Option<String>>(0).ok().flatten()),
            None => Err(DbError::NotFound(format!("document {}", document_id))),
        }
    }

    /// Persiste el error clasificado estructurado del documento.
    pub async fn update_processing_error(
        &self,
        document_id: &str,
        classified_error: &Value,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE documents SET processing_error = ?2, updated_at = ?3 WHERE id = ?1",
                params![document_id, classified_error.to_string(), Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    pub async fn clear_processing_error(&self, document_id: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE documents SET processing_error = NULL, updated_at = ?2 WHERE id = ?1",
                params![document_id, Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    /// Anexa una entrada al historial acotado de reintentos.
    /// La lista resultante queda ordenada por timestamp descendente y
    /// truncada al límite persistido.
    #[instrument(skip(self, retry_entry))]
    pub async fn append_retry_history(
        &self,
        document_id: &str,
        retry_entry: RetryHistoryEntry,
    ) -> Result<(), DbError> {
        let mut history = self.get_retry_history(document_id).await?;
        history.push(retry_entry);
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        history.truncate(RETRY_HISTORY_LIMIT);

        let serialized = serde_json::to_string(&history)
            .map_err(|e| DbError::MappingError(format!("RETRY_HISTORY_ENCODE: {}", e)))?;

        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE documents SET retry_history = ?2, updated_at = ?3 WHERE id = ?1",
                params![document_id, serialized, Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    pub async fn get_retry_history(
        &self,
        document_id: &str,
    ) -> Result<Vec<RetryHistoryEntry>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query("SELECT retry_history FROM documents WHERE id = ?1", params![document_id])
            .await?;

        let Some(row) = rows.next().await? else {
            return Err(DbError::NotFound(format!("document {}", document_id)));
        };

        let raw: String = row.get::<Option<String>>(0).ok().flatten().unwrap_or_else(|| "[]".into());
        serde_json::from_str(&raw)
            .map_err(|e| DbError::MappingError(format!("RETRY_HISTORY_DECODE: {}", e)))
    }

    /// Borra los artefactos producidos por la etapa indicada y por todas
    /// las posteriores, retrocediendo el cursor un paso. Transaccional.
    ///
    /// - parsing: chunks + findings; cursor -> NULL.
    /// - embedding: embeddings anulados + findings; cursor -> 'parsed'.
    /// - analyzing: findings; cursor -> 'embedded'.
    #[instrument(skip(self))]
    pub async fn clear_stage_data(&self, document_id: &str, stage: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction =
            connection.transaction().await.map_err(|_| DbError::TransactionError)?;

        let reset_cursor: Option<&str> = match stage {
            "parsing" | "parsed" => {
                transaction
                    .execute("DELETE FROM chunks WHERE document_id = ?1", params![document_id])
                    .await?;
                transaction
                    .execute("DELETE FROM findings WHERE document_id = ?1", params![document_id])
                    .await?;
                None
            }
            "embedding" | "embedded" | "graphiti_ingesting" => {
                transaction
                    .execute(
                        "UPDATE chunks SET embedding = NULL WHERE document_id = ?1",
                        params![document_id],
                    )
                    .await?;
                transaction
                    .execute("DELETE FROM findings WHERE document_id = ?1", params![document_id])
                    .await?;
                Some("parsed")
            }
            "analyzing" | "analyzed" => {
                transaction
                    .execute("DELETE FROM findings WHERE document_id = ?1", params![document_id])
                    .await?;
                Some("embedded")
            }
            _ => {
                // Etapas sin artefactos propios no tocan nada.
                transaction.commit().await.map_err(|_| DbError::TransactionError)?;
                return Ok(());
            }
        };

        transaction
            .execute(
                "UPDATE documents SET last_completed_stage = ?2, updated_at = ?3 WHERE id = ?1",
                params![document_id, reset_cursor, Utc::now().to_rfc3339()],
            )
            .await?;

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;

        info!("🧹 [DOC_REPO]: Stage data cleared for [{}] at stage [{}].", document_id, stage);
        Ok(())
    }

    /// Conteo de chunks persistidos; usado por el override de retry
    /// cuando un documento sin parseo completo pide reanudación.
    pub async fn count_chunks(&self, document_id: &str) -> Result<i64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query("SELECT COUNT(*) FROM chunks WHERE document_id = ?1", params![document_id])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }
}

fn map_document_row(row: &Row) -> Result<Document, DbError> {
    let processing_error = row
        .get::<Option<String>>(7)
        .ok()
        .flatten()
        .and_then(|raw| serde_json::from_str(&raw).ok());

    let retry_history_raw: String =
        row.get::<Option<String>>(8).ok().flatten().unwrap_or_else(|| "[]".into());
    let retry_history: Vec<Value> = serde_json::from_str(&retry_history_raw)
        .map_err(|e| DbError::MappingError(format!("RETRY_HISTORY_DECODE: {}", e)))?;

    Ok(Document {
        id: row.get(0)?,
        deal_id: row.get(1)?,
        name: row.get(2)?,
        blob_reference: row.get(3)?,
        mime_type: row.get(4)?,
        processing_status: row.get(5)?,
        last_completed_stage: row.get::<Option<String>>(6).ok().flatten(),
        processing_error,
        retry_history,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
