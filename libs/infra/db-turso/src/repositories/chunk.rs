// [libs/infra/db-turso/src/repositories/chunk.rs]
/*!
 * =================================================================
 * APARATO: CHUNK REPOSITORY (V8.3 - ATOMIC SWAP)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA ATÓMICA DE CHUNKS Y EMBEDDINGS
 *
 * # Logic:
 * 'store_chunks_and_update_status' es idempotente por diseño:
 * delete-old -> insert-all -> update-status dentro de una sola
 * transacción. Reejecutar con el mismo payload produce el mismo
 * conjunto de chunks.
 * =================================================================
 */

use crate::errors::DbError;
use crate::TursoClient;
use acumen_domain_models::{ChunkRecord, ChunkType};
use chrono::Utc;
use libsql::{params, Row};
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

/// Chunk listo para persistir, aún sin identidad de fila.
#[derive(Debug, Clone)]
pub struct ChunkDraft {
    pub content: String,
    pub chunk_type: ChunkType,
    pub chunk_index: i64,
    pub page_number: Option<i64>,
    pub sheet_name: Option<String>,
    pub cell_reference: Option<String>,
    pub token_count: Option<i64>,
    pub metadata: Value,
}

pub struct ChunkRepository {
    database_client: TursoClient,
}

impl ChunkRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { database_client: client }
    }

    /// Reemplaza el conjunto completo de chunks y avanza el estatus,
    /// como una única operación atómica.
    ///
    /// # Errors:
    /// - `DbError::TransactionError`: colapso de la secuencia multi-tabla.
    #[instrument(skip(self, chunks))]
    pub async fn store_chunks_and_update_status(
        &self,
        document_id: &str,
        chunks: &[ChunkDraft],
        new_status: &str,
    ) -> Result<usize, DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction =
            connection.transaction().await.map_err(|_| DbError::TransactionError)?;

        transaction
            .execute("DELETE FROM chunks WHERE document_id = ?1", params![document_id])
            .await?;

        for chunk in chunks {
            transaction
                .execute(
                    r#"
                    INSERT INTO chunks (id, document_id, chunk_index, content, chunk_type,
                                        page_number, sheet_name, cell_reference,
                                        token_count, metadata)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                    params![
                        Uuid::new_v4().to_string(),
                        document_id,
                        chunk.chunk_index,
                        chunk.content.clone(),
                        chunk.chunk_type.as_str(),
                        chunk.page_number,
                        chunk.sheet_name.clone(),
                        chunk.cell_reference.clone(),
                        chunk.token_count,
                        chunk.metadata.to_string()
                    ],
                )
                .await?;
        }

        transaction
            .execute(
                "UPDATE documents SET processing_status = ?2, updated_at = ?3 WHERE id = ?1",
                params![document_id, new_status, Utc::now().to_rfc3339()],
            )
            .await?;

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;

        info!("💾 [CHUNK_REPO]: Stored {} chunk(s) for [{}].", chunks.len(), document_id);
        Ok(chunks.len())
    }

    pub async fn get_chunks_by_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<ChunkRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT id, document_id, chunk_index, content, chunk_type,
                       page_number, sheet_name, cell_reference, token_count,
                       embedding, metadata
                FROM chunks WHERE document_id = ?1
                ORDER BY chunk_index ASC
                "#,
                params![document_id],
            )
            .await?;

        let mut chunks = Vec::new();
        while let Some(row) = rows.next().await? {
            chunks.push(map_chunk_row(&row)?);
        }
        Ok(chunks)
    }

    /// Escribe los embeddings (id -> vector) y avanza el estatus en una
    /// sola transacción.
    #[instrument(skip(self, embeddings))]
    pub async fn update_embeddings_and_status(
        &self,
        document_id: &str,
        embeddings: &[(String, Vec<f32>)],
        new_status: &str,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction =
            connection.transaction().await.map_err(|_| DbError::TransactionError)?;

        for (chunk_id, vector) in embeddings {
            let encoded = serde_json::to_string(vector)
                .map_err(|e| DbError::MappingError(format!("EMBEDDING_ENCODE: {}", e)))?;
            transaction
                .execute(
                    "UPDATE chunks SET embedding = ?2 WHERE id = ?1 AND document_id = ?3",
                    params![chunk_id.clone(), encoded, document_id],
                )
                .await?;
        }

        transaction
            .execute(
                "UPDATE documents SET processing_status = ?2, updated_at = ?3 WHERE id = ?1",
                params![document_id, new_status, Utc::now().to_rfc3339()],
            )
            .await?;

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(())
    }

    /// Candidatos para búsqueda por similitud: chunks con embedding,
    /// acotados opcionalmente por deal o por documento. La similitud
    /// coseno se computa en el estrato de aplicación.
    pub async fn get_embedded_chunks(
        &self,
        deal_id: Option<&str>,
        document_id: Option<&str>,
    ) -> Result<Vec<(ChunkRecord, String, String)>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                r#"
                SELECT c.id, c.document_id, c.chunk_index, c.content, c.chunk_type,
                       c.page_number, c.sheet_name, c.cell_reference, c.token_count,
                       c.embedding, c.metadata, d.name, d.deal_id
                FROM chunks c
                JOIN documents d ON d.id = c.document_id
                WHERE c.embedding IS NOT NULL
                  AND (?1 IS NULL OR d.deal_id = ?1)
                  AND (?2 IS NULL OR c.document_id = ?2)
                "#,
                params![deal_id, document_id],
            )
            .await?;

        let mut result = Vec::new();
        while let Some(row) = rows.next().await? {
            let record = map_chunk_row(&row)?;
            let document_name: String = row.get(11)?;
            let owning_deal: String = row.get(12)?;
            result.push((record, document_name, owning_deal));
        }
        Ok(result)
    }
}

fn map_chunk_row(row: &Row) -> Result<ChunkRecord, DbError> {
    let chunk_type_raw: String = row.get(4)?;
    let chunk_type = ChunkType::parse(&chunk_type_raw)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_CHUNK_TYPE: {}", chunk_type_raw)))?;

    let embedding = row
        .get::<Option<String>>(9)
        .ok()
        .flatten()
        .and_then(|raw| serde_json::from_str::<Vec<f32>>(&raw).ok());

    let metadata_raw: String =
        row.get::<Option<String>>(10).ok().flatten().unwrap_or_else(|| "{}".into());
    let metadata = serde_json::from_str(&metadata_raw)
        .map_err(|e| DbError::MappingError(format!("CHUNK_METADATA_DECODE: {}", e)))?;

    Ok(ChunkRecord {
        id: row.get(0)?,
        document_id: row.get(1)?,
        chunk_index: row.get(2)?,
        content: row.get(3)?,
        chunk_type,
        page_number: row.get::<Option<i64>>(5).ok().flatten(),
        sheet_name: row.get::<Option<String>>(6).ok().flatten(),
        cell_reference: row.get::<Option<String>>(7).ok().flatten(),
        token_count: row.get::<Option<i64>>(8).ok().flatten(),
        embedding,
        metadata,
    })
}
