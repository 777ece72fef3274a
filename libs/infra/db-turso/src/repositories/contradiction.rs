// [libs/infra/db-turso/src/repositories/contradiction.rs]
/*!
 * =================================================================
 * APARATO: CONTRADICTION REPOSITORY (V6.0 - UNORDERED PAIR)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: UNICIDAD DEL PAR NO ORDENADO {a, b} POR DEAL
 *
 * # Logic:
 * El par se canoniza lexicográficamente antes del INSERT y el lookup
 * consulta en ambos órdenes: {a,b} y {b,a} son la misma contradicción
 * sin importar el orden de inserción.
 * =================================================================
 */

use crate::errors::DbError;
use crate::TursoClient;
use acumen_domain_models::Contradiction;
use chrono::Utc;
use libsql::{params, Row};
use tracing::{info, instrument};
use uuid::Uuid;

pub struct ContradictionRepository {
    database_client: TursoClient,
}

impl ContradictionRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { database_client: client }
    }

    /// Busca una contradicción existente para el par, en ambos órdenes.
    pub async fn get_existing_contradiction(
        &self,
        finding_a_id: &str,
        finding_b_id: &str,
    ) -> Result<Option<Contradiction>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT id, deal_id, finding_a_id, finding_b_id, confidence,
                       reason, status, detected_at
                FROM contradictions
                WHERE (finding_a_id = ?1 AND finding_b_id = ?2)
                   OR (finding_a_id = ?2 AND finding_b_id = ?1)
                LIMIT 1
                "#,
                params![finding_a_id, finding_b_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_contradiction_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Persiste la contradicción con el par en orden canónico.
    /// Devuelve false si el par ya existía (deduplicación).
    #[instrument(skip(self, reason))]
    pub async fn store_contradiction(
        &self,
        deal_id: &str,
        finding_a_id: &str,
        finding_b_id: &str,
        confidence: f64,
        reason: &str,
    ) -> Result<bool, DbError> {
        if self.get_existing_contradiction(finding_a_id, finding_b_id).await?.is_some() {
            return Ok(false);
        }

        // Orden canónico: el menor lexicográfico siempre en la posición A.
        let (canonical_a, canonical_b) = if finding_a_id <= finding_b_id {
            (finding_a_id, finding_b_id)
        } else {
            (finding_b_id, finding_a_id)
        };

        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                INSERT INTO contradictions (id, deal_id, finding_a_id, finding_b_id,
                                            confidence, reason, status, detected_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'unresolved', ?7)
                "#,
                params![
                    Uuid::new_v4().to_string(),
                    deal_id,
                    canonical_a,
                    canonical_b,
                    confidence,
                    reason,
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;

        info!(
            "⚡ [CONTRADICTION_REPO]: Stored pair {{{}, {}}} for deal [{}] (confidence {:.2}).",
            canonical_a, canonical_b, deal_id, confidence
        );
        Ok(true)
    }

    pub async fn get_contradictions_by_deal(
        &self,
        deal_id: &str,
    ) -> Result<Vec<Contradiction>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT id, deal_id, finding_a_id, finding_b_id, confidence,
                       reason, status, detected_at
                FROM contradictions WHERE deal_id = ?1
                ORDER BY detected_at DESC
                "#,
                params![deal_id],
            )
            .await?;

        let mut contradictions = Vec::new();
        while let Some(row) = rows.next().await? {
            contradictions.push(map_contradiction_row(&row)?);
        }
        Ok(contradictions)
    }
}

fn map_contradiction_row(row: &Row) -> Result<Contradiction, DbError> {
    Ok(Contradiction {
        id: row.get(0)?,
        deal_id: row.get(1)?,
        finding_a_id: row.get(2)?,
        finding_b_id: row.get(3)?,
        confidence: row.get(4)?,
        reason: row.get(5)?,
        status: row.get(6)?,
        detected_at: row.get(7)?,
    })
}
