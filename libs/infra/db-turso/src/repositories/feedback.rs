// [libs/infra/db-turso/src/repositories/feedback.rs]
//! =================================================================
//! APARATO: FEEDBACK REPOSITORY (V3.2)
//! CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
//! RESPONSABILIDAD: CAPTURA Y AGREGACIÓN DE RETROALIMENTACIÓN HUMANA
//! =================================================================

use crate::errors::DbError;
use crate::TursoClient;
use chrono::{DateTime, Utc};
use libsql::params;
use tracing::instrument;
use uuid::Uuid;

/// Corrección puntual aplicada sobre un hallazgo.
#[derive(Debug, Clone)]
pub struct CorrectionRow {
    pub id: String,
    pub finding_id: String,
    pub correction_type: String,
    pub created_at: String,
}

/// Veredicto de validación o rechazo sobre un hallazgo.
#[derive(Debug, Clone)]
pub struct ValidationRow {
    pub id: String,
    pub finding_id: String,
    pub action: String,
    pub created_at: String,
}

pub struct FeedbackRepository {
    database_client: TursoClient,
}

impl FeedbackRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { database_client: client }
    }

    pub async fn record_correction(
        &self,
        finding_id: &str,
        correction_type: &str,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO finding_corrections (id, finding_id, correction_type, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![Uuid::new_v4().to_string(), finding_id, correction_type, Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    pub async fn record_validation(&self, finding_id: &str, action: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO validation_feedback (id, finding_id, action, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![Uuid::new_v4().to_string(), finding_id, action, Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    /// Correcciones del deal dentro de la ventana temporal.
    pub async fn get_corrections_in_window(
        &self,
        deal_id: &str,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Vec<CorrectionRow>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT fc.id, fc.finding_id, fc.correction_type, fc.created_at
                FROM finding_corrections fc
                JOIN findings f ON f.id = fc.finding_id
                WHERE f.deal_id = ?1 AND fc.created_at >= ?2 AND fc.created_at <= ?3
                "#,
                params![deal_id, period_start.to_rfc3339(), period_end.to_rfc3339()],
            )
            .await?;

        let mut corrections = Vec::new();
        while let Some(row) = rows.next().await? {
            corrections.push(CorrectionRow {
                id: row.get(0)?,
                finding_id: row.get(1)?,
                correction_type: row.get(2)?,
                created_at: row.get(3)?,
            });
        }
        Ok(corrections)
    }

    pub async fn get_validations_in_window(
        &self,
        deal_id: &str,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Vec<ValidationRow>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT vf.id, vf.finding_id, vf.action, vf.created_at
                FROM validation_feedback vf
                JOIN findings f ON f.id = vf.finding_id
                WHERE f.deal_id = ?1 AND vf.created_at >= ?2 AND vf.created_at <= ?3
                "#,
                params![deal_id, period_start.to_rfc3339(), period_end.to_rfc3339()],
            )
            .await?;

        let mut validations = Vec::new();
        while let Some(row) = rows.next().await? {
            validations.push(ValidationRow {
                id: row.get(0)?,
                finding_id: row.get(1)?,
                action: row.get(2)?,
                created_at: row.get(3)?,
            });
        }
        Ok(validations)
    }

    /// Deals con actividad de feedback dentro de la ventana; alimenta el
    /// fan-out de 'analyze-feedback-all'.
    pub async fn get_deals_with_feedback_activity(
        &self,
        period_start: DateTime<Utc>,
    ) -> Result<Vec<String>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT DISTINCT f.deal_id FROM findings f
                WHERE f.id IN (
                    SELECT finding_id FROM finding_corrections WHERE created_at >= ?1
                    UNION
                    SELECT finding_id FROM validation_feedback WHERE created_at >= ?1
                )
                "#,
                params![period_start.to_rfc3339()],
            )
            .await?;

        let mut deal_ids = Vec::new();
        while let Some(row) = rows.next().await? {
            deal_ids.push(row.get(0)?);
        }
        Ok(deal_ids)
    }

    /// Umbral de confianza específico del deal para un dominio, si existe.
    pub async fn get_confidence_threshold(
        &self,
        deal_id: &str,
        domain: &str,
    ) -> Result<Option<f64>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT threshold FROM confidence_thresholds WHERE deal_id = ?1 AND domain = ?2",
                params![deal_id, domain],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Upsert del resultado de análisis por (deal, fecha de análisis).
    #[instrument(skip(self, summary_json))]
    pub async fn upsert_analytics(
        &self,
        deal_id: &str,
        analysis_date: &str,
        period_start: &str,
        period_end: &str,
        analysis_type: &str,
        summary_json: &str,
        totals: (i64, i64, i64, i64),
        pattern_count: i64,
        recommendation_count: i64,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                INSERT INTO feedback_analytics (
                    deal_id, analysis_date, period_start, period_end, analysis_type,
                    summary, total_findings, total_corrections, total_validations,
                    total_rejections, pattern_count, recommendation_count, trigger_type
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 'scheduled')
                ON CONFLICT (deal_id, analysis_date) DO UPDATE SET
                    period_start = excluded.period_start,
                    period_end = excluded.period_end,
                    analysis_type = excluded.analysis_type,
                    summary = excluded.summary,
                    total_findings = excluded.total_findings,
                    total_corrections = excluded.total_corrections,
                    total_validations = excluded.total_validations,
                    total_rejections = excluded.total_rejections,
                    pattern_count = excluded.pattern_count,
                    recommendation_count = excluded.recommendation_count
                "#,
                params![
                    deal_id,
                    analysis_date,
                    period_start,
                    period_end,
                    analysis_type,
                    summary_json,
                    totals.0,
                    totals.1,
                    totals.2,
                    totals.3,
                    pattern_count,
                    recommendation_count
                ],
            )
            .await?;
        Ok(())
    }
}
