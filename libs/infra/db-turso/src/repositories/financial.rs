// [libs/infra/db-turso/src/repositories/financial.rs]
//! =================================================================
//! APARATO: FINANCIAL METRIC REPOSITORY (V5.2)
//! CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
//! RESPONSABILIDAD: PERSISTENCIA DE MÉTRICAS NUMÉRICAS TIPADAS
//! =================================================================

use crate::errors::DbError;
use crate::TursoClient;
use acumen_domain_models::{FinancialMetricDraft, MetricCategory, PeriodType};
use chrono::Utc;
use libsql::{params, Row};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{info, instrument};
use uuid::Uuid;

/// Fila persistida de una métrica financiera.
#[derive(Debug, Clone)]
pub struct FinancialMetricRecord {
    pub id: String,
    pub document_id: String,
    pub metric_name: String,
    pub metric_category: MetricCategory,
    pub value: Decimal,
    pub unit: Option<String>,
    pub period_type: Option<PeriodType>,
    pub fiscal_year: Option<i32>,
    pub fiscal_quarter: Option<i32>,
    pub source_cell: Option<String>,
    pub source_sheet: Option<String>,
    pub source_page: Option<i64>,
    pub source_formula: Option<String>,
    pub is_actual: bool,
    pub confidence_score: f64,
}

pub struct FinancialMetricRepository {
    database_client: TursoClient,
}

impl FinancialMetricRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { database_client: client }
    }

    /// Inserta el lote de métricas y avanza el estatus del documento en
    /// una sola transacción. El valor decimal se persiste como texto
    /// para preservar la precisión exacta.
    #[instrument(skip(self, metrics))]
    pub async fn store_financial_metrics_and_update_status(
        &self,
        document_id: &str,
        metrics: &[FinancialMetricDraft],
        new_status: &str,
    ) -> Result<usize, DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction =
            connection.transaction().await.map_err(|_| DbError::TransactionError)?;

        for metric in metrics {
            transaction
                .execute(
                    r#"
                    INSERT INTO financial_metrics (
                        id, document_id, metric_name, metric_category, value, unit,
                        period_type, fiscal_year, fiscal_quarter, period_start, period_end,
                        source_cell, source_sheet, source_page, source_formula,
                        is_actual, confidence_score, notes
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
                    "#,
                    params![
                        Uuid::new_v4().to_string(),
                        metric.document_id.clone(),
                        metric.metric_name.clone(),
                        metric.metric_category.as_str(),
                        metric.value.to_string(),
                        metric.unit.clone(),
                        metric.period_type.map(|p| p.as_str()),
                        metric.fiscal_year,
                        metric.fiscal_quarter,
                        metric.period_start.clone(),
                        metric.period_end.clone(),
                        metric.source_cell.clone(),
                        metric.source_sheet.clone(),
                        metric.source_page,
                        metric.source_formula.clone(),
                        metric.is_actual as i64,
                        metric.confidence_score,
                        metric.notes.clone()
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

        info!("💾 [METRIC_REPO]: Persisted {} metric(s) for [{}].", metrics.len(), document_id);
        Ok(metrics.len())
    }

    pub async fn get_financial_metrics(
        &self,
        document_id: &str,
    ) -> Result<Vec<FinancialMetricRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT id, document_id, metric_name, metric_category, value, unit,
                       period_type, fiscal_year, fiscal_quarter,
                       source_cell, source_sheet, source_page, source_formula,
                       is_actual, confidence_score
                FROM financial_metrics WHERE document_id = ?1
                "#,
                params![document_id],
            )
            .await?;

        let mut metrics = Vec::new();
        while let Some(row) = rows.next().await? {
            metrics.push(map_metric_row(&row)?);
        }
        Ok(metrics)
    }
}

fn map_metric_row(row: &Row) -> Result<FinancialMetricRecord, DbError> {
    let category_raw: String = row.get(3)?;
    let metric_category = MetricCategory::parse(&category_raw)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_METRIC_CATEGORY: {}", category_raw)))?;

    let value_raw: String = row.get(4)?;
    let value = Decimal::from_str(&value_raw)
        .map_err(|e| DbError::MappingError(format!("DECIMAL_DECODE: {}", e)))?;

    let period_type = row
        .get::<Option<String>>(6)
        .ok()
        .flatten()
        .and_then(|raw| PeriodType::parse(&raw));

    Ok(FinancialMetricRecord {
        id: row.get(0)?,
        document_id: row.get(1)?,
        metric_name: row.get(2)?,
        metric_category,
        value,
        unit: row.get::<Option<String>>(5).ok().flatten(),
        period_type,
        fiscal_year: row.get::<Option<i64>>(7).ok().flatten().map(|y| y as i32),
        fiscal_quarter: row.get::<Option<i64>>(8).ok().flatten().map(|q| q as i32),
        source_cell: row.get::<Option<String>>(9).ok().flatten(),
        source_sheet: row.get::<Option<String>>(10).ok().flatten(),
        source_page: row.get::<Option<i64>>(11).ok().flatten(),
        source_formula: row.get::<Option<String>>(12).ok().flatten(),
        is_actual: row.get::<i64>(13)? != 0,
        confidence_score: row.get(14)?,
    })
}
