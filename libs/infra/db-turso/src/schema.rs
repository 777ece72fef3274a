// [libs/infra/db-turso/src/schema.rs]
/*!
 * =================================================================
 * APARATO: RELATIONAL SCHEMA BOOTSTRAP (V9.0 - DILIGENCE LEDGER)
 * CLASIFICACIÓN: INFRASTRUCTURE SQL (ESTRATO L3)
 * RESPONSABILIDAD: MATERIALIZACIÓN IDEMPOTENTE DEL ESQUEMA COMPLETO
 *
 * # Logic:
 * Toda fila derivada resuelve hacia su organización vía 'deals':
 * organizations ⊇ deals ⊇ {documents ⊇ chunks, findings,
 * financial_metrics, contradictions}. Las sentencias usan
 * IF NOT EXISTS para tolerar re-ejecuciones en cada arranque.
 * =================================================================
 */

use crate::errors::DbError;
use libsql::Connection;
use tracing::info;

const SCHEMA_STATEMENTS: &[&str] = &[
    // --- ESTRATO DE TENENCIA ---
    r#"
    CREATE TABLE IF NOT EXISTS organizations (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS deals (
        id TEXT PRIMARY KEY,
        organization_id TEXT NOT NULL REFERENCES organizations(id),
        name TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_deals_organization ON deals(organization_id)",
    // --- ESTRATO DOCUMENTAL ---
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        deal_id TEXT NOT NULL REFERENCES deals(id),
        name TEXT NOT NULL,
        blob_reference TEXT NOT NULL,
        mime_type TEXT NOT NULL,
        processing_status TEXT NOT NULL DEFAULT 'pending',
        last_completed_stage TEXT,
        processing_error TEXT,
        retry_history TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
        updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_documents_deal ON documents(deal_id)",
    "CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(processing_status)",
    r#"
    CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL REFERENCES documents(id),
        chunk_index INTEGER NOT NULL,
        content TEXT NOT NULL,
        chunk_type TEXT NOT NULL DEFAULT 'text',
        page_number INTEGER,
        sheet_name TEXT,
        cell_reference TEXT,
        token_count INTEGER,
        embedding TEXT,
        metadata TEXT NOT NULL DEFAULT '{}'
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id, chunk_index)",
    // --- ESTRATO DE HALLAZGOS ---
    r#"
    CREATE TABLE IF NOT EXISTS findings (
        id TEXT PRIMARY KEY,
        deal_id TEXT NOT NULL REFERENCES deals(id),
        document_id TEXT NOT NULL REFERENCES documents(id),
        chunk_id TEXT REFERENCES chunks(id),
        text TEXT NOT NULL,
        finding_type TEXT NOT NULL,
        domain TEXT NOT NULL DEFAULT 'general',
        confidence REAL NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'pending',
        metadata TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_findings_deal ON findings(deal_id)",
    "CREATE INDEX IF NOT EXISTS idx_findings_document ON findings(document_id)",
    r#"
    CREATE TABLE IF NOT EXISTS financial_metrics (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL REFERENCES documents(id),
        metric_name TEXT NOT NULL,
        metric_category TEXT NOT NULL,
        value TEXT NOT NULL,
        unit TEXT,
        period_type TEXT,
        fiscal_year INTEGER,
        fiscal_quarter INTEGER,
        period_start TEXT,
        period_end TEXT,
        source_cell TEXT,
        source_sheet TEXT,
        source_page INTEGER,
        source_formula TEXT,
        is_actual INTEGER NOT NULL DEFAULT 1,
        confidence_score REAL NOT NULL DEFAULT 0,
        notes TEXT,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_metrics_document ON financial_metrics(document_id)",
    r#"
    CREATE TABLE IF NOT EXISTS contradictions (
        id TEXT PRIMARY KEY,
        deal_id TEXT NOT NULL REFERENCES deals(id),
        finding_a_id TEXT NOT NULL REFERENCES findings(id),
        finding_b_id TEXT NOT NULL REFERENCES findings(id),
        confidence REAL NOT NULL,
        reason TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'unresolved',
        detected_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
        UNIQUE (deal_id, finding_a_id, finding_b_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_contradictions_deal ON contradictions(deal_id)",
    // --- ESTRATO DE COLA DURABLE ---
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        data TEXT NOT NULL DEFAULT '{}',
        state TEXT NOT NULL DEFAULT 'created',
        priority INTEGER NOT NULL DEFAULT 0,
        retry_count INTEGER NOT NULL DEFAULT 0,
        retry_limit INTEGER NOT NULL DEFAULT 3,
        retry_delay INTEGER NOT NULL DEFAULT 30,
        retry_backoff INTEGER NOT NULL DEFAULT 1,
        start_after TEXT NOT NULL,
        created_on TEXT NOT NULL,
        started_on TEXT,
        completed_on TEXT,
        output TEXT,
        last_error TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_jobs_dispatch ON jobs(name, state, start_after)",
    // --- ESTRATO DE OBSERVABILIDAD Y FEEDBACK ---
    r#"
    CREATE TABLE IF NOT EXISTS usage_log (
        id TEXT PRIMARY KEY,
        organization_id TEXT,
        deal_id TEXT,
        user_id TEXT,
        feature TEXT NOT NULL,
        provider TEXT,
        model TEXT,
        input_tokens INTEGER NOT NULL DEFAULT 0,
        output_tokens INTEGER NOT NULL DEFAULT 0,
        estimated_cost_usd REAL NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'success',
        duration_ms INTEGER NOT NULL DEFAULT 0,
        error_message TEXT,
        metadata TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS finding_corrections (
        id TEXT PRIMARY KEY,
        finding_id TEXT NOT NULL REFERENCES findings(id),
        correction_type TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS validation_feedback (
        id TEXT PRIMARY KEY,
        finding_id TEXT NOT NULL REFERENCES findings(id),
        action TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS confidence_thresholds (
        deal_id TEXT NOT NULL REFERENCES deals(id),
        domain TEXT NOT NULL,
        threshold REAL NOT NULL,
        PRIMARY KEY (deal_id, domain)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feedback_analytics (
        deal_id TEXT NOT NULL REFERENCES deals(id),
        analysis_date TEXT NOT NULL,
        period_start TEXT NOT NULL,
        period_end TEXT NOT NULL,
        analysis_type TEXT NOT NULL DEFAULT 'full',
        summary TEXT NOT NULL DEFAULT '{}',
        total_findings INTEGER NOT NULL DEFAULT 0,
        total_corrections INTEGER NOT NULL DEFAULT 0,
        total_validations INTEGER NOT NULL DEFAULT 0,
        total_rejections INTEGER NOT NULL DEFAULT 0,
        pattern_count INTEGER NOT NULL DEFAULT 0,
        recommendation_count INTEGER NOT NULL DEFAULT 0,
        trigger_type TEXT NOT NULL DEFAULT 'scheduled',
        PRIMARY KEY (deal_id, analysis_date)
    )
    "#,
];

/// Aplica el esquema completo sobre una conexión viva.
///
/// # Errors:
/// - `DbError::QueryError`: si el motor rechaza alguna sentencia.
pub async fn apply_full_schema(connection: &Connection) -> Result<(), DbError> {
    for statement in SCHEMA_STATEMENTS {
        connection.execute(statement, ()).await?;
    }

    info!("🏗️  [SCHEMA]: Relational strata materialized ({} statements).", SCHEMA_STATEMENTS.len());
    Ok(())
}
