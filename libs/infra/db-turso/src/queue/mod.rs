// [libs/infra/db-turso/src/queue/mod.rs]
/*!
 * =================================================================
 * APARATO: DURABLE JOB QUEUE (V9.4 - AT-LEAST-ONCE)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ENTREGA AT-LEAST-ONCE DE TRABAJOS NOMINADOS
 *
 * # Logic:
 * La cola ES la arista del pipeline: los handlers se comunican
 * exclusivamente encolando trabajos sucesores. Los defaults se
 * indexan por nombre; las opciones explícitas sobreescriben campo a
 * campo. El backoff exponencial sigue delay * 2^retry_count.
 * =================================================================
 */

pub mod queries;

use crate::errors::DbError;
use crate::TursoClient;
use acumen_domain_models::{job_names, EnqueueOptions, Job, JobState};
use chrono::{DateTime, Duration, Utc};
use libsql::{params, Row};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Contrato por defecto de un nombre de trabajo.
#[derive(Debug, Clone, Copy)]
pub struct JobDefaults {
    pub priority: i64,
    pub retry_limit: i64,
    pub retry_delay: i64,
    pub retry_backoff: bool,
}

const GENERIC_DEFAULTS: JobDefaults =
    JobDefaults { priority: 0, retry_limit: 3, retry_delay: 30, retry_backoff: true };

/// Defaults indexados por nombre. El parseo entra con la prioridad más
/// alta del flujo documental; la analítica corre al fondo de la cola.
pub fn default_job_options(job_name: &str) -> JobDefaults {
    match job_name {
        job_names::PARSE_DOCUMENT => {
            JobDefaults { priority: 5, retry_limit: 3, retry_delay: 30, retry_backoff: true }
        }
        job_names::INGEST_GRAPHITI => {
            JobDefaults { priority: 4, retry_limit: 3, retry_delay: 30, retry_backoff: true }
        }
        job_names::ANALYZE_DOCUMENT | job_names::EXTRACT_FINANCIALS => {
            JobDefaults { priority: 3, retry_limit: 3, retry_delay: 60, retry_backoff: true }
        }
        job_names::DETECT_CONTRADICTIONS => {
            JobDefaults { priority: 2, retry_limit: 3, retry_delay: 60, retry_backoff: true }
        }
        job_names::INGEST_QA_RESPONSE | job_names::INGEST_CHAT_FACT => {
            JobDefaults { priority: 6, retry_limit: 3, retry_delay: 15, retry_backoff: true }
        }
        job_names::ANALYZE_FEEDBACK | job_names::ANALYZE_FEEDBACK_ALL => {
            JobDefaults { priority: 1, retry_limit: 2, retry_delay: 120, retry_backoff: false }
        }
        _ => GENERIC_DEFAULTS,
    }
}

#[derive(Clone)]
pub struct JobQueue {
    database_client: TursoClient,
}

impl JobQueue {
    pub fn new(client: TursoClient) -> Self {
        Self { database_client: client }
    }

    /// Registra un trabajo nuevo en estado 'created'.
    ///
    /// # Errors:
    /// - `DbError::QueryError`: si el Ledger rechaza la inserción. El
    ///   llamador debe dejar que su transacción externa colapse.
    #[instrument(skip(self, data, options))]
    pub async fn enqueue(
        &self,
        name: &str,
        data: Value,
        options: Option<EnqueueOptions>,
    ) -> Result<String, DbError> {
        let defaults = default_job_options(name);
        let options = options.unwrap_or_default();

        let job_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let start_after = now
            + Duration::seconds(options.start_after_seconds.unwrap_or(0).max(0));

        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                queries::INSERT_JOB,
                params![
                    job_id.clone(),
                    name,
                    data.to_string(),
                    options.priority.unwrap_or(defaults.priority),
                    options.retry_limit.unwrap_or(defaults.retry_limit),
                    options.retry_delay.unwrap_or(defaults.retry_delay),
                    options.retry_backoff.unwrap_or(defaults.retry_backoff) as i64,
                    start_after.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await?;

        debug!("📨 [QUEUE]: Job [{}] enqueued as [{}].", name, job_id);
        Ok(job_id)
    }

    /// Despacha hasta 'batch_size' trabajos elegibles hacia 'active'.
    ///
    /// La reclamación es por fila con guardia de estado: los candidatos
    /// arrebatados por otro worker simplemente se omiten.
    #[instrument(skip(self))]
    pub async fn dequeue(&self, name: &str, batch_size: usize) -> Result<Vec<Job>, DbError> {
        let connection = self.database_client.get_connection()?;
        let now = Utc::now().to_rfc3339();

        let mut candidate_rows = connection
            .query(
                queries::SELECT_DISPATCH_CANDIDATES,
                params![name, now.clone(), batch_size as i64],
            )
            .await?;

        let mut candidate_ids: Vec<String> = Vec::new();
        while let Some(row) = candidate_rows.next().await? {
            candidate_ids.push(row.get::<String>(0)?);
        }

        let mut claimed_jobs = Vec::new();
        for candidate_id in candidate_ids {
            let claimed = connection
                .execute(queries::CLAIM_JOB, params![candidate_id.clone(), now.clone()])
                .await?;

            if claimed == 1 {
                if let Some(job) = self.get_job(&candidate_id).await? {
                    claimed_jobs.push(job);
                }
            }
        }

        if !claimed_jobs.is_empty() {
            debug!("🎯 [QUEUE]: Dispatched {} job(s) of [{}].", claimed_jobs.len(), name);
        }

        Ok(claimed_jobs)
    }

    /// Sella un trabajo como completado, con su salida opcional.
    #[instrument(skip(self, output))]
    pub async fn complete(&self, job_id: &str, output: Option<Value>) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                queries::MARK_COMPLETED,
                params![
                    job_id,
                    Utc::now().to_rfc3339(),
                    output.map(|v| v.to_string())
                ],
            )
            .await?;
        Ok(())
    }

    /// Registra un fallo: reprograma con backoff si quedan reintentos,
    /// o sella en 'failed' terminal si el contrato se agotó.
    #[instrument(skip(self))]
    pub async fn fail(&self, job_id: &str, error_message: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        let mut contract_rows =
            connection.query(queries::FETCH_RETRY_CONTRACT, params![job_id]).await?;

        let Some(contract_row) = contract_rows.next().await? else {
            // Fila desaparecida: sellamos terminal igualmente.
            connection
                .execute(
                    queries::MARK_FAILED,
                    params![job_id, Utc::now().to_rfc3339(), error_message],
                )
                .await?;
            return Ok(());
        };

        let retry_count: i64 = contract_row.get(0)?;
        let retry_limit: i64 = contract_row.get(1)?;
        let retry_delay: i64 = contract_row.get(2)?;
        let retry_backoff: i64 = contract_row.get(3)?;

        if retry_count < retry_limit {
            let delay_seconds = if retry_backoff != 0 {
                retry_delay.saturating_mul(1_i64 << retry_count.min(30))
            } else {
                retry_delay
            };
            let next_attempt_at = Utc::now() + Duration::seconds(delay_seconds);

            connection
                .execute(
                    queries::SCHEDULE_RETRY,
                    params![job_id, next_attempt_at.to_rfc3339(), error_message],
                )
                .await?;

            info!(
                "♻️  [QUEUE]: Job [{}] rescheduled (attempt {}/{}, delay {}s).",
                job_id,
                retry_count + 1,
                retry_limit,
                delay_seconds
            );
        } else {
            connection
                .execute(
                    queries::MARK_FAILED,
                    params![job_id, Utc::now().to_rfc3339(), error_message],
                )
                .await?;

            warn!("🪦 [QUEUE]: Job [{}] sealed as FAILED after {} retries.", job_id, retry_count);
        }

        Ok(())
    }

    /// Sella el trabajo como 'failed' terminal sin consumir el contrato
    /// de reintentos. Vía de los errores clasificados como permanentes.
    #[instrument(skip(self))]
    pub async fn fail_permanently(&self, job_id: &str, error_message: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                queries::MARK_FAILED,
                params![job_id, Utc::now().to_rfc3339(), error_message],
            )
            .await?;

        warn!("🪦 [QUEUE]: Job [{}] sealed as FAILED (permanent short-circuit).", job_id);
        Ok(())
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Option<Job>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection.query(queries::FETCH_JOB, params![job_id]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_job_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Conteos por (nombre, estado) para el panel de observabilidad.
    pub async fn queue_counts(&self) -> Result<HashMap<String, HashMap<String, i64>>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection.query(queries::COUNT_BY_NAME_AND_STATE, ()).await?;

        let mut counts: HashMap<String, HashMap<String, i64>> = HashMap::new();
        while let Some(row) = rows.next().await? {
            let name: String = row.get(0)?;
            let state: String = row.get(1)?;
            let count: i64 = row.get(2)?;
            counts.entry(name).or_default().insert(state, count);
        }

        Ok(counts)
    }

    /// Devuelve trabajos 'active' cuyo arrendamiento expiró al estado
    /// 'retry'. Ejecutado periódicamente por el reaper del worker.
    #[instrument(skip(self))]
    pub async fn reclaim_expired(&self, visibility_timeout_seconds: i64) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let expiry_threshold = Utc::now() - Duration::seconds(visibility_timeout_seconds);

        let reclaimed = connection
            .execute(queries::RECLAIM_EXPIRED_LEASES, params![expiry_threshold.to_rfc3339()])
            .await?;

        if reclaimed > 0 {
            warn!("♻️  [REAPER]: Reclaimed {} expired lease(s).", reclaimed);
        }
        Ok(reclaimed)
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::MappingError(format!("TIMESTAMP_DECODE: {}", e)))
}

fn map_job_row(row: &Row) -> Result<Job, DbError> {
    let state_raw: String = row.get(3)?;
    let state = JobState::parse(&state_raw)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_JOB_STATE: {}", state_raw)))?;

    let data_raw: Option<String> = row.get::<Option<String>>(2).ok().flatten();
    let data = data_raw
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| DbError::MappingError(format!("JOB_DATA_DECODE: {}", e)))?
        .unwrap_or_else(|| Value::Object(Default::default()));

    let output = row
        .get::<Option<String>>(13)
        .ok()
        .flatten()
        .and_then(|raw| serde_json::from_str(&raw).ok());

    Ok(Job {
        id: row.get(0)?,
        name: row.get(1)?,
        data,
        state,
        priority: row.get(4)?,
        retry_count: row.get(5)?,
        retry_limit: row.get(6)?,
        retry_delay: row.get(7)?,
        retry_backoff: row.get::<i64>(8)? != 0,
        start_after: parse_timestamp(&row.get::<String>(9)?)?,
        created_on: parse_timestamp(&row.get::<String>(10)?)?,
        started_on: row
            .get::<Option<String>>(11)
            .ok()
            .flatten()
            .map(|ts| parse_timestamp(&ts))
            .transpose()?,
        completed_on: row
            .get::<Option<String>>(12)
            .ok()
            .flatten()
            .map(|ts| parse_timestamp(&ts))
            .transpose()?,
        output,
        last_error: row.get::<Option<String>>(14).ok().flatten(),
    })
}
