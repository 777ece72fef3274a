// [libs/domain/pipeline/src/handlers/mod.rs]
/*!
 * =================================================================
 * APARATO: STAGE HANDLER REGISTRY (V7.0 - ENVELOPE CONTRACT)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATO COMÚN DE HANDLERS Y DESPACHO POR NOMBRE
 *
 * # Envelope (todas las etapas):
 * 1. Payload con al menos document_id/deal_id.
 * 2. is_retry => prepare_stage_retry; si no, estatus '*ing'.
 * 3. clear_processing_error.
 * 4. Trabajo de dominio.
 * 5. Éxito: persistir + mark_stage_complete + encolar sucesores.
 * 6. Fallo: handle_job_failure y re-lanzar hacia la cola.
 * =================================================================
 */

pub mod analyze;
pub mod analyze_feedback;
pub mod detect_contradictions;
pub mod extract_financials;
pub mod ingest_graph;
pub mod ingest_knowledge;
pub mod parse;

use crate::deps::Dependencies;
use acumen_domain_models::{job_names, Job};
use acumen_infra_blob::BlobError;
use acumen_infra_db::DbError;
use acumen_infra_graph::GraphError;
use acumen_infra_llm::LlmError;
use serde_json::Value;
use thiserror::Error;

/// Fallo de una etapa. Los orígenes de adaptador conservan su veredicto
/// tipado de reintento; el clasificador lo consume como vía rápida.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("{0}")]
    Db(#[from] DbError),

    #[error("{0}")]
    Blob(#[from] BlobError),

    #[error("{0}")]
    Llm(#[from] LlmError),

    #[error("{0}")]
    Graph(#[from] GraphError),

    /// Datos de entrada inválidos (entidad inexistente, payload roto).
    /// Siempre permanente: corta el pipeline sin consumir reintentos.
    #[error("validation error: {0}")]
    InvalidInput(String),

    /// Fallo de parseo del contenido del documento. Permanente.
    #[error("{0}")]
    Parse(String),

    /// Fallo sin origen tipado (librerías de terceros).
    #[error("{0}")]
    Other(String),
}

impl StageError {
    /// Nombre de la clase del error, insumo de las pistas del clasificador.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Db(_) => "DbError",
            Self::Blob(_) => "BlobError",
            Self::Llm(_) => "LlmError",
            Self::Graph(_) => "GraphError",
            Self::InvalidInput(_) => "ValueError",
            Self::Parse(_) => "ParseError",
            Self::Other(_) => "Error",
        }
    }

    /// Veredicto tipado del adaptador de origen, si existe.
    pub fn typed_retryable(&self) -> Option<bool> {
        match self {
            Self::Db(e) => Some(e.is_retryable()),
            Self::Blob(e) => Some(e.is_retryable()),
            Self::Llm(e) => Some(e.is_retryable()),
            Self::Graph(e) => Some(e.is_retryable()),
            Self::InvalidInput(_) | Self::Parse(_) => Some(false),
            Self::Other(_) => None,
        }
    }
}

/// Despacha un trabajo hacia el handler registrado bajo su nombre.
///
/// # Errors:
/// - `StageError::InvalidInput`: nombre de trabajo sin handler.
pub async fn dispatch(job: &Job, deps: &Dependencies) -> Result<Value, StageError> {
    match job.name.as_str() {
        job_names::PARSE_DOCUMENT => parse::handle(job, deps).await,
        job_names::INGEST_GRAPHITI => ingest_graph::handle(job, deps).await,
        job_names::ANALYZE_DOCUMENT => analyze::handle(job, deps).await,
        job_names::EXTRACT_FINANCIALS => extract_financials::handle(job, deps).await,
        job_names::DETECT_CONTRADICTIONS => detect_contradictions::handle(job, deps).await,
        job_names::INGEST_QA_RESPONSE => ingest_knowledge::handle_qa(job, deps).await,
        job_names::INGEST_CHAT_FACT => ingest_knowledge::handle_chat(job, deps).await,
        job_names::ANALYZE_FEEDBACK => analyze_feedback::handle(job, deps).await,
        job_names::ANALYZE_FEEDBACK_ALL => analyze_feedback::handle_all(job, deps).await,
        unknown => Err(StageError::InvalidInput(format!("no handler registered for '{}'", unknown))),
    }
}

/// Nombres de trabajo que el worker sondea.
pub const REGISTERED_JOB_NAMES: &[&str] = &[
    job_names::PARSE_DOCUMENT,
    job_names::INGEST_GRAPHITI,
    job_names::ANALYZE_DOCUMENT,
    job_names::EXTRACT_FINANCIALS,
    job_names::DETECT_CONTRADICTIONS,
    job_names::INGEST_QA_RESPONSE,
    job_names::INGEST_CHAT_FACT,
    job_names::ANALYZE_FEEDBACK,
    job_names::ANALYZE_FEEDBACK_ALL,
];
