// [libs/domain/pipeline/src/retry.rs]
/*!
 * =================================================================
 * APARATO: RETRY MANAGER (V10.2 - STAGE CURSOR AUTHORITY)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: DECISIÓN Y EJECUCIÓN DE REINTENTOS POR ETAPA
 *
 * # Logic:
 * El manager registra; la cola programa. 'retry_history' es el
 * registro autoritativo visible al usuario; 'jobs.retry_count' es
 * estado privado del scheduler y ambos pueden divergir.
 * =================================================================
 */

use crate::classifier::ErrorClassifier;
use crate::handlers::StageError;
use acumen_domain_models::{
    failed_status_for_stage, job_names, next_stage, running_status_for_stage, ClassifiedError,
    ErrorCategory, ProcessingStage, RetryHistoryEntry,
};
use acumen_infra_db::{DbError, JobQueue, Storage};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Reintentos automáticos permitidos por etapa.
pub const MAX_RETRY_ATTEMPTS: usize = 3;
/// Cota total de entradas de historial por documento.
pub const MAX_TOTAL_RETRY_ATTEMPTS: usize = 10;
/// Ventana de enfriamiento del retry manual.
pub const MANUAL_RETRY_COOLDOWN_SECONDS: i64 = 60;

pub struct RetryManager {
    storage: Storage,
    queue: Arc<JobQueue>,
    classifier: ErrorClassifier,
}

impl RetryManager {
    pub fn new(storage: Storage, queue: Arc<JobQueue>, classifier: ErrorClassifier) -> Self {
        Self { storage, queue, classifier }
    }

    /// Clasifica el fallo, lo persiste y decide el destino grueso.
    ///
    /// - Permanente: estatus '{etapa}_failed'; el pipeline se detiene.
    /// - Transitorio/desconocido: el estatus '*ing' queda intacto y la
    ///   cola reprograma cuando el handler re-lanza.
    #[instrument(skip(self, error))]
    pub async fn handle_job_failure(
        &self,
        document_id: &str,
        error: &StageError,
        current_stage: &str,
        retry_count: i64,
    ) -> Result<ClassifiedError, DbError> {
        let classified = self.classifier.classify(error, Some(current_stage), retry_count);

        self.storage
            .documents
            .update_processing_error(document_id, &json!(classified))
            .await?;

        let mut message = classified.message.clone();
        if message.len() > 500 {
            let mut cut = 500;
            while cut > 0 && !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        self.storage
            .documents
            .append_retry_history(
                document_id,
                RetryHistoryEntry {
                    attempt: retry_count + 1,
                    stage: current_stage.to_string(),
                    error_type: classified.error_type.clone(),
                    message,
                    timestamp: classified.timestamp.clone(),
                },
            )
            .await?;

        if classified.category == ErrorCategory::Permanent {
            let failed_status = failed_status_for_stage(current_stage);
            self.storage
                .documents
                .update_document_status(document_id, failed_status.as_str())
                .await?;

            warn!(
                "🛑 [RETRY_MGR]: Permanent failure at [{}]; document [{}] sealed as [{}].",
                current_stage, document_id, failed_status
            );
        } else {
            info!(
                "♻️  [RETRY_MGR]: {} failure at [{}] recorded for [{}]; queue will reschedule.",
                classified.category.as_str(),
                current_stage,
                document_id
            );
        }

        Ok(classified)
    }

    /// ¿Quedan reintentos automáticos para esta etapa?
    /// Devuelve (permitir, intentos observados en el historial).
    pub async fn should_retry_stage(
        &self,
        document_id: &str,
        stage: &str,
    ) -> Result<(bool, usize), DbError> {
        let history = self.storage.documents.get_retry_history(document_id).await?;
        let attempts_seen = history.iter().filter(|entry| entry.stage == stage).count();
        Ok((attempts_seen < MAX_RETRY_ATTEMPTS, attempts_seen))
    }

    /// Protocolo de retry manual: cota total e intervalo de enfriamiento.
    /// Timestamps ausentes o ilegibles se tratan como sin enfriamiento.
    pub async fn can_manual_retry(
        &self,
        document_id: &str,
    ) -> Result<(bool, Option<String>), DbError> {
        let history = self.storage.documents.get_retry_history(document_id).await?;

        if history.len() >= MAX_TOTAL_RETRY_ATTEMPTS {
            return Ok((
                false,
                Some(format!(
                    "Maximum retry attempts ({}) reached for this document",
                    MAX_TOTAL_RETRY_ATTEMPTS
                )),
            ));
        }

        // El historial está ordenado newest-first por contrato.
        if let Some(latest) = history.first() {
            if let Ok(latest_at) = DateTime::parse_from_rfc3339(&latest.timestamp) {
                let elapsed = Utc::now().signed_duration_since(latest_at.with_timezone(&Utc));
                let remaining = MANUAL_RETRY_COOLDOWN_SECONDS - elapsed.num_seconds();
                if remaining > 0 {
                    return Ok((
                        false,
                        Some(format!("Please wait {} seconds before retrying", remaining)),
                    ));
                }
            }
        }

        Ok((true, None))
    }

    /// Etiqueta de etapa cuya ejecución avanzaría el cursor un paso,
    /// o None si el documento ya está completo.
    ///
    /// Cursor ausente o ilegible cae en "parsing". El mapa conserva la
    /// peculiaridad heredada PENDING -> "embedding" (el trabajo de
    /// entrada real es parse+ingest), con un override explícito: sin
    /// chunks almacenados no hay parseo completo y la respuesta es
    /// "parsing" sin importar el cursor.
    pub async fn get_next_retry_stage(
        &self,
        document_id: &str,
    ) -> Result<Option<String>, DbError> {
        let stage_raw = self.storage.documents.get_document_stage(document_id).await?;

        let resolved = match stage_raw.as_deref().and_then(ProcessingStage::parse) {
            None => Some("parsing".to_string()),
            Some(last_completed) => match next_stage(Some(last_completed)) {
                ProcessingStage::Parsed => Some("embedding".to_string()),
                ProcessingStage::Embedded => Some("analyzing".to_string()),
                ProcessingStage::Analyzed | ProcessingStage::Complete => None,
                ProcessingStage::Pending => Some("parsing".to_string()),
            },
        };

        if resolved.as_deref() == Some("embedding")
            && self.storage.documents.count_chunks(document_id).await? == 0
        {
            return Ok(Some("parsing".to_string()));
        }

        Ok(resolved)
    }

    /// Limpia el error almacenado y encola el trabajo de la etapa.
    /// Etiquetas desconocidas no encolan nada y devuelven None.
    #[instrument(skip(self))]
    pub async fn enqueue_stage_retry(
        &self,
        document_id: &str,
        stage: &str,
        deal_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Option<String>, DbError> {
        let job_name = match stage {
            "parsing" => job_names::PARSE_DOCUMENT,
            "embedding" => job_names::INGEST_GRAPHITI,
            "analyzing" => job_names::ANALYZE_DOCUMENT,
            _ => return Ok(None),
        };

        self.storage.documents.clear_processing_error(document_id).await?;

        let mut payload = json!({ "document_id": document_id, "is_retry": true });
        if let Some(deal) = deal_id {
            payload["deal_id"] = json!(deal);
        }
        if let Some(user) = user_id {
            payload["user_id"] = json!(user);
        }

        let job_id = self.queue.enqueue(job_name, payload, None).await?;

        info!(
            "🔁 [RETRY_MGR]: Stage [{}] retry enqueued as [{}] for document [{}].",
            stage, job_id, document_id
        );
        Ok(Some(job_id))
    }

    /// Borra los artefactos de la etapa y deja el estatus en '*ing'.
    #[instrument(skip(self))]
    pub async fn prepare_stage_retry(&self, document_id: &str, stage: &str) -> Result<bool, DbError> {
        self.storage.documents.clear_stage_data(document_id, stage).await?;
        self.storage
            .documents
            .update_document_status(document_id, running_status_for_stage(stage).as_str())
            .await?;
        Ok(true)
    }

    /// Sella el cursor fino de la etapa completada.
    /// parsing|parsed -> parsed, embedding -> embedded,
    /// analyzing -> analyzed. Etiquetas sin cursor propio no tocan nada.
    #[instrument(skip(self))]
    pub async fn mark_stage_complete(&self, document_id: &str, stage: &str) -> Result<bool, DbError> {
        let completed_stage = match stage {
            "parsing" | "parsed" => Some("parsed"),
            "embedding" | "embedded" | "graphiti_ingesting" => Some("embedded"),
            "analyzing" | "analyzed" => Some("analyzed"),
            "complete" => Some("complete"),
            _ => None,
        };

        let Some(completed_stage) = completed_stage else {
            return Ok(false);
        };

        self.storage
            .documents
            .update_document_stage(document_id, Some(completed_stage))
            .await?;
        Ok(true)
    }
}
