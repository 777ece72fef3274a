// [libs/domain/pipeline/src/handlers/extract_financials.rs]
/*!
 * =================================================================
 * APARATO: FINANCIAL EXTRACTION STAGE HANDLER (V7.2)
 * CLASIFICACIÓN: DOMAIN HANDLER (ESTRATO L2)
 * RESPONSABILIDAD: DETECCIÓN + EXTRACCIÓN DE MÉTRICAS -> 'complete'
 *
 * # Flujo:
 * El ParseResult se reconstruye re-parseando el blob (el parseo es
 * determinista y tablas/fórmulas no se persisten). Bajo el umbral de
 * detección (30, inclusivo) la extracción se omite y el documento se
 * sella como completo.
 * =================================================================
 */

use crate::chunker::Chunker;
use crate::deps::Dependencies;
use crate::financial::{FinancialDocumentDetector, FinancialMetricExtractor};
use crate::handlers::StageError;
use crate::parsers::convert::{DelimitedWorkbookReader, PlainTextConverter};
use crate::parsers::document::UniversalParser;
use acumen_domain_models::payloads::ExtractFinancialsPayload;
use acumen_domain_models::Job;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument};

#[instrument(skip(job, deps), fields(job_id = %job.id))]
pub async fn handle(job: &Job, deps: &Dependencies) -> Result<Value, StageError> {
    let started = std::time::Instant::now();

    let payload: ExtractFinancialsPayload = serde_json::from_value(job.data.clone())
        .map_err(|e| StageError::InvalidInput(format!("malformed financials payload: {}", e)))?;
    let document_id = payload.document_id.clone();

    match run_stage(deps, &payload).await {
        Ok(mut result) => {
            result["total_time_ms"] = json!(started.elapsed().as_millis() as i64);
            Ok(result)
        }
        Err(stage_error) => {
            error!("❌ [FINANCIALS]: Document [{}] failed: {}", document_id, stage_error);
            if let Err(record_error) = deps
                .retry
                .handle_job_failure(
                    &document_id,
                    &stage_error,
                    "extracting_financials",
                    job.retry_count,
                )
                .await
            {
                error!("⚠️ [FINANCIALS]: Failure bookkeeping collapsed: {}", record_error);
            }
            Err(stage_error)
        }
    }
}

async fn run_stage(
    deps: &Dependencies,
    payload: &ExtractFinancialsPayload,
) -> Result<Value, StageError> {
    let document_id = &payload.document_id;

    deps.storage
        .documents
        .update_document_status(document_id, "extracting_financials")
        .await?;
    deps.storage.documents.clear_processing_error(document_id).await?;

    let document = deps
        .storage
        .documents
        .get_document(document_id)
        .await?
        .ok_or_else(|| StageError::InvalidInput(format!("Document not found: {}", document_id)))?;

    // Reconstrucción determinista del ParseResult desde el blob.
    let scratch_path = PathBuf::from(&deps.config.scratch_dir)
        .join(format!("acumen-fin-{}", document_id));
    let local_path = deps.blobs.download(&document.blob_reference, &scratch_path).await?;

    let chunker = Chunker::new(
        deps.config.chunk_min_tokens,
        deps.config.chunk_max_tokens,
        deps.config.chunk_overlap_tokens,
    );
    let parser = UniversalParser::new(
        chunker,
        Arc::new(PlainTextConverter),
        Arc::new(DelimitedWorkbookReader),
    );

    let mime_type = document.mime_type.clone();
    let parse_result =
        tokio::task::spawn_blocking(move || parser.parse(&local_path, &mime_type))
            .await
            .map_err(|e| StageError::Other(format!("parse task join failure: {}", e)))?
            .map_err(|e| StageError::Parse(e.to_string()))?;

    let extractor = FinancialMetricExtractor::new(FinancialDocumentDetector::new());
    let document_id_owned = document_id.clone();
    let extraction = tokio::task::spawn_blocking(move || {
        extractor.extract(&document_id_owned, &parse_result)
    })
    .await
    .map_err(|e| StageError::Other(format!("extraction task join failure: {}", e)))?;

    if !extraction.has_financial_data {
        info!(
            "💹 [FINANCIALS]: Confidence {} below threshold; sealing [{}] as complete.",
            extraction.detection_confidence, document_id
        );
        deps.storage.documents.update_document_status(document_id, "complete").await?;

        return Ok(json!({
            "success": true,
            "document_id": document_id,
            "skipped": true,
            "detection_confidence": extraction.detection_confidence,
            "metrics_stored": 0,
        }));
    }

    let stored = deps
        .storage
        .metrics
        .store_financial_metrics_and_update_status(document_id, &extraction.metrics, "complete")
        .await?;

    info!(
        "💹 [FINANCIALS]: {} metric(s) stored for [{}] (confidence {}).",
        stored, document_id, extraction.detection_confidence
    );

    Ok(json!({
        "success": true,
        "document_id": document_id,
        "skipped": false,
        "detection_confidence": extraction.detection_confidence,
        "document_type": extraction.document_type,
        "metrics_stored": stored,
        "extraction_errors": extraction.errors,
    }))
}
