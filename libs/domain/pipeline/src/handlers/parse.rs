// [libs/domain/pipeline/src/handlers/parse.rs]
/*!
 * =================================================================
 * APARATO: PARSE STAGE HANDLER (V10.1)
 * CLASIFICACIÓN: DOMAIN HANDLER (ESTRATO L2)
 * RESPONSABILIDAD: BLOB -> ParseResult -> CHUNKS PERSISTIDOS
 *
 * # Flujo:
 * download blob -> despacho por categoría -> chunking -> persistencia
 * atómica (delete-insert-status) -> encolar 'ingest-graphiti'.
 * =================================================================
 */

use crate::deps::Dependencies;
use crate::handlers::StageError;
use crate::parsers::convert::{DelimitedWorkbookReader, PlainTextConverter};
use crate::parsers::document::UniversalParser;
use crate::chunker::Chunker;
use acumen_domain_models::payloads::ParseDocumentPayload;
use acumen_domain_models::{job_names, Job};
use acumen_infra_db::ChunkDraft;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument};

#[instrument(skip(job, deps), fields(job_id = %job.id))]
pub async fn handle(job: &Job, deps: &Dependencies) -> Result<Value, StageError> {
    let started = std::time::Instant::now();

    let payload: ParseDocumentPayload = serde_json::from_value(job.data.clone())
        .map_err(|e| StageError::InvalidInput(format!("malformed parse payload: {}", e)))?;
    let document_id = payload.document_id.clone();

    match run_stage(deps, &payload).await {
        Ok(mut result) => {
            result["total_time_ms"] = json!(started.elapsed().as_millis() as i64);
            info!("✅ [PARSE]: Document [{}] parsed.", document_id);
            Ok(result)
        }
        Err(stage_error) => {
            error!("❌ [PARSE]: Document [{}] failed: {}", document_id, stage_error);
            if let Err(record_error) = deps
                .retry
                .handle_job_failure(&document_id, &stage_error, "parsing", job.retry_count)
                .await
            {
                error!("⚠️ [PARSE]: Failure bookkeeping collapsed: {}", record_error);
            }
            Err(stage_error)
        }
    }
}

async fn run_stage(
    deps: &Dependencies,
    payload: &ParseDocumentPayload,
) -> Result<Value, StageError> {
    let document_id = &payload.document_id;

    if payload.is_retry {
        deps.retry.prepare_stage_retry(document_id, "parsing").await?;
    } else {
        deps.storage.documents.update_document_status(document_id, "processing").await?;
    }
    deps.storage.documents.clear_processing_error(document_id).await?;

    let document = deps
        .storage
        .documents
        .get_document(document_id)
        .await?
        .ok_or_else(|| StageError::InvalidInput(format!("Document not found: {}", document_id)))?;

    let blob_reference =
        payload.gcs_path.clone().unwrap_or_else(|| document.blob_reference.clone());

    // MIME explícito, o el del registro, o la extensión de la ruta.
    let file_type = payload
        .file_type
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            if document.mime_type.is_empty() {
                blob_reference.clone()
            } else {
                document.mime_type.clone()
            }
        });

    deps.storage.documents.update_document_status(document_id, "parsing").await?;

    let scratch_path = PathBuf::from(&deps.config.scratch_dir)
        .join(format!("acumen-{}-{}", document_id, sanitized_name(&blob_reference)));

    let local_path = deps.blobs.download(&blob_reference, &scratch_path).await?;

    // El parseo es CPU-bound: corre en el executor bloqueante.
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

    let parse_file_type = file_type.clone();
    let parse_result = tokio::task::spawn_blocking(move || {
        parser.parse(&local_path, &parse_file_type)
    })
    .await
    .map_err(|e| StageError::Other(format!("parse task join failure: {}", e)))?
    .map_err(|e| StageError::Parse(e.to_string()))?;

    let drafts: Vec<ChunkDraft> = parse_result
        .chunks
        .iter()
        .map(|chunk| ChunkDraft {
            content: chunk.content.clone(),
            chunk_type: chunk.chunk_type,
            chunk_index: chunk.chunk_index,
            page_number: chunk.page_number,
            sheet_name: chunk.sheet_name.clone(),
            cell_reference: chunk.cell_reference.clone(),
            token_count: chunk.token_count,
            metadata: chunk.metadata.clone(),
        })
        .collect();

    let stored = deps
        .storage
        .chunks
        .store_chunks_and_update_status(document_id, &drafts, "parsed")
        .await?;

    deps.retry.mark_stage_complete(document_id, "parsing").await?;

    // Siguiente arista del pipeline: ingesta de grafo + embeddings.
    let deal_id = payload.deal_id.clone().unwrap_or_else(|| document.deal_id.clone());
    let mut next_payload = json!({ "document_id": document_id, "deal_id": deal_id });
    if let Some(user_id) = &payload.user_id {
        next_payload["user_id"] = json!(user_id);
    }
    let next_job_id =
        deps.queue.enqueue(job_names::INGEST_GRAPHITI, next_payload, None).await?;

    info!(
        "📨 [PARSE]: Enqueued {} as [{}] after storing {} chunk(s).",
        job_names::INGEST_GRAPHITI,
        next_job_id,
        stored
    );

    Ok(json!({
        "success": true,
        "document_id": document_id,
        "chunks_stored": stored,
        "tables_found": parse_result.tables.len(),
        "formulas_found": parse_result.formulas.len(),
        "total_pages": parse_result.total_pages,
        "total_sheets": parse_result.total_sheets,
        "parse_time_ms": parse_result.parse_time_ms,
        "warnings": parse_result.warnings,
        "next_job_id": next_job_id,
    }))
}

fn sanitized_name(reference: &str) -> String {
    reference
        .rsplit('/')
        .next()
        .unwrap_or("blob")
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
