// [libs/domain/pipeline/src/handlers/ingest_graph.rs]
/*!
 * =================================================================
 * APARATO: GRAPH INGEST STAGE HANDLER (V9.0 - EMBED + EPISODES)
 * CLASIFICACIÓN: DOMAIN HANDLER (ESTRATO L2)
 * RESPONSABILIDAD: EMBEDDINGS DE CHUNKS + EPISODIOS AISLADOS POR TENANT
 *
 * # Flujo:
 * idempotencia -> graphiti_ingesting -> embeddings atómicos ->
 * un episodio por chunk (secuencial por namespace) ->
 * graphiti_ingested + cursor 'embedded' -> encolar 'analyze-document'.
 * Una lista de chunks vacía es válida: el estatus avanza sin episodios.
 * =================================================================
 */

use crate::deps::Dependencies;
use crate::handlers::StageError;
use acumen_domain_models::payloads::IngestGraphPayload;
use acumen_domain_models::{job_names, Job};
use acumen_infra_graph::{EpisodeRequest, DOCUMENT_CONFIDENCE};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info, instrument};

#[instrument(skip(job, deps), fields(job_id = %job.id))]
pub async fn handle(job: &Job, deps: &Dependencies) -> Result<Value, StageError> {
    let started = std::time::Instant::now();

    let payload: IngestGraphPayload = serde_json::from_value(job.data.clone())
        .map_err(|e| StageError::InvalidInput(format!("malformed ingest payload: {}", e)))?;
    let document_id = payload.document_id.clone();

    match run_stage(deps, &payload).await {
        Ok(mut result) => {
            result["total_time_ms"] = json!(started.elapsed().as_millis() as i64);
            Ok(result)
        }
        Err(stage_error) => {
            error!("❌ [GRAPH_INGEST]: Document [{}] failed: {}", document_id, stage_error);
            if let Err(record_error) = deps
                .retry
                .handle_job_failure(&document_id, &stage_error, "graphiti_ingesting", job.retry_count)
                .await
            {
                error!("⚠️ [GRAPH_INGEST]: Failure bookkeeping collapsed: {}", record_error);
            }
            Err(stage_error)
        }
    }
}

async fn run_stage(
    deps: &Dependencies,
    payload: &IngestGraphPayload,
) -> Result<Value, StageError> {
    let document_id = &payload.document_id;

    let document = deps
        .storage
        .documents
        .get_document(document_id)
        .await?
        .ok_or_else(|| StageError::InvalidInput(format!("Document not found: {}", document_id)))?;

    // Idempotencia: un trabajo duplicado sobre un documento ya
    // ingresado retorna éxito sin reingesta.
    if document.processing_status == "graphiti_ingested" && !payload.is_retry {
        info!("⏭️  [GRAPH_INGEST]: Document [{}] already ingested; skipping.", document_id);
        return Ok(json!({
            "success": true,
            "document_id": document_id,
            "skipped": true,
            "episode_count": 0,
        }));
    }

    if payload.is_retry {
        deps.retry.prepare_stage_retry(document_id, "embedding").await?;
    }
    deps.storage
        .documents
        .update_document_status(document_id, "graphiti_ingesting")
        .await?;
    deps.storage.documents.clear_processing_error(document_id).await?;

    let organization_id =
        deps.storage.tenancy.get_organization_id_for_deal(&payload.deal_id).await?;

    let chunks = deps.storage.chunks.get_chunks_by_document(document_id).await?;

    let mut episode_count = 0usize;

    if !chunks.is_empty() {
        // Embeddings persistidos atómicamente junto al estatus vigente.
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let (vectors, _usage) = deps.embeddings.embed(&texts).await?;

        let pairs: Vec<(String, Vec<f32>)> = chunks
            .iter()
            .zip(vectors.into_iter())
            .map(|(chunk, vector)| (chunk.id.clone(), vector))
            .collect();

        deps.storage
            .chunks
            .update_embeddings_and_status(document_id, &pairs, "graphiti_ingesting")
            .await?;

        // Episodios en serie dentro del namespace: contrato del grafo.
        for chunk in &chunks {
            deps.graph
                .add_episode(EpisodeRequest {
                    deal_id: payload.deal_id.clone(),
                    organization_id: organization_id.clone(),
                    content: chunk.content.clone(),
                    name: format!("{}-chunk-{}", document.name, chunk.chunk_index),
                    source_description: format!("Document chunk from {}", document.name),
                    reference_time: Utc::now(),
                    confidence: DOCUMENT_CONFIDENCE,
                })
                .await?;
            episode_count += 1;
        }
    }

    deps.storage
        .documents
        .update_document_status(document_id, "graphiti_ingested")
        .await?;
    deps.retry.mark_stage_complete(document_id, "embedding").await?;

    let mut next_payload = json!({
        "document_id": document_id,
        "deal_id": payload.deal_id,
        "organization_id": organization_id,
    });
    if let Some(user_id) = &payload.user_id {
        next_payload["user_id"] = json!(user_id);
    }
    let next_job_id =
        deps.queue.enqueue(job_names::ANALYZE_DOCUMENT, next_payload, None).await?;

    info!(
        "🕸️  [GRAPH_INGEST]: {} episode(s) ingested for [{}]; analyze job [{}] enqueued.",
        episode_count, document_id, next_job_id
    );

    Ok(json!({
        "success": true,
        "document_id": document_id,
        "episode_count": episode_count,
        "chunks_embedded": chunks.len(),
        "next_job_id": next_job_id,
    }))
}
