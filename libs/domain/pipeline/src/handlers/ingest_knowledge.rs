// [libs/domain/pipeline/src/handlers/ingest_knowledge.rs]
/*!
 * =================================================================
 * APARATO: KNOWLEDGE INGEST HANDLERS (V6.0 - QA / CHAT)
 * CLASIFICACIÓN: DOMAIN HANDLER (ESTRATO L2)
 * RESPONSABILIDAD: PUNTOS DE ENTRADA DIRECTOS AL GRAFO
 *
 * # Logic:
 * Q&A y hechos de chat ingresan directamente al grafo, sin pasar por
 * el parseo documental, con confianza superior a la documental:
 * QA (0.95) > CHAT (0.90) > DOCUMENT (0.85).
 * =================================================================
 */

use crate::deps::Dependencies;
use crate::handlers::StageError;
use acumen_domain_models::payloads::{IngestChatPayload, IngestQaPayload};
use acumen_domain_models::Job;
use acumen_infra_graph::{EpisodeRequest, CHAT_CONFIDENCE, QA_CONFIDENCE};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, instrument};

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

#[instrument(skip(job, deps), fields(job_id = %job.id))]
pub async fn handle_qa(job: &Job, deps: &Dependencies) -> Result<Value, StageError> {
    let started = std::time::Instant::now();

    let payload: IngestQaPayload = serde_json::from_value(job.data.clone())
        .map_err(|e| StageError::InvalidInput(format!("malformed qa payload: {}", e)))?;

    let organization_id =
        deps.storage.tenancy.get_organization_id_for_deal(&payload.deal_id).await?;

    let content = format!("Q: {}\n\nA: {}", payload.question, payload.answer);
    let episode_name = format!("qa-response-{}", short_id(&payload.qa_item_id));

    deps.graph
        .add_episode(EpisodeRequest {
            deal_id: payload.deal_id.clone(),
            organization_id,
            content,
            name: episode_name.clone(),
            source_description: "Q&A response from deal workspace".to_string(),
            reference_time: Utc::now(),
            confidence: QA_CONFIDENCE,
        })
        .await?;

    info!("💬 [QA_INGEST]: Episode [{}] ingested for deal [{}].", episode_name, payload.deal_id);

    Ok(json!({
        "success": true,
        "deal_id": payload.deal_id,
        "qa_item_id": payload.qa_item_id,
        "episode_name": episode_name,
        "episode_count": 1,
        "total_time_ms": started.elapsed().as_millis() as i64,
    }))
}

#[instrument(skip(job, deps), fields(job_id = %job.id))]
pub async fn handle_chat(job: &Job, deps: &Dependencies) -> Result<Value, StageError> {
    let started = std::time::Instant::now();

    let payload: IngestChatPayload = serde_json::from_value(job.data.clone())
        .map_err(|e| StageError::InvalidInput(format!("malformed chat payload: {}", e)))?;

    let organization_id =
        deps.storage.tenancy.get_organization_id_for_deal(&payload.deal_id).await?;

    let episode_name = format!("chat-fact-{}", short_id(&payload.message_id));
    let source_description = payload
        .message_context
        .clone()
        .unwrap_or_else(|| "Chat-sourced fact from deal workspace".to_string());

    deps.graph
        .add_episode(EpisodeRequest {
            deal_id: payload.deal_id.clone(),
            organization_id,
            content: payload.fact_content.clone(),
            name: episode_name.clone(),
            source_description,
            reference_time: Utc::now(),
            confidence: CHAT_CONFIDENCE,
        })
        .await?;

    info!("💬 [CHAT_INGEST]: Episode [{}] ingested for deal [{}].", episode_name, payload.deal_id);

    Ok(json!({
        "success": true,
        "deal_id": payload.deal_id,
        "message_id": payload.message_id,
        "episode_name": episode_name,
        "episode_count": 1,
        "total_time_ms": started.elapsed().as_millis() as i64,
    }))
}
