// [apps/orchestrator/src/handlers/graph_ingest.rs]
/*!
 * =================================================================
 * APARATO: MANUAL GRAPH INGEST HANDLER (V5.1)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: POST /api/graphiti/ingest
 *
 * # Contrato:
 * content < 10 chars o source_type inválido -> 422. Deal inexistente
 * -> 404. Fallo del servicio de grafo -> 500.
 * =================================================================
 */

use crate::state::AppState;
use acumen_infra_graph::{EpisodeRequest, CHAT_CONFIDENCE, QA_CONFIDENCE};
use acumen_infra_llm::estimate_cost;
use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument};
use uuid::Uuid;

const MIN_CONTENT_LENGTH: usize = 10;
const VALID_SOURCE_TYPES: &[&str] = &["correction", "confirmation", "new_info"];

#[derive(Debug, Deserialize)]
pub struct GraphIngestRequest {
    pub deal_id: String,
    pub content: String,
    pub source_type: String,
    #[serde(default)]
    pub message_context: Option<String>,
}

#[instrument(skip(application_state, request), fields(deal_id = %request.deal_id))]
pub async fn handle_graph_ingest(
    State(application_state): State<AppState>,
    Json(request): Json<GraphIngestRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let started = std::time::Instant::now();

    if request.content.trim().len() < MIN_CONTENT_LENGTH {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "content must be at least 10 characters" })),
        ));
    }
    if !VALID_SOURCE_TYPES.contains(&request.source_type.as_str()) {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": "source_type must be one of: correction, confirmation, new_info"
            })),
        ));
    }

    let deal = application_state
        .storage
        .tenancy
        .get_deal(&request.deal_id)
        .await
        .map_err(|e| {
            error!("❌ [GRAPH_INGEST_API]: Deal lookup failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "storage failure" })))
        })?
        .ok_or_else(|| {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "deal not found" })))
        })?;

    // Correcciones confirmadas por humanos pesan como Q&A; el resto
    // entra al nivel de confianza de chat.
    let confidence = if request.source_type == "correction" {
        QA_CONFIDENCE
    } else {
        CHAT_CONFIDENCE
    };

    let episode_name = format!(
        "manual-{}-{}",
        request.source_type,
        Uuid::new_v4().to_string().chars().take(8).collect::<String>()
    );

    application_state
        .graph
        .add_episode(EpisodeRequest {
            deal_id: deal.id.clone(),
            organization_id: deal.organization_id.clone(),
            content: request.content.clone(),
            name: episode_name.clone(),
            source_description: request
                .message_context
                .clone()
                .unwrap_or_else(|| format!("Manual {} via API", request.source_type)),
            reference_time: Utc::now(),
            confidence,
        })
        .await
        .map_err(|e| {
            error!("❌ [GRAPH_INGEST_API]: Episode ingestion failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "knowledge graph ingestion failed" })),
            )
        })?;

    let estimated_tokens = (request.content.len() / 4) as i64;
    let estimated_cost_usd = estimate_cost("voyage", "voyage-3.5", estimated_tokens, 0);

    info!("🕸️  [GRAPH_INGEST_API]: Episode [{}] ingested for deal [{}].", episode_name, deal.id);

    Ok(Json(json!({
        "success": true,
        "episode_count": 1,
        "elapsed_ms": started.elapsed().as_millis() as i64,
        "estimated_cost_usd": estimated_cost_usd,
    })))
}
