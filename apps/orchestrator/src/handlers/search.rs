// [apps/orchestrator/src/handlers/search.rs]
/*!
 * =================================================================
 * APARATO: SIMILARITY SEARCH HANDLER (V6.2)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GET /api/search/similar SOBRE EMBEDDINGS DE CHUNKS
 *
 * # Contrato:
 * query ausente o en blanco -> 422. Fallo de embeddings o del Ledger
 * -> 503. La similitud es coseno entre el embedding de la consulta y
 * los embeddings almacenados, acotada por deal/documento.
 * =================================================================
 */

use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, instrument};

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;
const PREVIEW_LENGTH: usize = 200;

#[derive(Debug, Deserialize)]
pub struct SimilarSearchParams {
    #[serde(default)]
    pub query: Option<String>,
    /// Alias histórico del deal.
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SimilarChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub document_name: String,
    pub project_id: String,
    pub content_preview: String,
    pub chunk_type: String,
    pub page_number: Option<i64>,
    pub chunk_index: i64,
    pub similarity: f64,
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[instrument(skip(application_state, params))]
pub async fn handle_similar_search(
    State(application_state): State<AppState>,
    Query(params): Query<SimilarSearchParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(query_text) = params.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    else {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "query parameter is required and must not be blank" })),
        ));
    };

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let (vectors, _usage) = application_state
        .embeddings
        .embed(&[query_text.to_string()])
        .await
        .map_err(|e| {
            error!("❌ [SEARCH]: Query embedding failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "embedding service unavailable" })),
            )
        })?;
    let query_vector = vectors.into_iter().next().unwrap_or_default();

    let candidates = application_state
        .storage
        .chunks
        .get_embedded_chunks(params.project_id.as_deref(), params.document_id.as_deref())
        .await
        .map_err(|e| {
            error!("❌ [SEARCH]: Candidate fetch failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "search backend unavailable" })),
            )
        })?;

    let mut scored: Vec<SimilarChunk> = candidates
        .into_iter()
        .filter_map(|(chunk, document_name, deal_id)| {
            let embedding = chunk.embedding.as_ref()?;
            let similarity = cosine_similarity(&query_vector, embedding);

            let mut preview = chunk.content.clone();
            if preview.len() > PREVIEW_LENGTH {
                let mut cut = PREVIEW_LENGTH;
                while cut > 0 && !preview.is_char_boundary(cut) {
                    cut -= 1;
                }
                preview.truncate(cut);
                preview.push('…');
            }

            Some(SimilarChunk {
                chunk_id: chunk.id,
                document_id: chunk.document_id,
                document_name,
                project_id: deal_id,
                content_preview: preview,
                chunk_type: chunk.chunk_type.as_str().to_string(),
                page_number: chunk.page_number,
                chunk_index: chunk.chunk_index,
                similarity: similarity.max(0.0),
            })
        })
        .collect();

    scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);

    let total_results = scored.len();
    Ok(Json(json!({ "results": scored, "total_results": total_results })))
}
