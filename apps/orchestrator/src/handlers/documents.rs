// [apps/orchestrator/src/handlers/documents.rs]
/*!
 * =================================================================
 * APARATO: DOCUMENT LIFECYCLE HANDLERS (V6.0)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO DE DOCUMENTOS Y PROTOCOLO DE RETRY MANUAL
 * =================================================================
 */

use crate::state::AppState;
use acumen_domain_models::job_names;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument};

#[derive(Debug, Deserialize)]
pub struct RegisterDocumentRequest {
    pub deal_id: String,
    pub name: String,
    pub blob_reference: String,
    pub mime_type: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

fn storage_fault(context: &str, error: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    error!("❌ [DOCUMENTS_API]: {}: {}", context, error);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "storage failure" })))
}

/// Registra el documento subido y enciende el pipeline con parse.
#[instrument(skip(application_state, request), fields(deal_id = %request.deal_id))]
pub async fn handle_register_document(
    State(application_state): State<AppState>,
    Json(request): Json<RegisterDocumentRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let deal = application_state
        .storage
        .tenancy
        .get_deal(&request.deal_id)
        .await
        .map_err(|e| storage_fault("deal lookup failed", e))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(json!({ "error": "deal not found" }))))?;

    let document_id = application_state
        .storage
        .documents
        .create_document(&deal.id, &request.name, &request.blob_reference, &request.mime_type)
        .await
        .map_err(|e| storage_fault("document registration failed", e))?;

    let mut payload = json!({
        "document_id": document_id,
        "gcs_path": request.blob_reference,
        "file_type": request.mime_type,
        "deal_id": deal.id,
        "file_name": request.name,
    });
    if let Some(user_id) = &request.user_id {
        payload["user_id"] = json!(user_id);
    }

    let job_id = application_state
        .queue
        .enqueue(job_names::PARSE_DOCUMENT, payload, None)
        .await
        .map_err(|e| storage_fault("parse enqueue failed", e))?;

    info!("📄 [DOCUMENTS_API]: Document [{}] registered; parse job [{}].", document_id, job_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "document_id": document_id, "job_id": job_id })),
    ))
}

/// Protocolo de retry manual: cota total + enfriamiento + etapa
/// siguiente derivada del cursor fino.
#[instrument(skip(application_state))]
pub async fn handle_manual_retry(
    State(application_state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let document = application_state
        .storage
        .documents
        .get_document(&document_id)
        .await
        .map_err(|e| storage_fault("document lookup failed", e))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(json!({ "error": "document not found" }))))?;

    let (allowed, denial_reason) = application_state
        .retry
        .can_manual_retry(&document_id)
        .await
        .map_err(|e| storage_fault("retry gate failed", e))?;

    if !allowed {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "allowed": false, "reason": denial_reason })),
        ));
    }

    let next_stage = application_state
        .retry
        .get_next_retry_stage(&document_id)
        .await
        .map_err(|e| storage_fault("next stage resolution failed", e))?;

    let Some(stage) = next_stage else {
        return Err((
            StatusCode::CONFLICT,
            Json(json!({ "allowed": false, "reason": "document already complete" })),
        ));
    };

    application_state
        .retry
        .prepare_stage_retry(&document_id, &stage)
        .await
        .map_err(|e| storage_fault("stage preparation failed", e))?;

    let job_id = application_state
        .retry
        .enqueue_stage_retry(&document_id, &stage, Some(&document.deal_id), None)
        .await
        .map_err(|e| storage_fault("retry enqueue failed", e))?;

    info!("🔁 [DOCUMENTS_API]: Manual retry of [{}] at stage [{}].", document_id, stage);

    Ok(Json(json!({ "allowed": true, "stage": stage, "job_id": job_id })))
}

/// Conteos por (nombre, estado) del Ledger de trabajos.
pub async fn handle_queue_counts(
    State(application_state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let counts = application_state
        .queue
        .queue_counts()
        .await
        .map_err(|e| storage_fault("queue counts failed", e))?;

    Ok(Json(json!({ "queues": counts })))
}
