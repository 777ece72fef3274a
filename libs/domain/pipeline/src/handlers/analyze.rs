// [libs/domain/pipeline/src/handlers/analyze.rs]
/*!
 * =================================================================
 * APARATO: ANALYZE STAGE HANDLER (V12.3 - TYPED + BATCH FALLBACK)
 * CLASIFICACIÓN: DOMAIN HANDLER (ESTRATO L2)
 * RESPONSABILIDAD: EXTRACCIÓN LLM DE HALLAZGOS Y RAMIFICACIÓN
 *
 * # Flujo:
 * nivel por MIME (hojas de cálculo -> PRO) -> modo tipado de una sola
 * llamada con fallback por lotes -> persistencia atómica -> sync
 * best-effort al grafo -> rama financiera (excel o pdf con tablas) ->
 * encolado best-effort de 'detect-contradictions'.
 * =================================================================
 */

use crate::deps::Dependencies;
use crate::handlers::StageError;
use acumen_domain_models::payloads::AnalyzeDocumentPayload;
use acumen_domain_models::{
    job_names, ChunkRecord, FindingDomain, FindingDraft, FindingType, Job,
};
use acumen_infra_db::UsageRecord;
use acumen_infra_graph::FindingSync;
use acumen_infra_llm::{estimate_cost, select_model_tier, LlmError, ModelTier, SPREADSHEET_MIME_TYPES};
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

const ANALYSIS_SYSTEM_PROMPT: &str = "You are an expert M&A due diligence analyst. Extract \
structured findings from document content. A finding is a discrete, verifiable assertion: a \
fact, metric, risk, opportunity, insight or assumption. Always respond with a JSON array only.";

fn extraction_prompt(document_name: &str, chunks: &[ChunkRecord]) -> String {
    let combined: Vec<String> = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "[Chunk {}] (Page {}, Type: {})\n{}",
                i + 1,
                chunk.page_number.map(|p| p.to_string()).unwrap_or_else(|| "N/A".into()),
                chunk.chunk_type.as_str(),
                chunk.content
            )
        })
        .collect();

    format!(
        "Analyze the following document content and extract all relevant findings.\n\n\
         Document: {}\nTotal Chunks: {}\n\nContent:\n{}\n\n\
         Respond with a JSON array in this exact format:\n\
         [\n  {{\"text\": \"the finding text\", \"finding_type\": \"fact|metric|risk|opportunity|insight|assumption\",\n   \
         \"domain\": \"financial|operational|market|legal|technical|general\", \"confidence\": 0.0-1.0,\n   \
         \"source_chunk_index\": 0, \"source_reference\": {{\"page_number\": 1}}}}\n]\n\n\
         'source_chunk_index' is the zero-based index of the chunk the finding came from.",
        document_name,
        chunks.len(),
        combined.join("\n\n---\n\n")
    )
}

/// Extrae el primer arreglo JSON de la respuesta del modelo.
fn parse_findings_response(response_text: &str) -> Result<Vec<Value>, String> {
    let start = response_text.find('[').ok_or("No JSON array found in response")?;
    let end = response_text.rfind(']').ok_or("No JSON array terminator in response")?;
    if end < start {
        return Err("Malformed JSON array bounds".into());
    }

    serde_json::from_str::<Value>(&response_text[start..=end])
        .map_err(|e| format!("JSON decode failed: {}", e))?
        .as_array()
        .cloned()
        .ok_or_else(|| "Response is not a JSON array".to_string())
}

fn finding_from_value(
    raw: &Value,
    deal_id: &str,
    document_id: &str,
    chunks: &[ChunkRecord],
) -> Option<FindingDraft> {
    let text = raw["text"].as_str()?.trim().to_string();
    if text.is_empty() {
        return None;
    }

    let finding_type = raw["finding_type"]
        .as_str()
        .and_then(FindingType::parse)
        .unwrap_or(FindingType::Fact);
    let domain = raw["domain"]
        .as_str()
        .and_then(FindingDomain::parse)
        .unwrap_or(FindingDomain::General);
    let confidence = raw["confidence"].as_f64().unwrap_or(0.5).clamp(0.0, 1.0);

    // Enlace al chunk concreto vía source_chunk_index (cero-based).
    let chunk_id = raw["source_chunk_index"]
        .as_i64()
        .and_then(|idx| usize::try_from(idx).ok())
        .and_then(|idx| chunks.get(idx))
        .map(|chunk| chunk.id.clone());

    let mut metadata = json!({});
    if let Some(reference) = raw.get("source_reference") {
        metadata["source_reference"] = reference.clone();
    }
    if let Some(date_referenced) = raw.get("date_referenced").and_then(Value::as_str) {
        metadata["date_referenced"] = json!(date_referenced);
    }

    Some(FindingDraft {
        deal_id: deal_id.to_string(),
        document_id: document_id.to_string(),
        chunk_id,
        text,
        finding_type,
        domain,
        confidence,
        metadata,
    })
}

#[instrument(skip(job, deps), fields(job_id = %job.id))]
pub async fn handle(job: &Job, deps: &Dependencies) -> Result<Value, StageError> {
    let started = std::time::Instant::now();

    let payload: AnalyzeDocumentPayload = serde_json::from_value(job.data.clone())
        .map_err(|e| StageError::InvalidInput(format!("malformed analyze payload: {}", e)))?;
    let document_id = payload.document_id.clone();

    match run_stage(deps, &payload, started).await {
        Ok(result) => Ok(result),
        Err(stage_error) => {
            error!("❌ [ANALYZE]: Document [{}] failed: {}", document_id, stage_error);
            if let Err(record_error) = deps
                .retry
                .handle_job_failure(&document_id, &stage_error, "analyzing", job.retry_count)
                .await
            {
                error!("⚠️ [ANALYZE]: Failure bookkeeping collapsed: {}", record_error);
            }
            Err(stage_error)
        }
    }
}

async fn run_stage(
    deps: &Dependencies,
    payload: &AnalyzeDocumentPayload,
    started: std::time::Instant,
) -> Result<Value, StageError> {
    let document_id = &payload.document_id;

    if payload.is_retry {
        deps.retry.prepare_stage_retry(document_id, "analyzed").await?;
    } else {
        deps.storage.documents.update_document_status(document_id, "analyzing").await?;
    }
    deps.storage.documents.clear_processing_error(document_id).await?;

    let document = deps
        .storage
        .documents
        .get_document(document_id)
        .await?
        .ok_or_else(|| StageError::InvalidInput(format!("Document not found: {}", document_id)))?;

    let deal_id = payload.deal_id.clone().unwrap_or_else(|| document.deal_id.clone());
    let organization_id = match &payload.organization_id {
        Some(org) => org.clone(),
        None => deps.storage.tenancy.get_organization_id_for_deal(&deal_id).await?,
    };

    let model_tier = select_model_tier(&document.mime_type);
    let is_spreadsheet = SPREADSHEET_MIME_TYPES.contains(&document.mime_type.as_str());
    let is_pdf = document.mime_type.contains("pdf");

    let chunks = deps.storage.chunks.get_chunks_by_document(document_id).await?;

    // Documento vacío: el estatus avanza igualmente.
    if chunks.is_empty() {
        warn!("📭 [ANALYZE]: No chunks for document [{}]; advancing empty.", document_id);
        deps.storage.documents.update_document_status(document_id, "analyzed").await?;
        deps.retry.mark_stage_complete(document_id, "analyzed").await?;

        let next_job_id = if is_spreadsheet {
            Some(enqueue_next(deps, job_names::EXTRACT_FINANCIALS, document_id, &deal_id, payload).await?)
        } else {
            deps.storage.documents.update_document_status(document_id, "complete").await?;
            None
        };

        enqueue_contradictions_best_effort(deps, document_id, &deal_id, payload).await;

        return Ok(json!({
            "success": true,
            "document_id": document_id,
            "findings_count": 0,
            "chunks_analyzed": 0,
            "model_tier": model_tier.as_str(),
            "total_time_ms": started.elapsed().as_millis() as i64,
            "next_job_id": next_job_id,
        }));
    }

    // Extracción: modo tipado de una llamada; lotes como respaldo.
    let (findings, input_tokens, output_tokens, provider_model) =
        extract_findings(deps, &document.name, &deal_id, document_id, &chunks, model_tier).await?;

    let stored_count = if findings.is_empty() {
        deps.storage.documents.update_document_status(document_id, "analyzed").await?;
        0
    } else {
        deps.storage
            .findings
            .store_findings_and_update_status(document_id, &findings, "analyzed")
            .await?
    };

    // Sync best-effort al grafo: el relacional es la fuente de verdad.
    if stored_count > 0 {
        sync_findings_to_graph(deps, document_id, &document.name, &deal_id, &organization_id).await;
    }

    deps.retry.mark_stage_complete(document_id, "analyzed").await?;

    let has_tables = chunks.iter().any(|c| c.chunk_type == acumen_domain_models::ChunkType::Table);

    let next_job_id = if is_spreadsheet || (is_pdf && has_tables) {
        Some(enqueue_next(deps, job_names::EXTRACT_FINANCIALS, document_id, &deal_id, payload).await?)
    } else {
        deps.storage.documents.update_document_status(document_id, "complete").await?;
        None
    };

    enqueue_contradictions_best_effort(deps, document_id, &deal_id, payload).await;

    let elapsed_ms = started.elapsed().as_millis() as i64;
    let (provider, model) = provider_model;
    let estimated_cost_usd = estimate_cost(&provider, &model, input_tokens, output_tokens);

    // Registro de uso: telemetría best-effort, jamás bloquea la etapa.
    let usage_outcome = deps
        .storage
        .usage
        .log_feature_usage(UsageRecord {
            organization_id: Some(organization_id.clone()),
            deal_id: Some(deal_id.clone()),
            user_id: payload.user_id.clone(),
            feature: "document_analysis".into(),
            provider: Some(provider),
            model: Some(model),
            input_tokens,
            output_tokens,
            estimated_cost_usd,
            status: "success".into(),
            duration_ms: elapsed_ms,
            error_message: None,
            metadata: json!({
                "document_id": document_id,
                "findings_count": stored_count,
                "chunks_analyzed": chunks.len(),
                "model_tier": model_tier.as_str(),
            }),
        })
        .await;
    if let Err(usage_error) = usage_outcome {
        warn!("⚠️ [ANALYZE]: Usage bookkeeping failed: {}", usage_error);
    }

    info!(
        "✅ [ANALYZE]: Document [{}] analyzed: {} finding(s), tier [{}].",
        document_id,
        stored_count,
        model_tier.as_str()
    );

    Ok(json!({
        "success": true,
        "document_id": document_id,
        "findings_count": stored_count,
        "chunks_analyzed": chunks.len(),
        "model_tier": model_tier.as_str(),
        "input_tokens": input_tokens,
        "output_tokens": output_tokens,
        "estimated_cost_usd": estimated_cost_usd,
        "total_time_ms": elapsed_ms,
        "next_job_id": next_job_id,
    }))
}

/// Modo tipado (una sola llamada con delimitadores de chunk) con
/// respaldo por lotes cuando la respuesta única no es interpretable.
async fn extract_findings(
    deps: &Dependencies,
    document_name: &str,
    deal_id: &str,
    document_id: &str,
    chunks: &[ChunkRecord],
    model_tier: ModelTier,
) -> Result<(Vec<FindingDraft>, i64, i64, (String, String)), StageError> {
    let prompt = extraction_prompt(document_name, chunks);

    match deps.language_model.run(&prompt, Some(ANALYSIS_SYSTEM_PROMPT), model_tier).await {
        Ok((response_text, usage)) => match parse_findings_response(&response_text) {
            Ok(raw_findings) => {
                let findings: Vec<FindingDraft> = raw_findings
                    .iter()
                    .filter_map(|raw| finding_from_value(raw, deal_id, document_id, chunks))
                    .collect();
                return Ok((
                    findings,
                    usage.input_tokens,
                    usage.output_tokens,
                    (usage.provider, usage.model),
                ));
            }
            Err(parse_error) => {
                warn!(
                    "🔀 [ANALYZE]: Typed-mode response unparseable ({}); engaging batch fallback.",
                    parse_error
                );
            }
        },
        Err(llm_error) if llm_error.is_retryable() => return Err(StageError::Llm(llm_error)),
        Err(llm_error) => {
            warn!(
                "🔀 [ANALYZE]: Typed-mode call failed ({}); engaging batch fallback.",
                llm_error
            );
        }
    }

    // Respaldo: lotes de N chunks, una llamada por lote. Un lote
    // ilegible se registra y no tumba el documento completo.
    let batch_size = deps.config.llm_analysis_batch_size.max(1);
    let mut findings: Vec<FindingDraft> = Vec::new();
    let mut total_input = 0i64;
    let mut total_output = 0i64;
    let mut provider_model = ("gemini".to_string(), String::new());
    let mut failed_batches = 0usize;

    for (batch_idx, batch) in chunks.chunks(batch_size).enumerate() {
        let batch_prompt = extraction_prompt(document_name, batch);

        match deps.language_model.run(&batch_prompt, Some(ANALYSIS_SYSTEM_PROMPT), model_tier).await
        {
            Ok((response_text, usage)) => {
                total_input += usage.input_tokens;
                total_output += usage.output_tokens;
                provider_model = (usage.provider, usage.model);

                match parse_findings_response(&response_text) {
                    Ok(raw_findings) => {
                        findings.extend(raw_findings.iter().filter_map(|raw| {
                            finding_from_value(raw, deal_id, document_id, batch)
                        }));
                    }
                    Err(parse_error) => {
                        warn!(batch_idx, "Batch analysis failed (parse error): {}", parse_error);
                        failed_batches += 1;
                    }
                }
            }
            Err(llm_error) if llm_error.is_retryable() => return Err(StageError::Llm(llm_error)),
            Err(llm_error) => {
                warn!(batch_idx, "Batch analysis failed (non-retryable): {}", llm_error);
                failed_batches += 1;
            }
        }
    }

    if failed_batches > 0 && findings.is_empty() && total_input == 0 {
        return Err(StageError::Llm(LlmError::InvalidResponse(
            "all analysis batches failed".into(),
        )));
    }

    Ok((findings, total_input, total_output, provider_model))
}

async fn sync_findings_to_graph(
    deps: &Dependencies,
    document_id: &str,
    document_name: &str,
    deal_id: &str,
    organization_id: &str,
) {
    let stored = match deps.storage.findings.get_findings_by_document(document_id).await {
        Ok(findings) => findings,
        Err(e) => {
            warn!("⚠️ [ANALYZE]: Graph sync skipped, findings unreadable: {}", e);
            return;
        }
    };

    for finding in &stored {
        let sync = FindingSync {
            finding_id: finding.id.clone(),
            document_id: document_id.to_string(),
            document_name: document_name.to_string(),
            text: finding.text.clone(),
            finding_type: finding.finding_type.as_str().to_string(),
            domain: finding.domain.as_str().to_string(),
            confidence: finding.confidence,
            date_referenced: finding.metadata["date_referenced"]
                .as_str()
                .map(str::to_string),
        };

        if let Err(graph_error) = deps.graph.sync_finding(deal_id, organization_id, &sync).await {
            warn!(
                "⚠️ [ANALYZE]: Graph sync failed for finding [{}]: {}",
                finding.id, graph_error
            );
        }
    }

    info!("🕸️  [ANALYZE]: {} finding(s) synced to graph (best-effort).", stored.len());
}

async fn enqueue_next(
    deps: &Dependencies,
    job_name: &str,
    document_id: &str,
    deal_id: &str,
    payload: &AnalyzeDocumentPayload,
) -> Result<String, StageError> {
    let mut next_payload = json!({ "document_id": document_id, "deal_id": deal_id });
    if let Some(user_id) = &payload.user_id {
        next_payload["user_id"] = json!(user_id);
    }
    Ok(deps.queue.enqueue(job_name, next_payload, None).await?)
}

/// Encolado best-effort: su fallo se registra y no tumba la etapa.
async fn enqueue_contradictions_best_effort(
    deps: &Dependencies,
    document_id: &str,
    deal_id: &str,
    payload: &AnalyzeDocumentPayload,
) {
    let mut contradiction_payload = json!({ "deal_id": deal_id, "document_id": document_id });
    if let Some(user_id) = &payload.user_id {
        contradiction_payload["user_id"] = json!(user_id);
    }

    match deps.queue.enqueue(job_names::DETECT_CONTRADICTIONS, contradiction_payload, None).await {
        Ok(job_id) => {
            info!("📨 [ANALYZE]: Enqueued detect-contradictions as [{}].", job_id);
        }
        Err(enqueue_error) => {
            warn!(
                "⚠️ [ANALYZE]: Failed to enqueue detect-contradictions for deal [{}]: {}",
                deal_id, enqueue_error
            );
        }
    }
}
