// [libs/domain/pipeline/src/handlers/detect_contradictions.rs]
/*!
 * =================================================================
 * APARATO: CONTRADICTION STAGE HANDLER (V9.1 - DEAL WIDE)
 * CLASIFICACIÓN: DOMAIN HANDLER (ESTRATO L2)
 * RESPONSABILIDAD: PARES PRE-FILTRADOS -> LLM -> SET DEDUPLICADO
 *
 * # Flujo:
 * hallazgos no rechazados -> agrupación por dominio (tope 100 por
 * confianza) -> pares no ordenados con pre-filtros (texto idéntico,
 * mismo chunk, date_referenced divergente) -> comparación por lotes ->
 * persistencia con deduplicación por par no ordenado.
 *
 * Puede correr concurrentemente para el mismo deal; el tratamiento de
 * conjunto (dedupe antes del insert) mantiene el invariante.
 * =================================================================
 */

use crate::contradiction::ContradictionDetector;
use crate::deps::Dependencies;
use crate::handlers::StageError;
use acumen_domain_models::payloads::DetectContradictionsPayload;
use acumen_domain_models::{Finding, FindingDomain, Job};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{error, info, instrument, warn};

/// Tope de hallazgos por dominio, por descendente de confianza.
pub const MAX_FINDINGS_PER_DOMAIN: usize = 100;

#[instrument(skip(job, deps), fields(job_id = %job.id))]
pub async fn handle(job: &Job, deps: &Dependencies) -> Result<Value, StageError> {
    let started = std::time::Instant::now();

    let payload: DetectContradictionsPayload = serde_json::from_value(job.data.clone())
        .map_err(|e| StageError::InvalidInput(format!("malformed contradictions payload: {}", e)))?;

    match run_stage(deps, &payload).await {
        Ok(mut result) => {
            result["total_time_ms"] = json!(started.elapsed().as_millis() as i64);
            Ok(result)
        }
        Err(stage_error) => {
            error!(
                "❌ [CONTRADICTIONS]: Deal [{}] failed: {}",
                payload.deal_id, stage_error
            );
            // Contabilidad de retry solo si el disparador fue un documento.
            if let Some(document_id) = &payload.document_id {
                if let Err(record_error) = deps
                    .retry
                    .handle_job_failure(
                        document_id,
                        &stage_error,
                        "contradiction_detection",
                        job.retry_count,
                    )
                    .await
                {
                    error!("⚠️ [CONTRADICTIONS]: Failure bookkeeping collapsed: {}", record_error);
                }
            }
            Err(stage_error)
        }
    }
}

async fn run_stage(
    deps: &Dependencies,
    payload: &DetectContradictionsPayload,
) -> Result<Value, StageError> {
    let deal_id = &payload.deal_id;

    if payload.is_retry {
        if let Some(document_id) = &payload.document_id {
            deps.storage.documents.clear_processing_error(document_id).await?;
        }
    }

    // Paso 1: hallazgos del deal, filtrando los rechazados.
    let findings = deps.storage.findings.get_findings_by_deal(deal_id).await?;
    let active: Vec<&Finding> =
        findings.iter().filter(|f| f.status != "rejected").collect();

    if active.is_empty() {
        info!("⚖️  [CONTRADICTIONS]: No findings to compare for deal [{}].", deal_id);
        return Ok(json!({
            "success": true,
            "deal_id": deal_id,
            "findings_count": 0,
            "comparisons_made": 0,
            "contradictions_found": 0,
        }));
    }

    // Paso 2: agrupación por dominio con tope por confianza.
    let mut domain_groups: HashMap<FindingDomain, Vec<&Finding>> = HashMap::new();
    for finding in &active {
        domain_groups.entry(finding.domain).or_default().push(*finding);
    }

    for group in domain_groups.values_mut() {
        if group.len() > MAX_FINDINGS_PER_DOMAIN {
            group.sort_by(|a, b| {
                b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal)
            });
            group.truncate(MAX_FINDINGS_PER_DOMAIN);
        }
    }

    // Paso 3: pares no ordenados con pre-filtros.
    let all_pairs = generate_comparison_pairs(&domain_groups);

    if all_pairs.is_empty() {
        info!("⚖️  [CONTRADICTIONS]: No pairs left after pre-filtering for [{}].", deal_id);
        return Ok(json!({
            "success": true,
            "deal_id": deal_id,
            "findings_count": active.len(),
            "comparisons_made": 0,
            "contradictions_found": 0,
        }));
    }

    // Paso 4: comparación LLM por lotes (secuencial dentro del deal).
    let detector = ContradictionDetector::new(deps.language_model.clone());
    let comparison = detector
        .compare_batch(&all_pairs, deps.config.contradiction_batch_size)
        .await
        .map_err(StageError::Llm)?;

    // Paso 5: persistencia con deduplicación por par no ordenado.
    let mut stored_count = 0usize;
    for contradiction in comparison.contradictions_found() {
        match deps
            .storage
            .contradictions
            .store_contradiction(
                deal_id,
                &contradiction.finding_a_id,
                &contradiction.finding_b_id,
                contradiction.confidence,
                &contradiction.reason,
            )
            .await
        {
            Ok(true) => stored_count += 1,
            Ok(false) => {
                info!(
                    "⚖️  [CONTRADICTIONS]: Pair {{{}, {}}} already recorded; skipping.",
                    contradiction.finding_a_id, contradiction.finding_b_id
                );
            }
            Err(store_error) => {
                warn!(
                    "⚠️ [CONTRADICTIONS]: Failed to store pair {{{}, {}}}: {}",
                    contradiction.finding_a_id, contradiction.finding_b_id, store_error
                );
            }
        }
    }

    info!(
        "⚖️  [CONTRADICTIONS]: Deal [{}]: {} comparison(s), {} stored.",
        deal_id,
        comparison.comparisons.len(),
        stored_count
    );

    Ok(json!({
        "success": true,
        "deal_id": deal_id,
        "document_id": payload.document_id,
        "findings_count": active.len(),
        "comparisons_made": comparison.comparisons.len(),
        "contradictions_found": stored_count,
        "contradictions_below_threshold": comparison.contradictions_below_threshold().len(),
        "failed_comparisons": comparison.failed_comparisons.len(),
        "input_tokens": comparison.total_input_tokens,
        "output_tokens": comparison.total_output_tokens,
    }))
}

/// Pares dentro de cada dominio, descartando por los pre-filtros:
/// texto normalizado idéntico, mismo chunk de origen, y
/// date_referenced ambos presentes pero distintos.
fn generate_comparison_pairs<'a>(
    domain_groups: &HashMap<FindingDomain, Vec<&'a Finding>>,
) -> Vec<(&'a Finding, &'a Finding)> {
    let mut pairs = Vec::new();

    for group in domain_groups.values() {
        for (i, finding_a) in group.iter().enumerate() {
            for finding_b in group.iter().skip(i + 1) {
                let text_a = finding_a.text.trim();
                let text_b = finding_b.text.trim();
                if text_a == text_b {
                    continue;
                }

                if let (Some(chunk_a), Some(chunk_b)) =
                    (&finding_a.chunk_id, &finding_b.chunk_id)
                {
                    if chunk_a == chunk_b {
                        continue;
                    }
                }

                let date_a = finding_a.metadata["date_referenced"].as_str();
                let date_b = finding_b.metadata["date_referenced"].as_str();
                if let (Some(date_a), Some(date_b)) = (date_a, date_b) {
                    if date_a != date_b {
                        continue;
                    }
                }

                pairs.push((*finding_a, *finding_b));
            }
        }
    }

    pairs
}
