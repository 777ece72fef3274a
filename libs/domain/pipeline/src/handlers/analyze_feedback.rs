// [libs/domain/pipeline/src/handlers/analyze_feedback.rs]
/*!
 * =================================================================
 * APARATO: FEEDBACK ANALYSIS HANDLERS (V7.0 - WINDOWED)
 * CLASIFICACIÓN: DOMAIN HANDLER (ESTRATO L2)
 * RESPONSABILIDAD: ANALÍTICA PERIÓDICA POR DEAL Y FAN-OUT GLOBAL
 *
 * # Flujo:
 * analyze-feedback: ventana -> stats por dominio -> patrones ->
 * recomendaciones -> ajustes de umbral -> upsert (deal, fecha).
 * analyze-feedback-all: un trabajo por deal con actividad de feedback.
 * =================================================================
 */

use crate::deps::Dependencies;
use crate::feedback::FeedbackAnalyzer;
use crate::handlers::StageError;
use acumen_domain_models::payloads::{AnalyzeFeedbackAllPayload, AnalyzeFeedbackPayload};
use acumen_domain_models::{job_names, FeedbackSummary, Job};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

#[instrument(skip(job, deps), fields(job_id = %job.id))]
pub async fn handle(job: &Job, deps: &Dependencies) -> Result<Value, StageError> {
    let started = std::time::Instant::now();

    let payload: AnalyzeFeedbackPayload = serde_json::from_value(job.data.clone())
        .map_err(|e| StageError::InvalidInput(format!("malformed feedback payload: {}", e)))?;

    let deal_id = payload.deal_id.clone();
    let period_end = Utc::now();
    let period_start = period_end - Duration::days(payload.period_days.max(1));

    let analyzer = FeedbackAnalyzer::new();

    // 1. Hallazgos del deal.
    let findings = deps.storage.findings.get_findings_by_deal(&deal_id).await?;

    if findings.is_empty() {
        info!("📊 [FEEDBACK]: No findings for deal [{}]; storing empty summary.", deal_id);
        let summary = empty_summary(&deal_id, &period_start.to_rfc3339(), &period_end.to_rfc3339());
        store_summary(deps, &summary, &payload.analysis_type).await;
        return Ok(json!({
            "success": true,
            "summary": summary,
            "processing_time_ms": started.elapsed().as_millis() as i64,
        }));
    }

    // 2-3. Correcciones y veredictos dentro de la ventana.
    let corrections =
        deps.storage.feedback.get_corrections_in_window(&deal_id, period_start, period_end).await?;
    let validations =
        deps.storage.feedback.get_validations_in_window(&deal_id, period_start, period_end).await?;

    // 4. Estadística por dominio.
    let domain_stats = analyzer.calculate_domain_stats(&findings, &corrections, &validations);

    // 5. Patrones.
    let patterns = if payload.include_pattern_detection {
        analyzer.detect_patterns(&corrections, &domain_stats)
    } else {
        Vec::new()
    };

    // 6. Recomendaciones.
    let recommendations = analyzer.generate_recommendations(&domain_stats, &patterns);

    // 7. Ajustes de umbral con overrides del deal.
    let confidence_adjustments = if payload.include_confidence_adjustments {
        let mut overrides: HashMap<String, f64> = HashMap::new();
        for stats in &domain_stats {
            if let Some(threshold) =
                deps.storage.feedback.get_confidence_threshold(&deal_id, &stats.domain).await?
            {
                overrides.insert(stats.domain.clone(), threshold);
            }
        }
        analyzer.calculate_confidence_adjustments(&domain_stats, &overrides)
    } else {
        Vec::new()
    };

    let total_validations =
        validations.iter().filter(|v| v.action == "validate").count() as i64;
    let total_rejections = validations.iter().filter(|v| v.action == "reject").count() as i64;

    let summary = FeedbackSummary {
        deal_id: deal_id.clone(),
        analysis_date: Utc::now().to_rfc3339(),
        period_start: period_start.to_rfc3339(),
        period_end: period_end.to_rfc3339(),
        total_findings: findings.len() as i64,
        total_corrections: corrections.len() as i64,
        total_validations,
        total_rejections,
        patterns,
        domain_stats,
        recommendations,
        confidence_adjustments,
    };

    // 8. Upsert por (deal, fecha de análisis).
    store_summary(deps, &summary, &payload.analysis_type).await;

    let processing_time_ms = started.elapsed().as_millis() as i64;
    info!(
        "📊 [FEEDBACK]: Deal [{}]: {} finding(s), {} pattern(s), {} ms.",
        deal_id,
        summary.total_findings,
        summary.patterns.len(),
        processing_time_ms
    );

    Ok(json!({
        "success": true,
        "summary": summary,
        "processing_time_ms": processing_time_ms,
    }))
}

/// Fan-out semanal: un trabajo por deal con actividad en la ventana.
#[instrument(skip(job, deps), fields(job_id = %job.id))]
pub async fn handle_all(job: &Job, deps: &Dependencies) -> Result<Value, StageError> {
    let payload: AnalyzeFeedbackAllPayload = serde_json::from_value(job.data.clone())
        .map_err(|e| StageError::InvalidInput(format!("malformed feedback-all payload: {}", e)))?;

    let period_start = Utc::now() - Duration::days(payload.period_days.max(1));

    let deal_ids =
        deps.storage.feedback.get_deals_with_feedback_activity(period_start).await?;

    info!("📊 [FEEDBACK_ALL]: Fanning out to {} deal(s).", deal_ids.len());

    let mut enqueued = 0usize;
    let mut errors = 0usize;
    for deal_id in &deal_ids {
        let child_payload = json!({
            "deal_id": deal_id,
            "period_days": payload.period_days,
        });
        match deps.queue.enqueue(job_names::ANALYZE_FEEDBACK, child_payload, None).await {
            Ok(_) => enqueued += 1,
            Err(enqueue_error) => {
                warn!("⚠️ [FEEDBACK_ALL]: Enqueue failed for deal [{}]: {}", deal_id, enqueue_error);
                errors += 1;
            }
        }
    }

    Ok(json!({
        "success": errors == 0,
        "total_deals": deal_ids.len(),
        "enqueued": enqueued,
        "errors": errors,
    }))
}

fn empty_summary(deal_id: &str, period_start: &str, period_end: &str) -> FeedbackSummary {
    FeedbackSummary {
        deal_id: deal_id.to_string(),
        analysis_date: Utc::now().to_rfc3339(),
        period_start: period_start.to_string(),
        period_end: period_end.to_string(),
        total_findings: 0,
        total_corrections: 0,
        total_validations: 0,
        total_rejections: 0,
        patterns: Vec::new(),
        domain_stats: Vec::new(),
        recommendations: Vec::new(),
        confidence_adjustments: Vec::new(),
    }
}

/// Persistencia best-effort del resumen; un fallo no tumba el análisis.
async fn store_summary(deps: &Dependencies, summary: &FeedbackSummary, analysis_type: &str) {
    let analysis_date = Utc::now().format("%Y-%m-%d").to_string();
    let summary_json = serde_json::to_string(summary).unwrap_or_else(|_| "{}".into());

    let outcome = deps
        .storage
        .feedback
        .upsert_analytics(
            &summary.deal_id,
            &analysis_date,
            &summary.period_start,
            &summary.period_end,
            analysis_type,
            &summary_json,
            (
                summary.total_findings,
                summary.total_corrections,
                summary.total_validations,
                summary.total_rejections,
            ),
            summary.patterns.len() as i64,
            summary.recommendations.len() as i64,
        )
        .await;

    if let Err(store_error) = outcome {
        warn!("⚠️ [FEEDBACK]: Failed to store analysis result: {}", store_error);
    }
}
