// [libs/domain/models/src/feedback.rs]
// =================================================================
// APARATO: FEEDBACK ANALYTICS MODELS (V2.3)
// RESPONSABILIDAD: FORMAS DEL ANÁLISIS PERIÓDICO DE RETROALIMENTACIÓN
// =================================================================

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Estadística agregada de un dominio dentro de la ventana analizada.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainStats {
    pub domain: String,
    pub finding_count: i64,
    pub correction_count: i64,
    pub validation_count: i64,
    pub rejection_count: i64,
    pub average_confidence: f64,
    pub rejection_rate: f64,
}

/// Patrón conductual detectado sobre el feedback.
/// pattern_type ∈ {domain_bias, confidence_drift, source_quality,
/// extraction_error}; severity ∈ {low, medium, high}.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackPattern {
    pub pattern_type: String,
    pub description: String,
    pub affected_count: i64,
    pub severity: String,
    pub recommendation: String,
}

/// Recomendación accionable emitida por el analizador.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    #[serde(rename = "type")]
    pub recommendation_type: String,
    pub priority: String,
    pub title: String,
    pub description: String,
    pub actionable: bool,
    pub auto_applicable: bool,
}

/// Ajuste propuesto al umbral de confianza de un dominio.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceAdjustment {
    pub domain: String,
    pub current_threshold: f64,
    pub recommended_threshold: f64,
    pub reason: String,
    pub based_on_sample_size: i64,
    pub statistical_confidence: f64,
}

/// Resumen completo de una corrida de análisis, persistido como JSON
/// en 'feedback_analytics.summary'.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub deal_id: String,
    pub analysis_date: String,
    pub period_start: String,
    pub period_end: String,
    pub total_findings: i64,
    pub total_corrections: i64,
    pub total_validations: i64,
    pub total_rejections: i64,
    pub patterns: Vec<FeedbackPattern>,
    pub domain_stats: Vec<DomainStats>,
    pub recommendations: Vec<Recommendation>,
    pub confidence_adjustments: Vec<ConfidenceAdjustment>,
}
