// [libs/domain/pipeline/src/feedback.rs]
/*!
 * =================================================================
 * APARATO: FEEDBACK ANALYZER (V6.0 - PATTERN MINING)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: ESTADÍSTICA POR DOMINIO, PATRONES Y AJUSTES
 *
 * # Logic:
 * Patrones detectados: domain_bias (rechazo alto), confidence_drift
 * (corrección alta con rechazo bajo), source_quality (correcciones de
 * fuente) y extraction_error (correcciones de valor). La muestra
 * mínima por patrón es 10; los umbrales de rechazo y corrección son
 * 0.30 y 0.20.
 * =================================================================
 */

use acumen_domain_models::{
    ConfidenceAdjustment, DomainStats, FeedbackPattern, Finding, Recommendation,
};
use acumen_infra_db::{CorrectionRow, ValidationRow};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub const MIN_SAMPLE_SIZE: i64 = 10;
pub const REJECTION_RATE_THRESHOLD: f64 = 0.30;
pub const CORRECTION_RATE_THRESHOLD: f64 = 0.20;

/// Umbral de confianza por defecto de cada dominio.
pub fn default_threshold(domain: &str) -> f64 {
    match domain {
        "financial" | "legal" => 0.70,
        "operational" | "technical" => 0.60,
        "market" => 0.55,
        _ => 0.50,
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Default, Clone)]
pub struct FeedbackAnalyzer;

impl FeedbackAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Estadística agregada por dominio dentro de la ventana.
    pub fn calculate_domain_stats(
        &self,
        findings: &[Finding],
        corrections: &[CorrectionRow],
        validations: &[ValidationRow],
    ) -> Vec<DomainStats> {
        struct Accumulator {
            finding_ids: HashSet<String>,
            confidences: Vec<f64>,
            correction_count: i64,
            validation_count: i64,
            rejection_count: i64,
        }

        let mut by_domain: HashMap<String, Accumulator> = HashMap::new();

        for finding in findings {
            let entry = by_domain.entry(finding.domain.as_str().to_string()).or_insert_with(|| {
                Accumulator {
                    finding_ids: HashSet::new(),
                    confidences: Vec::new(),
                    correction_count: 0,
                    validation_count: 0,
                    rejection_count: 0,
                }
            });
            entry.finding_ids.insert(finding.id.clone());
            entry.confidences.push(finding.confidence);
        }

        for correction in corrections {
            for accumulator in by_domain.values_mut() {
                if accumulator.finding_ids.contains(&correction.finding_id) {
                    accumulator.correction_count += 1;
                    break;
                }
            }
        }

        for validation in validations {
            for accumulator in by_domain.values_mut() {
                if accumulator.finding_ids.contains(&validation.finding_id) {
                    match validation.action.as_str() {
                        "validate" => accumulator.validation_count += 1,
                        "reject" => accumulator.rejection_count += 1,
                        _ => {}
                    }
                    break;
                }
            }
        }

        let mut stats: Vec<DomainStats> = by_domain
            .into_iter()
            .map(|(domain, acc)| {
                let total_feedback = acc.validation_count + acc.rejection_count;
                let average_confidence = if acc.confidences.is_empty() {
                    0.5
                } else {
                    acc.confidences.iter().sum::<f64>() / acc.confidences.len() as f64
                };
                let rejection_rate = if total_feedback > 0 {
                    acc.rejection_count as f64 / total_feedback as f64
                } else {
                    0.0
                };

                DomainStats {
                    domain,
                    finding_count: acc.finding_ids.len() as i64,
                    correction_count: acc.correction_count,
                    validation_count: acc.validation_count,
                    rejection_count: acc.rejection_count,
                    average_confidence: round3(average_confidence),
                    rejection_rate: round3(rejection_rate),
                }
            })
            .collect();

        stats.sort_by(|a, b| a.domain.cmp(&b.domain));
        stats
    }

    /// Minería de patrones sobre la estadística y las correcciones.
    pub fn detect_patterns(
        &self,
        corrections: &[CorrectionRow],
        domain_stats: &[DomainStats],
    ) -> Vec<FeedbackPattern> {
        let mut patterns = Vec::new();

        // Patrón 1: sesgo de dominio (rechazo alto).
        for stats in domain_stats {
            if stats.finding_count >= MIN_SAMPLE_SIZE
                && stats.rejection_rate > REJECTION_RATE_THRESHOLD
            {
                let severity = if stats.rejection_rate > 0.5 {
                    "high"
                } else if stats.rejection_rate > 0.3 {
                    "medium"
                } else {
                    "low"
                };
                patterns.push(FeedbackPattern {
                    pattern_type: "domain_bias".into(),
                    description: format!(
                        "High rejection rate in {} domain ({}%)",
                        stats.domain,
                        (stats.rejection_rate * 100.0) as i64
                    ),
                    affected_count: stats.rejection_count,
                    severity: severity.into(),
                    recommendation: format!(
                        "Review extraction prompts for {} domain.",
                        stats.domain
                    ),
                });
            }
        }

        // Patrón 2: deriva de confianza (corrección alta, rechazo bajo).
        for stats in domain_stats {
            if stats.finding_count >= MIN_SAMPLE_SIZE {
                let correction_rate = stats.correction_count as f64 / stats.finding_count as f64;
                if correction_rate > CORRECTION_RATE_THRESHOLD && stats.rejection_rate < 0.1 {
                    patterns.push(FeedbackPattern {
                        pattern_type: "confidence_drift".into(),
                        description: format!(
                            "High correction rate in {} ({}%) but low rejection",
                            stats.domain,
                            (correction_rate * 100.0) as i64
                        ),
                        affected_count: stats.correction_count,
                        severity: if correction_rate > 0.4 { "high" } else { "medium" }.into(),
                        recommendation: "Consider improving initial extraction precision.".into(),
                    });
                }
            }
        }

        // Patrones 3 y 4: calidad de fuente y errores de extracción.
        let mut corrections_by_type: HashMap<&str, i64> = HashMap::new();
        for correction in corrections {
            *corrections_by_type.entry(correction.correction_type.as_str()).or_default() += 1;
        }

        let source_corrections = *corrections_by_type.get("source").unwrap_or(&0);
        if source_corrections >= 5 {
            patterns.push(FeedbackPattern {
                pattern_type: "source_quality".into(),
                description: format!(
                    "Multiple source corrections detected ({} occurrences)",
                    source_corrections
                ),
                affected_count: source_corrections,
                severity: if source_corrections > 20 {
                    "high"
                } else if source_corrections > 10 {
                    "medium"
                } else {
                    "low"
                }
                .into(),
                recommendation: "Review source document quality.".into(),
            });
        }

        let value_corrections = *corrections_by_type.get("value").unwrap_or(&0);
        if value_corrections >= 10 {
            patterns.push(FeedbackPattern {
                pattern_type: "extraction_error".into(),
                description: format!(
                    "Systematic value extraction errors ({} corrections)",
                    value_corrections
                ),
                affected_count: value_corrections,
                severity: if value_corrections > 30 {
                    "high"
                } else if value_corrections > 15 {
                    "medium"
                } else {
                    "low"
                }
                .into(),
                recommendation: "Review LLM extraction prompts.".into(),
            });
        }

        patterns
    }

    pub fn generate_recommendations(
        &self,
        domain_stats: &[DomainStats],
        patterns: &[FeedbackPattern],
    ) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        for stats in domain_stats {
            if stats.rejection_rate > REJECTION_RATE_THRESHOLD
                && stats.finding_count >= MIN_SAMPLE_SIZE
            {
                recommendations.push(Recommendation {
                    id: Uuid::new_v4().to_string(),
                    recommendation_type: "threshold_adjustment".into(),
                    priority: if stats.rejection_rate > 0.5 { "high" } else { "medium" }.into(),
                    title: format!("Adjust {} confidence threshold", stats.domain),
                    description: format!(
                        "{} has {}% rejection rate.",
                        stats.domain,
                        (stats.rejection_rate * 100.0) as i64
                    ),
                    actionable: true,
                    auto_applicable: true,
                });
            }
        }

        for pattern in patterns {
            if pattern.pattern_type == "extraction_error" && pattern.severity != "low" {
                recommendations.push(Recommendation {
                    id: Uuid::new_v4().to_string(),
                    recommendation_type: "prompt_improvement".into(),
                    priority: pattern.severity.clone(),
                    title: "Review extraction prompts".into(),
                    description: pattern.recommendation.clone(),
                    actionable: true,
                    auto_applicable: false,
                });
            }

            if pattern.pattern_type == "source_quality" {
                recommendations.push(Recommendation {
                    id: Uuid::new_v4().to_string(),
                    recommendation_type: "source_review".into(),
                    priority: pattern.severity.clone(),
                    title: "Review source documents".into(),
                    description: pattern.recommendation.clone(),
                    actionable: true,
                    auto_applicable: false,
                });
            }
        }

        recommendations
    }

    /// Ajustes propuestos a los umbrales de confianza por dominio.
    /// 'current_thresholds' aporta los overrides específicos del deal.
    pub fn calculate_confidence_adjustments(
        &self,
        domain_stats: &[DomainStats],
        current_thresholds: &HashMap<String, f64>,
    ) -> Vec<ConfidenceAdjustment> {
        let mut adjustments = Vec::new();

        for stats in domain_stats {
            if stats.finding_count < MIN_SAMPLE_SIZE {
                continue;
            }

            let current_threshold = current_thresholds
                .get(&stats.domain)
                .copied()
                .unwrap_or_else(|| default_threshold(&stats.domain));

            let mut recommended = current_threshold;
            if stats.rejection_rate > 0.4 {
                recommended = (current_threshold + 0.15).min(0.95);
            } else if stats.rejection_rate > 0.25 {
                recommended = (current_threshold + 0.10).min(0.90);
            } else if stats.rejection_rate < 0.05
                && stats.validation_count as f64 > stats.finding_count as f64 * 0.5
            {
                recommended = (current_threshold - 0.05).max(0.40);
            }

            if (recommended - current_threshold).abs() >= 0.05 {
                let sample_confidence = (stats.finding_count as f64 / 100.0).min(1.0);
                let rate_extremity = (stats.rejection_rate - 0.5).abs() * 2.0;
                let statistical_confidence =
                    sample_confidence * 0.7 + rate_extremity * sample_confidence * 0.3;

                adjustments.push(ConfidenceAdjustment {
                    domain: stats.domain.clone(),
                    current_threshold: round2(current_threshold),
                    recommended_threshold: round2(recommended),
                    reason: if stats.rejection_rate > 0.25 {
                        format!(
                            "High rejection rate ({}%)",
                            (stats.rejection_rate * 100.0) as i64
                        )
                    } else {
                        "Low rejection rate with high validation".to_string()
                    },
                    based_on_sample_size: stats.finding_count,
                    statistical_confidence: round2(statistical_confidence),
                });
            }
        }

        adjustments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acumen_domain_models::{FindingDomain, FindingType};
    use serde_json::json;

    fn finding(id: &str, domain: FindingDomain, confidence: f64) -> Finding {
        Finding {
            id: id.into(),
            deal_id: "deal-1".into(),
            document_id: "doc-1".into(),
            chunk_id: None,
            text: format!("finding {}", id),
            finding_type: FindingType::Fact,
            domain,
            confidence,
            status: "pending".into(),
            metadata: json!({}),
            created_at: "2026-07-01T00:00:00+00:00".into(),
        }
    }

    fn rejection(finding_id: &str) -> ValidationRow {
        ValidationRow {
            id: Uuid::new_v4().to_string(),
            finding_id: finding_id.into(),
            action: "reject".into(),
            created_at: "2026-07-02T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn domain_stats_aggregate_rejection_rate() {
        let findings: Vec<Finding> = (0..12)
            .map(|i| finding(&format!("f{}", i), FindingDomain::Financial, 0.8))
            .collect();
        let validations: Vec<ValidationRow> =
            (0..6).map(|i| rejection(&format!("f{}", i))).collect();

        let stats =
            FeedbackAnalyzer::new().calculate_domain_stats(&findings, &[], &validations);

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].finding_count, 12);
        assert_eq!(stats[0].rejection_count, 6);
        assert_eq!(stats[0].rejection_rate, 1.0);
    }

    #[test]
    fn domain_bias_pattern_requires_min_sample() {
        let analyzer = FeedbackAnalyzer::new();

        let small_sample = vec![DomainStats {
            domain: "financial".into(),
            finding_count: 5,
            correction_count: 0,
            validation_count: 1,
            rejection_count: 4,
            average_confidence: 0.7,
            rejection_rate: 0.8,
        }];
        assert!(analyzer.detect_patterns(&[], &small_sample).is_empty());

        let full_sample = vec![DomainStats { finding_count: 20, ..small_sample[0].clone() }];
        let patterns = analyzer.detect_patterns(&[], &full_sample);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].pattern_type, "domain_bias");
        assert_eq!(patterns[0].severity, "high");
    }

    #[test]
    fn high_rejection_raises_threshold() {
        let stats = vec![DomainStats {
            domain: "financial".into(),
            finding_count: 50,
            correction_count: 0,
            validation_count: 5,
            rejection_count: 25,
            average_confidence: 0.6,
            rejection_rate: 0.5,
        }];

        let adjustments = FeedbackAnalyzer::new()
            .calculate_confidence_adjustments(&stats, &HashMap::new());

        assert_eq!(adjustments.len(), 1);
        // Default financiero 0.70 sube 0.15.
        assert_eq!(adjustments[0].current_threshold, 0.70);
        assert_eq!(adjustments[0].recommended_threshold, 0.85);
    }

    #[test]
    fn deal_override_threshold_wins_over_default() {
        let stats = vec![DomainStats {
            domain: "market".into(),
            finding_count: 30,
            correction_count: 0,
            validation_count: 2,
            rejection_count: 14,
            average_confidence: 0.6,
            rejection_rate: 0.45,
        }];

        let mut overrides = HashMap::new();
        overrides.insert("market".to_string(), 0.60);

        let adjustments =
            FeedbackAnalyzer::new().calculate_confidence_adjustments(&stats, &overrides);
        assert_eq!(adjustments[0].current_threshold, 0.60);
        assert_eq!(adjustments[0].recommended_threshold, 0.75);
    }
}
