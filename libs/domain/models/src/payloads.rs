// [libs/domain/models/src/payloads.rs]
/*!
 * =================================================================
 * APARATO: JOB PAYLOAD CONTRACTS (V3.4 - WIRE STABLE)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: FORMAS JSON ESTABLES DE LOS PAYLOADS DE COLA
 *
 * Los nombres de campo son parte del contrato externo: otros
 * servicios encolan trabajos con estas claves exactas.
 * =================================================================
 */

use serde::{Deserialize, Serialize};

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseDocumentPayload {
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gcs_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_retry: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestGraphPayload {
    pub document_id: String,
    pub deal_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_retry: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeDocumentPayload {
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_retry: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractFinancialsPayload {
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectContradictionsPayload {
    pub deal_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_retry: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestQaPayload {
    pub qa_item_id: String,
    pub deal_id: String,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestChatPayload {
    pub message_id: String,
    pub deal_id: String,
    pub fact_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_context: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_period_days() -> i64 {
    7
}

fn default_analysis_type() -> String {
    "full".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeFeedbackPayload {
    pub deal_id: String,
    #[serde(default = "default_period_days")]
    pub period_days: i64,
    #[serde(default = "default_analysis_type")]
    pub analysis_type: String,
    #[serde(default = "default_true")]
    pub include_pattern_detection: bool,
    #[serde(default = "default_true")]
    pub include_confidence_adjustments: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeFeedbackAllPayload {
    #[serde(default = "default_period_days")]
    pub period_days: i64,
}
