// [libs/domain/models/src/finding.rs]
// =================================================================
// APARATO: FINDING DOMAIN MODEL (V7.0)
// RESPONSABILIDAD: EXTRACCIÓN ESTRUCTURADA DESDE CHUNKS
// =================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use typeshare::typeshare;

/// Naturaleza de la afirmación extraída.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingType {
    Fact,
    Metric,
    Risk,
    Opportunity,
    Insight,
    Assumption,
}

impl FindingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Metric => "metric",
            Self::Risk => "risk",
            Self::Opportunity => "opportunity",
            Self::Insight => "insight",
            Self::Assumption => "assumption",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "fact" => Some(Self::Fact),
            "metric" => Some(Self::Metric),
            "risk" => Some(Self::Risk),
            "opportunity" => Some(Self::Opportunity),
            "insight" => Some(Self::Insight),
            "assumption" => Some(Self::Assumption),
            _ => None,
        }
    }
}

/// Dominio temático del hallazgo; eje de agrupación para la
/// detección de contradicciones y la analítica de feedback.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingDomain {
    Financial,
    Operational,
    Market,
    Legal,
    Technical,
    General,
}

impl FindingDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Financial => "financial",
            Self::Operational => "operational",
            Self::Market => "market",
            Self::Legal => "legal",
            Self::Technical => "technical",
            Self::General => "general",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "financial" => Some(Self::Financial),
            "operational" => Some(Self::Operational),
            "market" => Some(Self::Market),
            "legal" => Some(Self::Legal),
            "technical" => Some(Self::Technical),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

/// Veredicto humano sobre un hallazgo.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Pending,
    Validated,
    Rejected,
}

impl FindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validated => "validated",
            Self::Rejected => "rejected",
        }
    }
}

/// Fila persistida de un hallazgo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub deal_id: String,
    pub document_id: String,
    pub chunk_id: Option<String>,
    pub text: String,
    pub finding_type: FindingType,
    pub domain: FindingDomain,
    pub confidence: f64,
    pub status: String,
    /// Incluye 'source_reference' (página/celda) y, si aplica,
    /// 'date_referenced' para el alineamiento temporal.
    pub metadata: Value,
    pub created_at: String,
}

/// Hallazgo aún sin identidad, tal como sale del extractor LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingDraft {
    pub deal_id: String,
    pub document_id: String,
    pub chunk_id: Option<String>,
    pub text: String,
    pub finding_type: FindingType,
    pub domain: FindingDomain,
    pub confidence: f64,
    pub metadata: Value,
}
