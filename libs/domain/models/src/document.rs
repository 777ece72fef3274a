// [libs/domain/models/src/document.rs]
/*!
 * =================================================================
 * APARATO: DOCUMENT STATE MODELS (V5.0 - DUAL MACHINE)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: MÁQUINA DE ESTADOS GRUESA (STATUS) Y CURSOR FINO (STAGE)
 *
 * # Logic:
 * Dos máquinas corren acopladas sobre cada documento:
 * 1. 'processing_status': etiqueta gruesa visible al usuario.
 * 2. 'last_completed_stage': cursor fino monotónico usado por el retry.
 * El cursor fino es la marca de progreso autoritativa; el estatus
 * grueso se deriva de él en cada transición.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;
use typeshare::typeshare;

/// Etiqueta gruesa del ciclo de vida, visible en el Dashboard.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Parsing,
    Parsed,
    Embedding,
    Embedded,
    GraphitiIngesting,
    GraphitiIngested,
    Analyzing,
    Analyzed,
    ExtractingFinancials,
    Complete,
    Failed,
    ParsingFailed,
    EmbeddingFailed,
    AnalyzingFailed,
    ExtractingFinancialsFailed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Parsing => "parsing",
            Self::Parsed => "parsed",
            Self::Embedding => "embedding",
            Self::Embedded => "embedded",
            Self::GraphitiIngesting => "graphiti_ingesting",
            Self::GraphitiIngested => "graphiti_ingested",
            Self::Analyzing => "analyzing",
            Self::Analyzed => "analyzed",
            Self::ExtractingFinancials => "extracting_financials",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::ParsingFailed => "parsing_failed",
            Self::EmbeddingFailed => "embedding_failed",
            Self::AnalyzingFailed => "analyzing_failed",
            Self::ExtractingFinancialsFailed => "extracting_financials_failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "parsing" => Some(Self::Parsing),
            "parsed" => Some(Self::Parsed),
            "embedding" => Some(Self::Embedding),
            "embedded" => Some(Self::Embedded),
            "graphiti_ingesting" => Some(Self::GraphitiIngesting),
            "graphiti_ingested" => Some(Self::GraphitiIngested),
            "analyzing" => Some(Self::Analyzing),
            "analyzed" => Some(Self::Analyzed),
            "extracting_financials" => Some(Self::ExtractingFinancials),
            "complete" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            "parsing_failed" => Some(Self::ParsingFailed),
            "embedding_failed" => Some(Self::EmbeddingFailed),
            "analyzing_failed" => Some(Self::AnalyzingFailed),
            "extracting_financials_failed" => Some(Self::ExtractingFinancialsFailed),
            _ => None,
        }
    }

    /// Un estatus terminal de fallo detiene el avance del pipeline.
    pub const fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed
                | Self::ParsingFailed
                | Self::EmbeddingFailed
                | Self::AnalyzingFailed
                | Self::ExtractingFinancialsFailed
        )
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cursor fino de progreso interno. Monotónico dentro de una corrida
/// exitosa; el retry puede retrocederlo exactamente un paso.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Pending,
    Parsed,
    Embedded,
    Analyzed,
    Complete,
}

/// Orden canónico de los estadios del pipeline.
pub const STAGE_ORDER: [ProcessingStage; 5] = [
    ProcessingStage::Pending,
    ProcessingStage::Parsed,
    ProcessingStage::Embedded,
    ProcessingStage::Analyzed,
    ProcessingStage::Complete,
];

impl ProcessingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Parsed => "parsed",
            Self::Embedded => "embedded",
            Self::Analyzed => "analyzed",
            Self::Complete => "complete",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "parsed" => Some(Self::Parsed),
            "embedded" => Some(Self::Embedded),
            "analyzed" => Some(Self::Analyzed),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Determina el estadio sucesor según el último completado.
/// 'COMPLETE' es punto fijo; cursores desconocidos reinician en PENDING.
pub fn next_stage(last_completed: Option<ProcessingStage>) -> ProcessingStage {
    let Some(current) = last_completed else {
        return ProcessingStage::Pending;
    };
    let position = STAGE_ORDER.iter().position(|s| *s == current);
    match position {
        Some(idx) if idx + 1 < STAGE_ORDER.len() => STAGE_ORDER[idx + 1],
        Some(_) => ProcessingStage::Complete,
        None => ProcessingStage::Pending,
    }
}

/// Proyecta un estadio fino hacia su valor de 'processing_status'.
pub fn stage_to_status(stage: ProcessingStage) -> ProcessingStatus {
    match stage {
        ProcessingStage::Pending => ProcessingStatus::Pending,
        ProcessingStage::Parsed => ProcessingStatus::Parsed,
        ProcessingStage::Embedded => ProcessingStatus::Embedded,
        ProcessingStage::Analyzed => ProcessingStatus::Analyzed,
        ProcessingStage::Complete => ProcessingStatus::Complete,
    }
}

/// Proyecta un 'processing_status' al estadio fino que representa.
/// Los estatus '*ing' mapean al estadio previo aún no completado.
pub fn status_to_stage(status: &str) -> Option<ProcessingStage> {
    match status {
        "pending" | "processing" | "parsing" => Some(ProcessingStage::Pending),
        "parsed" | "embedding" | "graphiti_ingesting" => Some(ProcessingStage::Parsed),
        "embedded" | "graphiti_ingested" | "analyzing" => Some(ProcessingStage::Embedded),
        "analyzed" | "extracting_financials" => Some(ProcessingStage::Analyzed),
        "complete" => Some(ProcessingStage::Complete),
        _ => None,
    }
}

/// Estatus terminal de fallo específico para una etapa de trabajo.
/// Etapas desconocidas colapsan en el genérico 'failed'.
pub fn failed_status_for_stage(stage_label: &str) -> ProcessingStatus {
    match stage_label {
        "parsing" | "parsed" => ProcessingStatus::ParsingFailed,
        "embedding" | "embedded" | "graphiti_ingesting" => ProcessingStatus::EmbeddingFailed,
        "analyzing" | "analyzed" => ProcessingStatus::AnalyzingFailed,
        "extracting_financials" => ProcessingStatus::ExtractingFinancialsFailed,
        _ => ProcessingStatus::Failed,
    }
}

/// Estatus '*ing' correspondiente a una etapa en ejecución.
pub fn running_status_for_stage(stage_label: &str) -> ProcessingStatus {
    match stage_label {
        "parsing" | "parsed" => ProcessingStatus::Parsing,
        "embedding" | "embedded" => ProcessingStatus::Embedding,
        "graphiti_ingesting" => ProcessingStatus::GraphitiIngesting,
        "analyzing" | "analyzed" => ProcessingStatus::Analyzing,
        "extracting_financials" => ProcessingStatus::ExtractingFinancials,
        _ => ProcessingStatus::Processing,
    }
}

/// Registro persistido del artefacto crudo subido a un deal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub deal_id: String,
    pub name: String,
    pub blob_reference: String,
    pub mime_type: String,
    pub processing_status: String,
    pub last_completed_stage: Option<String>,
    pub processing_error: Option<Value>,
    pub retry_history: Vec<Value>,
    pub created_at: String,
    pub updated_at: String,
}

/// Clase de contenido de un chunk.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Text,
    Table,
    Formula,
    Image,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Table => "table",
            Self::Formula => "formula",
            Self::Image => "image",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "text" => Some(Self::Text),
            "table" => Some(Self::Table),
            "formula" => Some(Self::Formula),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

/// Fila persistida de un chunk, con su embedding opcional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub chunk_type: ChunkType,
    pub page_number: Option<i64>,
    pub sheet_name: Option<String>,
    pub cell_reference: Option<String>,
    pub token_count: Option<i64>,
    pub embedding: Option<Vec<f32>>,
    pub metadata: Value,
}
