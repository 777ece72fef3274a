// [libs/domain/models/src/retry.rs]
/*!
 * =================================================================
 * APARATO: RETRY CONTRACTS (V5.2)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: FORMAS PERSISTIDAS DEL ERROR CLASIFICADO Y SU HISTORIAL
 * =================================================================
 */

use chrono::Utc;
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Categoría conductual del error: gobierna si la cola reprograma.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Fallo temporal: la cola debe reintentar.
    Transient,
    /// Fallo definitivo: corta el pipeline de inmediato.
    Permanent,
    /// Sin diagnóstico: se concede un reintento.
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Unknown => "unknown",
        }
    }
}

/// Error clasificado, persistido como JSON en 'documents.processing_error'.
/// 'user_message' y 'guidance' son los únicos campos aptos para UI;
/// 'message' y 'stack_trace' son material de diagnóstico.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub error_type: String,
    pub message: String,
    pub should_retry: bool,
    pub user_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    pub retry_count: i64,
}

impl ClassifiedError {
    pub fn now_timestamp() -> String {
        Utc::now().to_rfc3339()
    }
}

/// Entrada del historial de reintentos en 'documents.retry_history'.
/// La lista queda acotada a las 10 más recientes, ordenadas por
/// timestamp descendente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryHistoryEntry {
    pub attempt: i64,
    pub stage: String,
    pub error_type: String,
    pub message: String,
    pub timestamp: String,
}

/// Cota dura del historial persistido por documento.
pub const RETRY_HISTORY_LIMIT: usize = 10;
