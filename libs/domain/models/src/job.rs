// [libs/domain/models/src/job.rs]
/*!
 * =================================================================
 * APARATO: JOB CONTRACTS (V6.0 - TACTICAL LEDGER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATO DE UNIDADES DE TRABAJO EN COLA DURABLE
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ciclo de vida de un trabajo en el Ledger Táctico.
/// created -> active -> (completed | retry | failed); retry regresa a
/// active en el siguiente dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Active,
    Completed,
    Failed,
    Retry,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retry => "retry",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "created" => Some(Self::Created),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "retry" => Some(Self::Retry),
            _ => None,
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unidad de trabajo nominada con payload JSON opaco.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub data: Value,
    pub state: JobState,
    pub priority: i64,
    pub retry_count: i64,
    pub retry_limit: i64,
    /// Demora base en segundos entre reintentos.
    pub retry_delay: i64,
    pub retry_backoff: bool,
    pub start_after: DateTime<Utc>,
    pub created_on: DateTime<Utc>,
    pub started_on: Option<DateTime<Utc>>,
    pub completed_on: Option<DateTime<Utc>>,
    pub output: Option<Value>,
    pub last_error: Option<String>,
}

/// Opciones de encolado. Los campos en 'None' heredan el valor por
/// defecto indexado por nombre de trabajo.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EnqueueOptions {
    /// Mayor valor = despacho primero.
    pub priority: Option<i64>,
    pub retry_limit: Option<i64>,
    pub retry_delay: Option<i64>,
    pub retry_backoff: Option<bool>,
    /// Demora inicial antes de ser elegible para dequeue.
    pub start_after_seconds: Option<i64>,
}

impl EnqueueOptions {
    pub fn with_priority(priority: i64) -> Self {
        Self { priority: Some(priority), ..Self::default() }
    }
}
