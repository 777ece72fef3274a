// [libs/domain/models/src/contradiction.rs]
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Estado de resolución de una contradicción detectada.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionStatus {
    Unresolved,
    Accepted,
    Dismissed,
}

impl ContradictionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::Accepted => "accepted",
            Self::Dismissed => "dismissed",
        }
    }
}

/// Conflicto confirmado entre dos hallazgos del mismo deal.
/// Invariante: el par {a, b} no ordenado existe a lo sumo una vez por deal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contradiction {
    pub id: String,
    pub deal_id: String,
    pub finding_a_id: String,
    pub finding_b_id: String,
    pub confidence: f64,
    pub reason: String,
    pub status: String,
    pub detected_at: String,
}
