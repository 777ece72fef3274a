// [libs/domain/models/src/tenancy.rs]
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Raíz de tenencia. Toda fila derivada resuelve hacia una organización.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

/// Espacio de trabajo dentro de una organización. Unidad de aislamiento
/// para todo artefacto derivado y para el namespace del grafo.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub created_at: String,
}
