// [libs/infra/llm-gemini/src/models.rs]
/*!
 * =================================================================
 * APARATO: MODEL TIER REGISTRY (V5.2 - COST TABLES)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: NIVELES DE MODELO, SELECCIÓN POR MIME Y TARIFARIO
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Clase configurable de modelo, elegida por tipo de documento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Flash,
    Pro,
    Lite,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flash => "flash",
            Self::Pro => "pro",
            Self::Lite => "lite",
        }
    }
}

/// MIME types de hojas de cálculo que exigen el nivel PRO.
pub const SPREADSHEET_MIME_TYPES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-excel",
    "application/vnd.ms-excel.sheet.macroenabled.12",
    "text/csv",
];

/// Las hojas de cálculo requieren razonamiento numérico fino (PRO);
/// el resto del corpus corre sobre el nivel económico (FLASH).
pub fn select_model_tier(mime_type: &str) -> ModelTier {
    if SPREADSHEET_MIME_TYPES.contains(&mime_type) {
        ModelTier::Pro
    } else {
        ModelTier::Flash
    }
}

/// Mapa tier -> modelo concreto; configuración, no código.
#[derive(Debug, Clone)]
pub struct TierModelMap {
    pub flash: String,
    pub pro: String,
    pub lite: String,
}

impl Default for TierModelMap {
    fn default() -> Self {
        Self {
            flash: "gemini-2.5-flash".to_string(),
            pro: "gemini-2.5-pro".to_string(),
            lite: "gemini-2.5-flash-lite".to_string(),
        }
    }
}

impl TierModelMap {
    pub fn resolve(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Flash => &self.flash,
            ModelTier::Pro => &self.pro,
            ModelTier::Lite => &self.lite,
        }
    }
}

/// Tarifa por millón de tokens, indexada por 'provider:model'.
#[derive(Debug, Clone, Copy)]
pub struct ModelRate {
    pub input_per_million_usd: f64,
    pub output_per_million_usd: f64,
}

/// Tarifario de proveedores conocidos. Modelos fuera de tabla cuestan 0
/// (se registran igualmente para trazabilidad de volumen).
pub fn rate_for(provider_model: &str) -> ModelRate {
    match provider_model {
        "gemini:gemini-2.5-flash" => {
            ModelRate { input_per_million_usd: 0.30, output_per_million_usd: 1.20 }
        }
        "gemini:gemini-2.5-pro" => {
            ModelRate { input_per_million_usd: 1.25, output_per_million_usd: 10.00 }
        }
        "gemini:gemini-2.5-flash-lite" => {
            ModelRate { input_per_million_usd: 0.10, output_per_million_usd: 0.40 }
        }
        "voyage:voyage-3.5" => {
            ModelRate { input_per_million_usd: 0.06, output_per_million_usd: 0.0 }
        }
        "gemini:text-embedding-004" => {
            ModelRate { input_per_million_usd: 0.0, output_per_million_usd: 0.0 }
        }
        _ => ModelRate { input_per_million_usd: 0.0, output_per_million_usd: 0.0 },
    }
}

/// cost = in*rate_in/1e6 + out*rate_out/1e6
pub fn estimate_cost(provider: &str, model: &str, input_tokens: i64, output_tokens: i64) -> f64 {
    let rate = rate_for(&format!("{}:{}", provider, model));
    (input_tokens as f64) * rate.input_per_million_usd / 1_000_000.0
        + (output_tokens as f64) * rate.output_per_million_usd / 1_000_000.0
}
