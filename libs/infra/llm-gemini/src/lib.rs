// [libs/infra/llm-gemini/src/lib.rs]
/*!
 * =================================================================
 * APARATO: LLM INFRASTRUCTURE ROOT (V3.0)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CAPACIDADES LLM/EMBEDDING Y TARIFARIO DE COSTO
 * =================================================================
 */

pub mod capability;
pub mod client;
pub mod embeddings;
pub mod errors;
pub mod models;

pub use capability::{EmbeddingProvider, LanguageModel, Usage};
pub use client::GeminiClient;
pub use embeddings::EmbeddingClient;
pub use errors::LlmError;
pub use models::{
    estimate_cost, rate_for, select_model_tier, ModelRate, ModelTier, TierModelMap,
    SPREADSHEET_MIME_TYPES,
};
