// [libs/infra/llm-gemini/src/capability.rs]
/*!
 * =================================================================
 * APARATO: CAPABILITY CONTRACTS (V3.0)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: INTERFACES DE CAPACIDAD LLM / EMBEDDINGS
 *
 * Los handlers del pipeline dependen de estas interfaces, nunca de
 * proveedores concretos; los tests inyectan dobles deterministas.
 * =================================================================
 */

use crate::errors::LlmError;
use crate::models::ModelTier;
use async_trait::async_trait;

/// Uso reportado por una invocación al proveedor.
#[derive(Debug, Clone)]
pub struct Usage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub provider: String,
    pub model: String,
}

impl Usage {
    pub fn provider_model(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }
}

/// Capacidad de generación de texto con selección por nivel.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Ejecuta el prompt contra el modelo del nivel indicado.
    ///
    /// # Errors:
    /// - `LlmError`: con veredicto tipado de reintento/fallback.
    async fn run(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        tier: ModelTier,
    ) -> Result<(String, Usage), LlmError>;
}

/// Capacidad de vectorización de textos.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Vectoriza el lote; la dimensionalidad depende del proveedor
    /// activo (1024 Voyage, 768 Gemini) y el esquema la acomoda.
    async fn embed(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, Usage), LlmError>;
}
