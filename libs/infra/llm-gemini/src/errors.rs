// [libs/infra/llm-gemini/src/errors.rs]
/*!
 * =================================================================
 * APARATO: LLM ERROR CATALOG (V4.0 - TYPED VERDICT)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: FALLOS DEL ADAPTADOR CON VEREDICTO DE REINTENTO
 *
 * El clasificador del pipeline lee 'is_retryable()' como vía rápida
 * tipada; el escaneo regex queda reservado a errores de terceros.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    /// Límite de tasa del proveedor (429). Reintentable con backoff.
    #[error("[L3_LLM_FAULT]: RATE_LIMIT_EXCEEDED -> {0}")]
    RateLimit(String),

    /// Error del servidor del proveedor (5xx). Reintentable.
    #[error("[L3_LLM_FAULT]: PROVIDER_SERVER_ERROR -> {0}")]
    Server(String),

    /// Timeout de transporte. Reintentable.
    #[error("[L3_LLM_NET_FAULT]: REQUEST_TIMEOUT -> {0}")]
    Timeout(String),

    /// Credenciales inválidas (401/403). Nunca reintentable.
    #[error("[L3_LLM_FAULT]: AUTHENTICATION_REJECTED -> {0}")]
    Auth(String),

    /// Respuesta sin estructura interpretable. Nunca reintentable.
    #[error("[L3_LLM_FAULT]: MALFORMED_RESPONSE -> {0}")]
    InvalidResponse(String),

    /// Cualquier otro estatus HTTP del proveedor.
    #[error("[L3_LLM_FAULT]: API_STATUS_{status} -> {message}")]
    ApiStatus { status: u16, message: String },

    /// Configuración ausente (API key vacía).
    #[error("[L3_LLM_CONFIG_FAULT]: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Solo las clases de tasa y servidor participan del reintento
    /// interno del adaptador.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit(_) | Self::Server(_) | Self::Timeout(_))
    }

    /// Clases que disparan la cadena de fallback hacia el modelo
    /// secundario: estatus HTTP, tasa y timeouts. Las respuestas
    /// malformadas y la configuración no (el fallback repetiría el fallo).
    pub fn triggers_fallback(&self) -> bool {
        matches!(
            self,
            Self::RateLimit(_)
                | Self::Server(_)
                | Self::Timeout(_)
                | Self::Auth(_)
                | Self::ApiStatus { .. }
        )
    }

    /// Etiqueta corta de la clase, para los eventos de fallback.
    pub fn class_label(&self) -> &'static str {
        match self {
            Self::RateLimit(_) => "rate_limit",
            Self::Server(_) => "server_error",
            Self::Timeout(_) => "timeout",
            Self::Auth(_) => "auth_error",
            Self::InvalidResponse(_) => "invalid_response",
            Self::ApiStatus { .. } => "api_status",
            Self::Configuration(_) => "configuration",
        }
    }
}
