// [libs/infra/llm-gemini/src/client.rs]
/*!
 * =================================================================
 * APARATO: GEMINI UPLINK (V8.4 - MODEL CHAIN)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: INVOCACIÓN generateContent CON CADENA DE FALLBACK
 *
 * # Logic:
 * 1. Reintento interno: 3 intentos con backoff exponencial + jitter,
 *    solo para clases de tasa y servidor.
 * 2. Cadena de modelos: agotado el primario, las clases elegibles
 *    disparan el modelo de respaldo con un evento estructurado que
 *    identifica primario, respaldo y clase del error disparador.
 * =================================================================
 */

use crate::capability::{LanguageModel, Usage};
use crate::errors::LlmError;
use crate::models::{ModelTier, TierModelMap};
use async_trait::async_trait;
use rand::Rng;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT_SECONDS: u64 = 30;

pub struct GeminiClient {
    network_session_client: reqwest::Client,
    api_key: String,
    tier_map: TierModelMap,
    /// Modelo de respaldo para la cadena; None desactiva el fallback.
    fallback_model: Option<String>,
}

impl GeminiClient {
    /// # Errors:
    /// - `LlmError::Configuration`: API key vacía.
    pub fn new(
        api_key: String,
        tier_map: TierModelMap,
        fallback_model: Option<String>,
    ) -> Result<Self, LlmError> {
        if api_key.is_empty() {
            return Err(LlmError::Configuration(
                "GOOGLE_API_KEY undefined: Gemini uplink cannot ignite".into(),
            ));
        }

        Ok(Self {
            network_session_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
                .build()
                .unwrap_or_default(),
            api_key,
            tier_map,
            fallback_model,
        })
    }

    /// Una invocación cruda contra un modelo concreto, sin reintentos.
    async fn invoke_once(
        &self,
        model_name: &str,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<(String, Usage), LlmError> {
        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.1 }
        });
        if let Some(system) = system_prompt {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        let target_url =
            format!("{}/{}:generateContent?key={}", GEMINI_API_BASE, model_name, self.api_key);

        let network_response = self
            .network_session_client
            .post(&target_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(e.to_string())
                } else {
                    LlmError::Server(e.to_string())
                }
            })?;

        let status = network_response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimit(format!("HTTP_429 on {}", model_name)));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(LlmError::Auth(format!("HTTP_{} on {}", status.as_u16(), model_name)));
        }
        if status.is_server_error() {
            return Err(LlmError::Server(format!("HTTP_{} on {}", status.as_u16(), model_name)));
        }
        if !status.is_success() {
            return Err(LlmError::ApiStatus {
                status: status.as_u16(),
                message: model_name.to_string(),
            });
        }

        let payload: Value = network_response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let response_text = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| LlmError::InvalidResponse("NO_CANDIDATE_TEXT".into()))?
            .to_string();

        // Uso reportado por el proveedor; estimación por longitud si falta.
        let input_tokens = payload["usageMetadata"]["promptTokenCount"]
            .as_i64()
            .unwrap_or((prompt.len() / 4) as i64);
        let output_tokens = payload["usageMetadata"]["candidatesTokenCount"]
            .as_i64()
            .unwrap_or((response_text.len() / 4) as i64);

        Ok((
            response_text,
            Usage {
                input_tokens,
                output_tokens,
                provider: "gemini".to_string(),
                model: model_name.to_string(),
            },
        ))
    }

    /// Invocación con reintento interno (3 intentos, backoff + jitter).
    async fn invoke_with_retry(
        &self,
        model_name: &str,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<(String, Usage), LlmError> {
        let mut last_error = None;

        for attempt in 0..MAX_ATTEMPTS {
            match self.invoke_once(model_name, prompt, system_prompt).await {
                Ok(result) => return Ok(result),
                Err(error) if error.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                    let base_delay_ms = 1_000u64 * (1 << attempt);
                    let jitter_ms = rand::thread_rng().gen_range(0..500);
                    warn!(
                        "⏳ [LLM]: Attempt {}/{} on [{}] failed ({}); backing off {}ms.",
                        attempt + 1,
                        MAX_ATTEMPTS,
                        model_name,
                        error.class_label(),
                        base_delay_ms + jitter_ms
                    );
                    tokio::time::sleep(Duration::from_millis(base_delay_ms + jitter_ms)).await;
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Server("RETRY_EXHAUSTED".into())))
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    #[instrument(skip(self, prompt, system_prompt), fields(tier = tier.as_str()))]
    async fn run(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        tier: ModelTier,
    ) -> Result<(String, Usage), LlmError> {
        let primary_model = self.tier_map.resolve(tier).to_string();

        debug!("🧠 [LLM]: Invoking [{}] (prompt {} chars).", primary_model, prompt.len());

        match self.invoke_with_retry(&primary_model, prompt, system_prompt).await {
            Ok(result) => Ok(result),
            Err(primary_error) if primary_error.triggers_fallback() => {
                let Some(fallback_model) = self.fallback_model.clone() else {
                    return Err(primary_error);
                };

                // Evento estructurado: identifica la cadena y la clase
                // del error que disparó el respaldo.
                info!(
                    primary = %primary_model,
                    fallback = %fallback_model,
                    trigger_class = %primary_error.class_label(),
                    "🔀 [LLM_FALLBACK]: Primary model exhausted; engaging fallback."
                );

                self.invoke_with_retry(&fallback_model, prompt, system_prompt).await
            }
            Err(error) => Err(error),
        }
    }
}
