// [libs/infra/llm-gemini/src/embeddings.rs]
/*!
 * =================================================================
 * APARATO: EMBEDDING UPLINK (V6.1 - VOYAGE PRIMARY)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: VECTORIZACIÓN CON PROVEEDOR PREFERIDO Y RESPALDO
 *
 * # Logic:
 * Voyage (voyage-3.5, 1024d) es el proveedor preferido; ante su
 * ausencia o fallo elegible, el adaptador cae a Gemini
 * text-embedding-004 (768d). El esquema relacional acomoda ambas
 * dimensionalidades.
 * =================================================================
 */

use crate::capability::{EmbeddingProvider, Usage};
use crate::errors::LlmError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, instrument, warn};

const VOYAGE_API_URL: &str = "https://api.voyageai.com/v1/embeddings";
const VOYAGE_MODEL: &str = "voyage-3.5";
const GEMINI_EMBED_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:batchEmbedContents";
const GEMINI_EMBED_MODEL: &str = "text-embedding-004";

pub struct EmbeddingClient {
    network_session_client: reqwest::Client,
    /// API key de Voyage; None fuerza el respaldo Gemini.
    voyage_api_key: Option<String>,
    google_api_key: String,
}

impl EmbeddingClient {
    pub fn new(voyage_api_key: Option<String>, google_api_key: String) -> Result<Self, LlmError> {
        if google_api_key.is_empty() {
            return Err(LlmError::Configuration(
                "GOOGLE_API_KEY undefined: embedding fallback unavailable".into(),
            ));
        }

        Ok(Self {
            network_session_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            voyage_api_key: voyage_api_key.filter(|key| !key.is_empty()),
            google_api_key,
        })
    }

    async fn embed_via_voyage(
        &self,
        api_key: &str,
        texts: &[String],
    ) -> Result<(Vec<Vec<f32>>, Usage), LlmError> {
        let network_response = self
            .network_session_client
            .post(VOYAGE_API_URL)
            .bearer_auth(api_key)
            .json(&json!({ "input": texts, "model": VOYAGE_MODEL }))
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
            return Err(LlmError::RateLimit("HTTP_429 on voyage".into()));
        }
        if !status.is_success() {
            return Err(LlmError::ApiStatus { status: status.as_u16(), message: "voyage".into() });
        }

        let payload: Value =
            network_response.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let vectors = payload["data"]
            .as_array()
            .ok_or_else(|| LlmError::InvalidResponse("VOYAGE_DATA_MISSING".into()))?
            .iter()
            .map(|entry| {
                entry["embedding"]
                    .as_array()
                    .map(|values| {
                        values.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect()
                    })
                    .ok_or_else(|| LlmError::InvalidResponse("VOYAGE_VECTOR_MISSING".into()))
            })
            .collect::<Result<Vec<Vec<f32>>, _>>()?;

        let input_tokens = payload["usage"]["total_tokens"]
            .as_i64()
            .unwrap_or_else(|| texts.iter().map(|t| (t.len() / 4) as i64).sum());

        Ok((
            vectors,
            Usage {
                input_tokens,
                output_tokens: 0,
                provider: "voyage".to_string(),
                model: VOYAGE_MODEL.to_string(),
            },
        ))
    }

    async fn embed_via_gemini(
        &self,
        texts: &[String],
    ) -> Result<(Vec<Vec<f32>>, Usage), LlmError> {
        let requests: Vec<Value> = texts
            .iter()
            .map(|text| {
                json!({
                    "model": format!("models/{}", GEMINI_EMBED_MODEL),
                    "content": { "parts": [{ "text": text }] }
                })
            })
            .collect();

        let target_url = format!("{}?key={}", GEMINI_EMBED_URL, self.google_api_key);
        let network_response = self
            .network_session_client
            .post(&target_url)
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .map_err(|e| LlmError::Server(e.to_string()))?;

        let status = network_response.status();
        if !status.is_success() {
            return Err(LlmError::ApiStatus { status: status.as_u16(), message: "gemini".into() });
        }

        let payload: Value =
            network_response.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let vectors = payload["embeddings"]
            .as_array()
            .ok_or_else(|| LlmError::InvalidResponse("GEMINI_EMBEDDINGS_MISSING".into()))?
            .iter()
            .map(|entry| {
                entry["values"]
                    .as_array()
                    .map(|values| {
                        values.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect()
                    })
                    .ok_or_else(|| LlmError::InvalidResponse("GEMINI_VECTOR_MISSING".into()))
            })
            .collect::<Result<Vec<Vec<f32>>, _>>()?;

        let input_tokens: i64 = texts.iter().map(|t| (t.len() / 4) as i64).sum();

        Ok((
            vectors,
            Usage {
                input_tokens,
                output_tokens: 0,
                provider: "gemini".to_string(),
                model: GEMINI_EMBED_MODEL.to_string(),
            },
        ))
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    #[instrument(skip(self, texts), fields(batch = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, Usage), LlmError> {
        if texts.is_empty() {
            return Ok((
                Vec::new(),
                Usage {
                    input_tokens: 0,
                    output_tokens: 0,
                    provider: "none".to_string(),
                    model: "none".to_string(),
                },
            ));
        }

        if let Some(voyage_key) = self.voyage_api_key.clone() {
            match self.embed_via_voyage(&voyage_key, texts).await {
                Ok(result) => {
                    info!(
                        "🧬 [EMBED]: Voyage vectorized {} text(s) ({}d).",
                        texts.len(),
                        result.0.first().map(|v| v.len()).unwrap_or(0)
                    );
                    return Ok(result);
                }
                Err(voyage_error) => {
                    warn!(
                        trigger_class = %voyage_error.class_label(),
                        "🔀 [EMBED_FALLBACK]: Voyage unavailable; engaging Gemini embedder."
                    );
                }
            }
        }

        self.embed_via_gemini(texts).await
    }
}
