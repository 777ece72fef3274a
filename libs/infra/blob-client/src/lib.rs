// [libs/infra/blob-client/src/lib.rs]
/*!
 * =================================================================
 * APARATO: BLOB STORE UPLINK (V4.1 - SCRATCH HYDRATOR)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: DESCARGA DE ARTEFACTOS CRUDOS AL SCRATCH LOCAL
 *
 * # Logic:
 * El pipeline referencia blobs por URI opaca ('gs://...', 'https://...'
 * o ruta local para entornos de prueba). El adaptador resuelve la
 * referencia hacia un archivo temporal y reporta fallos con veredicto
 * de reintento tipado: 404 es permanente, la red es transitoria.
 * =================================================================
 */

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument};

#[derive(Error, Debug)]
pub enum BlobError {
    /// El objeto no existe en el almacén. No reintentable.
    #[error("[L3_BLOB_FAULT]: OBJECT_NOT_FOUND -> {0}")]
    NotFound(String),

    /// Fallo de transporte o del proveedor. Reintentable.
    #[error("[L3_BLOB_NET_FAULT]: DOWNLOAD_SEVERED -> {0}")]
    Transport(String),

    /// Referencia malformada. No reintentable.
    #[error("[L3_BLOB_FAULT]: INVALID_REFERENCE -> {0}")]
    InvalidReference(String),

    /// Fallo de E/S al materializar el scratch local.
    #[error("[L3_BLOB_IO_FAULT]: SCRATCH_WRITE_FAILED -> {0}")]
    Io(#[from] std::io::Error),
}

impl BlobError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Io(_))
    }
}

/// Capacidad de descarga de blobs hacia el disco local.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Hidrata el blob referenciado en 'destination' y devuelve la ruta.
    async fn download(&self, blob_reference: &str, destination: &Path)
        -> Result<PathBuf, BlobError>;
}

/// Cliente HTTP con soporte de rutas locales para fixtures.
pub struct HttpBlobStore {
    network_session_client: reqwest::Client,
    /// Prefijo base para resolver referencias 'gs://' vía gateway HTTP.
    gateway_base_url: Option<String>,
}

impl HttpBlobStore {
    pub fn new(gateway_base_url: Option<String>) -> Self {
        Self {
            network_session_client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            gateway_base_url: gateway_base_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    /// Traduce una referencia 'gs://bucket/key' hacia la URL del gateway.
    fn resolve_url(&self, blob_reference: &str) -> Result<String, BlobError> {
        if blob_reference.starts_with("http://") || blob_reference.starts_with("https://") {
            return Ok(blob_reference.to_string());
        }

        if let Some(object_key) = blob_reference.strip_prefix("gs://") {
            let base = self.gateway_base_url.as_deref().ok_or_else(|| {
                BlobError::InvalidReference("GATEWAY_BASE_URL_UNDEFINED for gs:// scheme".into())
            })?;
            return Ok(format!("{}/{}", base, object_key));
        }

        Err(BlobError::InvalidReference(format!("UNSUPPORTED_SCHEME: {}", blob_reference)))
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    #[instrument(skip(self))]
    async fn download(
        &self,
        blob_reference: &str,
        destination: &Path,
    ) -> Result<PathBuf, BlobError> {
        // Rutas locales: copia directa, usada por los entornos de prueba.
        if !blob_reference.contains("://") {
            let source = PathBuf::from(blob_reference);
            if !source.exists() {
                return Err(BlobError::NotFound(blob_reference.to_string()));
            }
            fs::copy(&source, destination).await?;
            return Ok(destination.to_path_buf());
        }

        let target_url = self.resolve_url(blob_reference)?;

        let network_response = self
            .network_session_client
            .get(&target_url)
            .send()
            .await
            .map_err(|e| BlobError::Transport(e.to_string()))?;

        if network_response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BlobError::NotFound(blob_reference.to_string()));
        }
        if !network_response.status().is_success() {
            return Err(BlobError::Transport(format!(
                "HTTP_{} for {}",
                network_response.status(),
                blob_reference
            )));
        }

        let payload =
            network_response.bytes().await.map_err(|e| BlobError::Transport(e.to_string()))?;
        fs::write(destination, &payload).await?;

        info!(
            "📦 [BLOB]: Hydrated {} byte(s) from [{}] into scratch.",
            payload.len(),
            blob_reference
        );
        Ok(destination.to_path_buf())
    }
}
