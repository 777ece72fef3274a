// [libs/domain/pipeline/src/deps.rs]
/*!
 * =================================================================
 * APARATO: DEPENDENCY BUNDLE (V4.0 - TYPED CONSTRUCTION GRAPH)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: GRAFO DE CONSTRUCCIÓN TIPADO PARA LOS HANDLERS
 *
 * Cada handler ve el adaptador relacional, el grafo, la cola, el
 * gestor de reintentos y los identificadores de aislamiento a través
 * de este paquete; los tests inyectan sus propias instancias.
 * =================================================================
 */

use crate::config::PipelineConfig;
use crate::retry::RetryManager;
use acumen_infra_blob::BlobStore;
use acumen_infra_db::{JobQueue, Storage};
use acumen_infra_graph::KnowledgeGraph;
use acumen_infra_llm::{EmbeddingProvider, LanguageModel};
use std::sync::Arc;

#[derive(Clone)]
pub struct Dependencies {
    pub storage: Storage,
    pub queue: Arc<JobQueue>,
    pub retry: Arc<RetryManager>,
    pub language_model: Arc<dyn LanguageModel>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub graph: Arc<dyn KnowledgeGraph>,
    pub blobs: Arc<dyn BlobStore>,
    pub config: PipelineConfig,
}
