// [apps/orchestrator/src/state.rs]
/*!
 * =================================================================
 * APARATO: APPLICATION SHARED STATE (V5.0)
 * CLASIFICACIÓN: APPLICATION LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CLIENTES PROCESS-WIDE COMPARTIDOS POR LOS HANDLERS
 * =================================================================
 */

use acumen_domain_pipeline::RetryManager;
use acumen_infra_db::{JobQueue, Storage};
use acumen_infra_graph::KnowledgeGraph;
use acumen_infra_llm::EmbeddingProvider;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub queue: Arc<JobQueue>,
    pub retry: Arc<RetryManager>,
    pub graph: Arc<dyn KnowledgeGraph>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    /// Token maestro del guard de autenticación de /api.
    pub api_key: String,
}
