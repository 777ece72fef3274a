// [apps/orchestrator/src/routes.rs]
/*!
 * =================================================================
 * APARATO: ROUTING MATRIX (V7.0)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: TOPOLOGÍA DE LA SUPERFICIE HTTP
 *
 * # Topología:
 * /health                        abierto (probes de plataforma)
 * /api/search/similar            búsqueda por similitud (guard bearer)
 * /api/graphiti/ingest           ingesta manual de grafo
 * /api/documents                 registro + ignición del pipeline
 * /api/documents/:id/retry       protocolo de retry manual
 * /api/queue/counts              observabilidad de la cola
 * =================================================================
 */

use crate::handlers::{documents, graph_ingest, search};
use crate::middleware::auth_guard;
use crate::state::AppState;
use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

pub fn create_router(application_shared_state: AppState) -> Router {
    let network_security_shield = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let api_stratum = Router::new()
        .route("/search/similar", get(search::handle_similar_search))
        .route("/graphiti/ingest", post(graph_ingest::handle_graph_ingest))
        .route("/documents", post(documents::handle_register_document))
        .route("/documents/:document_id/retry", post(documents::handle_manual_retry))
        .route("/queue/counts", get(documents::handle_queue_counts))
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), auth_guard));

    Router::new()
        .route("/health", get(|| async { "STATUS_OK" }))
        .nest("/api", api_stratum)
        .layer(network_security_shield)
        .with_state(application_shared_state)
}
