// [apps/orchestrator/src/bootstrap.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR BOOTSTRAP (V6.1)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: GRAFO DE CONSTRUCCIÓN EXPLÍCITO EN EL ARRANQUE
 *
 * Los clientes se construyen una vez y se inyectan; no hay singletons
 * perezosos. Los tests construyen su propio AppState con dobles.
 * =================================================================
 */

use crate::state::AppState;
use acumen_domain_pipeline::{ErrorClassifier, RetryManager};
use acumen_infra_db::{JobQueue, Storage};
use acumen_infra_graph::GraphitiClient;
use acumen_infra_llm::{EmbeddingClient, GeminiClient, TierModelMap};
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

/// Directivas de mando del centro de control.
#[derive(Parser, Debug)]
#[command(author = "Raz Podesta <metaShark Tech>", version, about = "Acumen Orchestrator")]
pub struct OrchestratorDirectives {
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "DATABASE_AUTH_TOKEN")]
    pub database_auth_token: Option<String>,

    #[arg(long, env = "GOOGLE_API_KEY")]
    pub google_api_key: String,

    #[arg(long, env = "VOYAGE_API_KEY")]
    pub voyage_api_key: Option<String>,

    #[arg(long, env = "NEO4J_URI")]
    pub neo4j_uri: String,

    #[arg(long, env = "NEO4J_USER", default_value = "neo4j")]
    pub neo4j_user: String,

    #[arg(long, env = "NEO4J_PASSWORD")]
    pub neo4j_password: String,

    /// Token maestro del guard HTTP.
    #[arg(long, env = "API_KEY")]
    pub api_key: String,

    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:8080")]
    pub bind_address: String,
}

pub async fn build_application_state(
    directives: &OrchestratorDirectives,
) -> Result<AppState> {
    let storage = Storage::connect(&directives.database_url, directives.database_auth_token.clone())
        .await
        .context("DB_FAULT: relational uplink ignition failed")?;

    let queue = Arc::new(JobQueue::new(storage.client.clone()));

    let language_model = Arc::new(
        GeminiClient::new(
            directives.google_api_key.clone(),
            TierModelMap::default(),
            Some("gemini-2.5-flash-lite".to_string()),
        )
        .context("LLM_FAULT: Gemini uplink ignition failed")?,
    );

    let embeddings = Arc::new(
        EmbeddingClient::new(directives.voyage_api_key.clone(), directives.google_api_key.clone())
            .context("EMBED_FAULT: embedding uplink ignition failed")?,
    );

    let graph = Arc::new(
        GraphitiClient::connect(
            &directives.neo4j_uri,
            &directives.neo4j_user,
            &directives.neo4j_password,
            language_model,
            embeddings.clone(),
        )
        .await
        .context("GRAPH_FAULT: Neo4j uplink ignition failed")?,
    );

    let retry = Arc::new(RetryManager::new(
        storage.clone(),
        queue.clone(),
        ErrorClassifier::new(),
    ));

    info!("🏗️  [BOOTSTRAP]: Construction graph levelized.");

    Ok(AppState {
        storage,
        queue,
        retry,
        graph,
        embeddings,
        api_key: directives.api_key.clone(),
    })
}
