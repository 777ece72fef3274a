// [apps/pipeline-worker/src/main.rs]
/*!
 * =================================================================
 * APARATO: PIPELINE WORKER SHELL (V6.2)
 * CLASIFICACIÓN: APPLICATION LAYER (ENTRY POINT)
 * RESPONSABILIDAD: BOOTSTRAP DE ENTORNO E IGNICIÓN DEL MOTOR
 *
 * # Flujo:
 * entorno -> observabilidad -> grafo de construcción de adaptadores ->
 * señales de terminación -> reaper + cronos semanal -> motor de workers.
 * =================================================================
 */

use acumen_domain_models::job_names;
use acumen_domain_pipeline::{
    Dependencies, ErrorClassifier, PipelineConfig, RetryManager, WorkerEngine,
};
use acumen_infra_blob::HttpBlobStore;
use acumen_infra_db::{JobQueue, Storage};
use acumen_infra_graph::GraphitiClient;
use acumen_infra_llm::{EmbeddingClient, GeminiClient, TierModelMap};
use acumen_shared_argus::init_tracing;
use anyhow::{Context, Result};
use chrono::{Datelike, Duration as ChronoDuration, TimeZone, Utc};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Directivas de mando del nodo de procesamiento.
#[derive(Parser, Debug)]
#[command(author = "Raz Podesta <metaShark Tech>", version, about = "Acumen Pipeline Worker Node")]
struct WorkerDirectives {
    /// URL del Ledger relacional (libSQL/Turso).
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Token de acceso para clusters remotos.
    #[arg(long, env = "DATABASE_AUTH_TOKEN")]
    database_auth_token: Option<String>,

    /// API key de Gemini (LLM + embedder de respaldo).
    #[arg(long, env = "GOOGLE_API_KEY")]
    google_api_key: String,

    /// API key de Voyage (embedder preferido, opcional).
    #[arg(long, env = "VOYAGE_API_KEY")]
    voyage_api_key: Option<String>,

    #[arg(long, env = "NEO4J_URI")]
    neo4j_uri: String,

    #[arg(long, env = "NEO4J_USER", default_value = "neo4j")]
    neo4j_user: String,

    #[arg(long, env = "NEO4J_PASSWORD")]
    neo4j_password: String,

    /// Gateway HTTP para resolver referencias gs://.
    #[arg(long, env = "BLOB_BASE_URL")]
    blob_base_url: Option<String>,

    /// Workers concurrentes; por defecto 5 acotado por los núcleos.
    #[arg(long, env = "WORKER_COUNT")]
    worker_count: Option<usize>,
}

const REAPER_TICK_SECONDS: u64 = 60;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("acumen_pipeline_worker");

    info!("💠 [SHELL]: Pipeline worker ignition sequence starting...");

    let directives = WorkerDirectives::parse();

    // 1. GRAFO DE CONSTRUCCIÓN: adaptadores explícitos en el arranque,
    // inyectados a los handlers (sin singletons perezosos).
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
            language_model.clone(),
            embeddings.clone(),
        )
        .await
        .context("GRAPH_FAULT: Neo4j uplink ignition failed")?,
    );

    let blobs = Arc::new(HttpBlobStore::new(directives.blob_base_url.clone()));

    let mut config = PipelineConfig::default();
    config.worker_count =
        directives.worker_count.unwrap_or_else(|| config.worker_count.min(num_cpus::get().max(1)));

    let retry = Arc::new(RetryManager::new(
        storage.clone(),
        queue.clone(),
        ErrorClassifier::new(),
    ));

    let deps = Dependencies {
        storage,
        queue: queue.clone(),
        retry,
        language_model,
        embeddings,
        graph,
        blobs,
        config: config.clone(),
    };

    // 2. SEÑAL DE TERMINACIÓN ORDENADA: los trabajos en vuelo terminan.
    let termination_signal = Arc::new(AtomicBool::new(false));
    let signal_reference = Arc::clone(&termination_signal);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ [SIGNAL]: Termination requested by host; draining in-flight jobs...");
            signal_reference.store(true, Ordering::SeqCst);
        }
    });

    // 3. REAPER: reclama arrendamientos expirados de workers caídos.
    {
        let reaper_queue = queue.clone();
        let reaper_signal = Arc::clone(&termination_signal);
        let visibility_timeout = config.visibility_timeout_seconds;
        tokio::spawn(async move {
            loop {
                if reaper_signal.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(reap_error) = reaper_queue.reclaim_expired(visibility_timeout).await {
                    warn!("⚠️ [REAPER]: Lease reclamation failed: {}", reap_error);
                }
                tokio::time::sleep(Duration::from_secs(REAPER_TICK_SECONDS)).await;
            }
        });
    }

    // 4. CRONOS: analítica de feedback cada domingo 02:00 UTC.
    {
        let chronos_queue = queue.clone();
        let chronos_signal = Arc::clone(&termination_signal);
        tokio::spawn(async move {
            loop {
                if chronos_signal.load(Ordering::SeqCst) {
                    break;
                }
                let wait = seconds_until_next_weekly_run();
                if wait > 3_600 {
                    tokio::time::sleep(Duration::from_secs(3_600)).await;
                    continue;
                }
                tokio::time::sleep(Duration::from_secs(wait)).await;

                match chronos_queue
                    .enqueue(
                        job_names::ANALYZE_FEEDBACK_ALL,
                        serde_json::json!({ "period_days": 7 }),
                        None,
                    )
                    .await
                {
                    Ok(job_id) => info!("🗓️  [CHRONOS]: Weekly feedback sweep enqueued [{}].", job_id),
                    Err(enqueue_error) => {
                        warn!("⚠️ [CHRONOS]: Weekly enqueue failed: {}", enqueue_error)
                    }
                }
                // Evita el doble disparo dentro de la misma ventana.
                tokio::time::sleep(Duration::from_secs(120)).await;
            }
        });
    }

    // 5. IGNICIÓN DEL MOTOR (bloqueante hasta el drenado final).
    let engine = WorkerEngine::new(deps, termination_signal);
    engine.ignite().await;

    info!("🏁 [SHELL]: Pipeline worker sealed. Goodbye.");
    Ok(())
}

/// Segundos hasta el próximo domingo 02:00 UTC.
fn seconds_until_next_weekly_run() -> u64 {
    let now = Utc::now();
    let days_ahead = (7 + 7 - now.weekday().num_days_from_monday() as i64 - 1) % 7;

    let mut target = Utc
        .with_ymd_and_hms(now.year(), now.month(), now.day(), 2, 0, 0)
        .single()
        .unwrap_or(now)
        + ChronoDuration::days(days_ahead);

    if target <= now {
        target += ChronoDuration::days(7);
    }

    (target - now).num_seconds().max(0) as u64
}
