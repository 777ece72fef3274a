// [libs/domain/pipeline/src/worker.rs]
/*!
 * =================================================================
 * APARATO: PIPELINE WORKER ENGINE (V8.1 - LEASE LOOP)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: BUCLE DE DESPACHO, SELLADO Y APAGADO ORDENADO
 *
 * # Logic:
 * N tareas independientes sondean la cola por cada nombre registrado.
 * Un trabajo se procesa a término (incluido el I/O a LLM y grafo)
 * antes del siguiente arrendamiento. La señal de apagado deja que los
 * trabajos en vuelo terminen; la cola reclama los arrendamientos de
 * los workers caídos vía reaper.
 * =================================================================
 */

use crate::classifier::ErrorClassifier;
use crate::deps::Dependencies;
use crate::handlers::{dispatch, REGISTERED_JOB_NAMES};
use acumen_domain_models::{failed_status_for_stage, job_names, Job};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

const IDLE_POLL_DELAY_MS: u64 = 2_500;

pub struct WorkerEngine {
    deps: Dependencies,
    termination_signal: Arc<AtomicBool>,
}

impl WorkerEngine {
    pub fn new(deps: Dependencies, termination_signal: Arc<AtomicBool>) -> Self {
        Self { deps, termination_signal }
    }

    /// Enciende el pool de workers y bloquea hasta el apagado.
    pub async fn ignite(&self) {
        let worker_count = self.deps.config.worker_count.max(1);
        info!("🚀 [ENGINE]: Igniting {} pipeline worker(s).", worker_count);

        let mut worker_handles = Vec::with_capacity(worker_count);
        for worker_index in 0..worker_count {
            let deps = self.deps.clone();
            let signal = Arc::clone(&self.termination_signal);
            worker_handles.push(tokio::spawn(async move {
                worker_loop(worker_index, deps, signal).await;
            }));
        }

        for handle in worker_handles {
            if let Err(join_error) = handle.await {
                error!("🔥 [ENGINE]: Worker task collapsed: {}", join_error);
            }
        }

        info!("🛑 [ENGINE]: All workers drained; engine sealed.");
    }
}

async fn worker_loop(worker_index: usize, deps: Dependencies, signal: Arc<AtomicBool>) {
    info!("⚙️  [WORKER-{}]: Operational.", worker_index);

    loop {
        if signal.load(Ordering::SeqCst) {
            info!("⚙️  [WORKER-{}]: Termination acknowledged.", worker_index);
            break;
        }

        let mut processed_any = false;

        for job_name in REGISTERED_JOB_NAMES {
            if signal.load(Ordering::SeqCst) {
                break;
            }

            let leased = match deps.queue.dequeue(job_name, deps.config.dequeue_batch_size).await {
                Ok(jobs) => jobs,
                Err(dequeue_error) => {
                    // El bucle reintenta el dequeue en el próximo ciclo.
                    warn!(
                        "⚠️ [WORKER-{}]: Dequeue of [{}] failed: {}",
                        worker_index, job_name, dequeue_error
                    );
                    continue;
                }
            };

            for job in leased {
                processed_any = true;
                process_job(&deps, &job).await;
            }
        }

        if !processed_any {
            sleep(Duration::from_millis(IDLE_POLL_DELAY_MS)).await;
        }
    }
}

/// Etiqueta de etapa del trabajo, para el sellado de fallos terminales.
fn stage_label_for(job_name: &str) -> Option<&'static str> {
    match job_name {
        job_names::PARSE_DOCUMENT => Some("parsing"),
        job_names::INGEST_GRAPHITI => Some("graphiti_ingesting"),
        job_names::ANALYZE_DOCUMENT => Some("analyzing"),
        job_names::EXTRACT_FINANCIALS => Some("extracting_financials"),
        _ => None,
    }
}

/// Un trabajo a término: despacho -> complete | retry | failed.
#[instrument(skip(deps, job), fields(job_id = %job.id, job_name = %job.name))]
pub async fn process_job(deps: &Dependencies, job: &Job) {
    match dispatch(job, deps).await {
        Ok(output) => {
            if let Err(complete_error) = deps.queue.complete(&job.id, Some(output)).await {
                error!("⚠️ [WORKER]: Completion sealing failed: {}", complete_error);
            }
        }
        Err(stage_error) => {
            // El handler ya registró el fallo vía retry manager; aquí
            // solo se programa el destino del trabajo en la cola.
            let retryable = ErrorClassifier::new().is_retryable(&stage_error);

            if !retryable {
                // Corto-circuito permanente: sin reintentos programados.
                if let Err(fail_error) =
                    deps.queue.fail_permanently(&job.id, &stage_error.to_string()).await
                {
                    error!("⚠️ [WORKER]: Permanent sealing failed: {}", fail_error);
                }
                return;
            }

            let exhausted = job.retry_count >= job.retry_limit;
            if let Err(fail_error) = deps.queue.fail(&job.id, &stage_error.to_string()).await {
                error!("⚠️ [WORKER]: Failure sealing failed: {}", fail_error);
            }

            // Agotado el contrato de la cola, el documento queda sellado
            // con el estatus de fallo específico de su etapa.
            if exhausted {
                if let (Some(stage), Some(document_id)) =
                    (stage_label_for(&job.name), job.data["document_id"].as_str())
                {
                    let failed_status = failed_status_for_stage(stage);
                    if let Err(status_error) = deps
                        .storage
                        .documents
                        .update_document_status(document_id, failed_status.as_str())
                        .await
                    {
                        error!("⚠️ [WORKER]: Terminal status flip failed: {}", status_error);
                    } else {
                        warn!(
                            "🪦 [WORKER]: Document [{}] sealed as [{}] after queue exhaustion.",
                            document_id, failed_status
                        );
                    }
                }
            }
        }
    }
}
