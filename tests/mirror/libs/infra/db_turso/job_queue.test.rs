// [tests/mirror/libs/infra/db_turso/job_queue.test.rs]
/**
 * =================================================================
 * APARATO: JOB QUEUE INTEGRITY TEST (V5.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-DB)
 * RESPONSABILIDAD: CERTIFICACIÓN DEL LEDGER DE TRABAJOS DURABLE
 *
 * # Logic:
 * Valida el ciclo created -> active -> (completed | retry | failed),
 * el backoff exponencial delay * 2^retry_count, la reclamación
 * exclusiva y el reaper de arrendamientos expirados. Ledger en RAM.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use acumen_domain_models::{EnqueueOptions, JobState};
    use acumen_infra_db::{default_job_options, JobQueue, TursoClient};
    use chrono::Utc;
    use serde_json::json;

    async fn setup_queue(anchor: &str) -> (JobQueue, TursoClient) {
        let client = TursoClient::connect(
            &format!("file:{}?mode=memory&cache=shared", anchor),
            None,
        )
        .await
        .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        (JobQueue::new(client.clone()), client)
    }

    /// Adelanta start_after para que el trabajo vuelva a ser elegible.
    async fn force_eligible(client: &TursoClient, job_id: &str) {
        let connection = client.get_connection().expect("connection");
        connection
            .execute(
                "UPDATE jobs SET start_after = '1970-01-01T00:00:00+00:00' WHERE id = ?1",
                libsql::params![job_id],
            )
            .await
            .expect("eligibility rewind");
    }

    /**
     * CERTIFICACIÓN: Encolado con defaults indexados por nombre.
     */
    #[tokio::test]
    async fn certify_enqueue_uses_named_defaults() {
        let (queue, _client) = setup_queue("queue_defaults").await;

        let job_id = queue
            .enqueue("parse-document", json!({ "document_id": "doc-1" }), None)
            .await
            .expect("enqueue");

        // Forma UUID del identificador.
        assert_eq!(job_id.len(), 36);

        let job = queue.get_job(&job_id).await.expect("fetch").expect("present");
        assert_eq!(job.state, JobState::Created);
        assert_eq!(job.priority, default_job_options("parse-document").priority);
        assert_eq!(job.retry_limit, 3);
        assert!(job.retry_backoff);
        assert_eq!(job.data["document_id"], "doc-1");
    }

    /**
     * CERTIFICACIÓN: Opciones explícitas sobreescriben campo a campo.
     */
    #[tokio::test]
    async fn certify_explicit_options_override_defaults() {
        let (queue, _client) = setup_queue("queue_overrides").await;

        let job_id = queue
            .enqueue(
                "parse-document",
                json!({}),
                Some(EnqueueOptions {
                    priority: Some(10),
                    retry_limit: Some(5),
                    retry_delay: Some(60),
                    retry_backoff: Some(false),
                    start_after_seconds: None,
                }),
            )
            .await
            .expect("enqueue");

        let job = queue.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.priority, 10);
        assert_eq!(job.retry_limit, 5);
        assert_eq!(job.retry_delay, 60);
        assert!(!job.retry_backoff);
    }

    /**
     * CERTIFICACIÓN: El dequeue despacha por prioridad y antigüedad,
     * y dos dequeues consecutivos jamás entregan la misma fila.
     */
    #[tokio::test]
    async fn certify_dequeue_claims_exclusively_by_priority() {
        let (queue, _client) = setup_queue("queue_claims").await;

        let low = queue
            .enqueue("test-job", json!({"seq": "low"}), Some(EnqueueOptions::with_priority(1)))
            .await
            .unwrap();
        let high = queue
            .enqueue("test-job", json!({"seq": "high"}), Some(EnqueueOptions::with_priority(9)))
            .await
            .unwrap();

        let first_batch = queue.dequeue("test-job", 1).await.expect("dequeue");
        assert_eq!(first_batch.len(), 1);
        assert_eq!(first_batch[0].id, high, "higher priority dispatches first");
        assert_eq!(first_batch[0].state, JobState::Active);
        assert!(first_batch[0].started_on.is_some());

        let second_batch = queue.dequeue("test-job", 5).await.expect("dequeue");
        assert_eq!(second_batch.len(), 1);
        assert_eq!(second_batch[0].id, low, "claimed row never re-dispatched");

        // La cola quedó drenada.
        assert!(queue.dequeue("test-job", 5).await.unwrap().is_empty());
    }

    /**
     * CERTIFICACIÓN: start_after pospone la elegibilidad.
     */
    #[tokio::test]
    async fn certify_delayed_jobs_are_not_dispatched_early() {
        let (queue, _client) = setup_queue("queue_delay").await;

        queue
            .enqueue(
                "test-job",
                json!({}),
                Some(EnqueueOptions {
                    start_after_seconds: Some(3_600),
                    ..EnqueueOptions::default()
                }),
            )
            .await
            .unwrap();

        assert!(queue.dequeue("test-job", 5).await.unwrap().is_empty());
    }

    /**
     * CERTIFICACIÓN: fail bajo el límite reprograma con backoff
     * exponencial; el delay de la tercera falla es delay * 2^2.
     */
    #[tokio::test]
    async fn certify_fail_schedules_exponential_backoff() {
        let (queue, client) = setup_queue("queue_backoff").await;

        let job_id = queue
            .enqueue(
                "test-job",
                json!({}),
                Some(EnqueueOptions {
                    retry_limit: Some(5),
                    retry_delay: Some(10),
                    retry_backoff: Some(true),
                    ..EnqueueOptions::default()
                }),
            )
            .await
            .unwrap();

        // Dos fallas previas para posicionar retry_count = 2.
        for _ in 0..2 {
            let leased = queue.dequeue("test-job", 1).await.unwrap();
            assert_eq!(leased.len(), 1);
            queue.fail(&job_id, "socket error").await.unwrap();
            // Re-habilitamos la elegibilidad inmediata para el test.
            let job = queue.get_job(&job_id).await.unwrap().unwrap();
            assert_eq!(job.state, JobState::Retry);
            force_eligible(&client, &job_id).await;
        }

        let leased = queue.dequeue("test-job", 1).await.unwrap();
        assert_eq!(leased.len(), 1);
        let before_failure = Utc::now();
        queue.fail(&job_id, "socket error").await.unwrap();

        let job = queue.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Retry);
        assert_eq!(job.retry_count, 3);

        // retry_count era 2 al fallar: delay = 10 * 2^2 = 40s.
        let scheduled_delay = (job.start_after - before_failure).num_seconds();
        assert!(
            (38..=42).contains(&scheduled_delay),
            "expected ~40s backoff, got {}s",
            scheduled_delay
        );
    }

    /**
     * CERTIFICACIÓN: al agotar el contrato la falla es terminal.
     */
    #[tokio::test]
    async fn certify_exhausted_contract_is_terminal() {
        let (queue, client) = setup_queue("queue_terminal").await;

        let job_id = queue
            .enqueue(
                "test-job",
                json!({}),
                Some(EnqueueOptions {
                    retry_limit: Some(1),
                    retry_delay: Some(1),
                    retry_backoff: Some(false),
                    ..EnqueueOptions::default()
                }),
            )
            .await
            .unwrap();

        queue.dequeue("test-job", 1).await.unwrap();
        queue.fail(&job_id, "timeout").await.unwrap();
        force_eligible(&client, &job_id).await;

        queue.dequeue("test-job", 1).await.unwrap();
        queue.fail(&job_id, "timeout").await.unwrap();

        let job = queue.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert!(job.state.is_terminal());
        assert!(job.completed_on.is_some());
        assert_eq!(job.last_error.as_deref(), Some("timeout"));
    }

    /**
     * CERTIFICACIÓN: el corto-circuito permanente sella sin consumir
     * el contrato de reintentos.
     */
    #[tokio::test]
    async fn certify_permanent_short_circuit() {
        let (queue, _client) = setup_queue("queue_permanent").await;

        let job_id = queue.enqueue("test-job", json!({}), None).await.unwrap();
        queue.dequeue("test-job", 1).await.unwrap();
        queue.fail_permanently(&job_id, "file is password protected").await.unwrap();

        let job = queue.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.retry_count, 0, "no retry slot consumed");
    }

    /**
     * CERTIFICACIÓN: complete sella con salida y timestamp.
     */
    #[tokio::test]
    async fn certify_complete_stores_output() {
        let (queue, _client) = setup_queue("queue_complete").await;

        let job_id = queue.enqueue("test-job", json!({}), None).await.unwrap();
        queue.dequeue("test-job", 1).await.unwrap();
        queue.complete(&job_id, Some(json!({ "result": "success", "count": 42 }))).await.unwrap();

        let job = queue.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert!(job.completed_on.is_some());
        assert_eq!(job.output.unwrap()["count"], 42);
    }

    /**
     * CERTIFICACIÓN: conteos agrupados por (nombre, estado).
     */
    #[tokio::test]
    async fn certify_queue_counts_group_by_name_and_state() {
        let (queue, _client) = setup_queue("queue_counts").await;

        assert!(queue.queue_counts().await.unwrap().is_empty());

        queue.enqueue("parse-document", json!({}), None).await.unwrap();
        queue.enqueue("parse-document", json!({}), None).await.unwrap();
        let done = queue.enqueue("analyze-document", json!({}), None).await.unwrap();
        queue.dequeue("analyze-document", 1).await.unwrap();
        queue.complete(&done, None).await.unwrap();

        let counts = queue.queue_counts().await.unwrap();
        assert_eq!(counts["parse-document"]["created"], 2);
        assert_eq!(counts["analyze-document"]["completed"], 1);
    }

    /**
     * CERTIFICACIÓN: el reaper devuelve a 'retry' los arrendamientos
     * expirados de workers caídos.
     */
    #[tokio::test]
    async fn certify_reaper_reclaims_expired_leases() {
        let (queue, _client) = setup_queue("queue_reaper").await;

        let job_id = queue.enqueue("test-job", json!({}), None).await.unwrap();
        queue.dequeue("test-job", 1).await.unwrap();

        // Con timeout 0, el arrendamiento recién tomado ya expiró.
        let reclaimed = queue.reclaim_expired(0).await.unwrap();
        assert_eq!(reclaimed, 1);

        let job = queue.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Retry);
    }

}
