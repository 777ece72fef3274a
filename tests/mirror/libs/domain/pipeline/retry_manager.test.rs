// [tests/mirror/libs/domain/pipeline/retry_manager.test.rs]
/**
 * =================================================================
 * APARATO: RETRY MANAGER CERTIFICATION (V6.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-PIPELINE)
 * RESPONSABILIDAD: CICLO COMPLETO DE DECISIÓN DE REINTENTOS
 *
 * # Logic:
 * Certifica sobre Ledger en RAM: registro de fallos clasificados,
 * cotas por etapa (3) y totales (10), enfriamiento del retry manual
 * (60s), mapa de etapa siguiente con su peculiaridad heredada y el
 * override sin-chunks, y el sellado del cursor fino.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use acumen_domain_models::{ChunkType, ErrorCategory, RetryHistoryEntry};
    use acumen_domain_pipeline::{
        ErrorClassifier, RetryManager, StageError, MANUAL_RETRY_COOLDOWN_SECONDS,
        MAX_RETRY_ATTEMPTS, MAX_TOTAL_RETRY_ATTEMPTS,
    };
    use acumen_infra_db::{ChunkDraft, JobQueue, Storage};
    use chrono::{Duration, Utc};
    use serde_json::json;
    use std::sync::Arc;

    struct Rig {
        storage: Storage,
        queue: Arc<JobQueue>,
        manager: RetryManager,
        document_id: String,
        deal_id: String,
    }

    async fn setup(anchor: &str) -> Rig {
        let storage =
            Storage::connect(&format!("file:{}?mode=memory&cache=shared", anchor), None)
                .await
                .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

        let organization_id = storage.tenancy.create_organization("Atlas Capital").await.unwrap();
        let deal_id =
            storage.tenancy.create_deal(&organization_id, "Project Borealis").await.unwrap();
        let document_id = storage
            .documents
            .create_document(&deal_id, "cim.pdf", "/tmp/cim.pdf", "application/pdf")
            .await
            .unwrap();

        let queue = Arc::new(JobQueue::new(storage.client.clone()));
        let manager =
            RetryManager::new(storage.clone(), queue.clone(), ErrorClassifier::new());

        Rig { storage, queue, manager, document_id, deal_id }
    }

    fn history_entry(attempt: i64, stage: &str, age_seconds: i64) -> RetryHistoryEntry {
        RetryHistoryEntry {
            attempt,
            stage: stage.to_string(),
            error_type: "timeout".into(),
            message: format!("attempt {}", attempt),
            timestamp: (Utc::now() - Duration::seconds(age_seconds)).to_rfc3339(),
        }
    }

    /**
     * CERTIFICACIÓN: fallo transitorio -> error persistido + historial,
     * sin tocar el estatus grueso (la cola reprograma).
     */
    #[tokio::test]
    async fn certify_transient_failure_records_without_status_flip() {
        let rig = setup("retry_transient").await;
        rig.storage.documents.update_document_status(&rig.document_id, "parsing").await.unwrap();

        let classified = rig
            .manager
            .handle_job_failure(
                &rig.document_id,
                &StageError::Other("Connection timeout".into()),
                "parsing",
                0,
            )
            .await
            .unwrap();

        assert_eq!(classified.category, ErrorCategory::Transient);
        assert!(classified.should_retry);

        let document =
            rig.storage.documents.get_document(&rig.document_id).await.unwrap().unwrap();
        // El estatus '*ing' queda intacto.
        assert_eq!(document.processing_status, "parsing");
        assert!(document.processing_error.is_some());

        let history = rig.storage.documents.get_retry_history(&rig.document_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].attempt, 1, "attempt = retry_count + 1");
        assert_eq!(history[0].stage, "parsing");
    }

    /**
     * CERTIFICACIÓN: fallo permanente -> estatus '{etapa}_failed'.
     */
    #[tokio::test]
    async fn certify_permanent_failure_seals_stage_status() {
        let rig = setup("retry_permanent").await;

        let classified = rig
            .manager
            .handle_job_failure(
                &rig.document_id,
                &StageError::Parse("File is password protected: cim.pdf".into()),
                "parsing",
                0,
            )
            .await
            .unwrap();

        assert_eq!(classified.category, ErrorCategory::Permanent);
        assert_eq!(classified.error_type, "encrypted_file");
        assert_eq!(classified.user_message, "File is password protected");

        let document =
            rig.storage.documents.get_document(&rig.document_id).await.unwrap().unwrap();
        assert_eq!(document.processing_status, "parsing_failed");

        // Variante de etapa de embedding.
        let rig2 = setup("retry_permanent_embed").await;
        rig2.manager
            .handle_job_failure(
                &rig2.document_id,
                &StageError::Other("401 unauthorized".into()),
                "embedding",
                0,
            )
            .await
            .unwrap();
        let document2 =
            rig2.storage.documents.get_document(&rig2.document_id).await.unwrap().unwrap();
        assert_eq!(document2.processing_status, "embedding_failed");
    }

    /**
     * CERTIFICACIÓN: exactamente MAX_RETRY_ATTEMPTS intentos por etapa;
     * el conteo solo observa la etapa consultada.
     */
    #[tokio::test]
    async fn certify_per_stage_attempt_boundary() {
        let rig = setup("retry_stage_cap").await;

        let (allowed, seen) =
            rig.manager.should_retry_stage(&rig.document_id, "parsing").await.unwrap();
        assert!(allowed);
        assert_eq!(seen, 0);

        // Dos intentos de parsing y uno de embedding.
        for entry in [
            history_entry(1, "parsing", 300),
            history_entry(2, "embedding", 200),
            history_entry(3, "parsing", 100),
        ] {
            rig.storage.documents.append_retry_history(&rig.document_id, entry).await.unwrap();
        }

        let (allowed, seen) =
            rig.manager.should_retry_stage(&rig.document_id, "parsing").await.unwrap();
        assert!(allowed, "2 < MAX_RETRY_ATTEMPTS");
        assert_eq!(seen, 2, "embedding attempts must not count");

        rig.storage
            .documents
            .append_retry_history(&rig.document_id, history_entry(4, "parsing", 90))
            .await
            .unwrap();

        let (allowed, seen) =
            rig.manager.should_retry_stage(&rig.document_id, "parsing").await.unwrap();
        assert!(!allowed, "at MAX_RETRY_ATTEMPTS retry is denied");
        assert_eq!(seen, MAX_RETRY_ATTEMPTS);
    }

    /**
     * CERTIFICACIÓN: retry manual — cota total, enfriamiento de 60s y
     * tolerancia a timestamps ilegibles.
     */
    #[tokio::test]
    async fn certify_manual_retry_gates() {
        // Sin historial: permitido.
        let rig = setup("retry_manual_empty").await;
        let (allowed, reason) = rig.manager.can_manual_retry(&rig.document_id).await.unwrap();
        assert!(allowed);
        assert!(reason.is_none());

        // Al tope total: denegado.
        let rig = setup("retry_manual_cap").await;
        for attempt in 1..=(MAX_TOTAL_RETRY_ATTEMPTS as i64) {
            rig.storage
                .documents
                .append_retry_history(
                    &rig.document_id,
                    history_entry(attempt, "parsing", 10_000 - attempt),
                )
                .await
                .unwrap();
        }
        let (allowed, reason) = rig.manager.can_manual_retry(&rig.document_id).await.unwrap();
        assert!(!allowed);
        assert!(reason.unwrap().contains("Maximum retry attempts"));

        // Dentro del enfriamiento: denegado con cuenta regresiva.
        let rig = setup("retry_manual_cooldown").await;
        rig.storage
            .documents
            .append_retry_history(&rig.document_id, history_entry(1, "parsing", 5))
            .await
            .unwrap();
        let (allowed, reason) = rig.manager.can_manual_retry(&rig.document_id).await.unwrap();
        assert!(!allowed);
        assert!(reason.unwrap().to_lowercase().contains("wait"));

        // Fuera del enfriamiento: permitido.
        let rig = setup("retry_manual_after").await;
        rig.storage
            .documents
            .append_retry_history(
                &rig.document_id,
                history_entry(1, "parsing", MANUAL_RETRY_COOLDOWN_SECONDS + 10),
            )
            .await
            .unwrap();
        let (allowed, _) = rig.manager.can_manual_retry(&rig.document_id).await.unwrap();
        assert!(allowed);

        // Timestamp ilegible: sin enfriamiento.
        let rig = setup("retry_manual_badts").await;
        rig.storage
            .documents
            .append_retry_history(
                &rig.document_id,
                RetryHistoryEntry {
                    attempt: 1,
                    stage: "parsing".into(),
                    error_type: "timeout".into(),
                    message: "attempt".into(),
                    timestamp: "not-a-valid-timestamp".into(),
                },
            )
            .await
            .unwrap();
        let (allowed, reason) = rig.manager.can_manual_retry(&rig.document_id).await.unwrap();
        assert!(allowed);
        assert!(reason.is_none());
    }

    /**
     * CERTIFICACIÓN: mapa cursor -> etapa siguiente, incluida la
     * peculiaridad heredada PENDING -> "embedding" y su override
     * cuando no existe parseo completo (sin chunks).
     */
    #[tokio::test]
    async fn certify_next_retry_stage_map() {
        let rig = setup("retry_next_stage").await;

        // Cursor ausente -> parsing.
        assert_eq!(
            rig.manager.get_next_retry_stage(&rig.document_id).await.unwrap().as_deref(),
            Some("parsing")
        );

        // Con chunks presentes la peculiaridad heredada aplica:
        // pending -> "embedding".
        rig.storage
            .chunks
            .store_chunks_and_update_status(
                &rig.document_id,
                &[ChunkDraft {
                    content: "body".into(),
                    chunk_type: ChunkType::Text,
                    chunk_index: 0,
                    page_number: Some(1),
                    sheet_name: None,
                    cell_reference: None,
                    token_count: Some(2),
                    metadata: json!({}),
                }],
                "parsed",
            )
            .await
            .unwrap();

        rig.storage.documents.update_document_stage(&rig.document_id, Some("pending")).await.unwrap();
        assert_eq!(
            rig.manager.get_next_retry_stage(&rig.document_id).await.unwrap().as_deref(),
            Some("embedding")
        );

        rig.storage.documents.update_document_stage(&rig.document_id, Some("parsed")).await.unwrap();
        assert_eq!(
            rig.manager.get_next_retry_stage(&rig.document_id).await.unwrap().as_deref(),
            Some("embedding")
        );

        rig.storage.documents.update_document_stage(&rig.document_id, Some("embedded")).await.unwrap();
        assert_eq!(
            rig.manager.get_next_retry_stage(&rig.document_id).await.unwrap().as_deref(),
            Some("analyzing")
        );

        rig.storage.documents.update_document_stage(&rig.document_id, Some("analyzed")).await.unwrap();
        assert!(rig.manager.get_next_retry_stage(&rig.document_id).await.unwrap().is_none());

        rig.storage.documents.update_document_stage(&rig.document_id, Some("complete")).await.unwrap();
        assert!(rig.manager.get_next_retry_stage(&rig.document_id).await.unwrap().is_none());

        // Cursor ilegible -> parsing.
        rig.storage
            .documents
            .update_document_stage(&rig.document_id, Some("invalid_stage"))
            .await
            .unwrap();
        assert_eq!(
            rig.manager.get_next_retry_stage(&rig.document_id).await.unwrap().as_deref(),
            Some("parsing")
        );
    }

    /**
     * CERTIFICACIÓN: override sin-chunks — un cursor que pediría
     * "embedding" cae a "parsing" si no hay parseo almacenado.
     */
    #[tokio::test]
    async fn certify_no_chunks_override_falls_back_to_parsing() {
        let rig = setup("retry_override").await;

        rig.storage.documents.update_document_stage(&rig.document_id, Some("pending")).await.unwrap();

        // Sin chunks: el override manda.
        assert_eq!(
            rig.manager.get_next_retry_stage(&rig.document_id).await.unwrap().as_deref(),
            Some("parsing")
        );
    }

    /**
     * CERTIFICACIÓN: enqueue_stage_retry limpia el error, marca
     * is_retry y mapea etapa -> trabajo.
     */
    #[tokio::test]
    async fn certify_enqueue_stage_retry_contract() {
        let rig = setup("retry_enqueue").await;

        rig.storage
            .documents
            .update_processing_error(&rig.document_id, &json!({ "category": "transient" }))
            .await
            .unwrap();

        let job_id = rig
            .manager
            .enqueue_stage_retry(&rig.document_id, "embedding", Some(&rig.deal_id), Some("user-1"))
            .await
            .unwrap()
            .expect("job enqueued");

        // Error limpiado antes del reintento.
        let document =
            rig.storage.documents.get_document(&rig.document_id).await.unwrap().unwrap();
        assert!(document.processing_error.is_none());

        // Etapa embedding -> trabajo ingest-graphiti con is_retry.
        let job = rig.queue.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.name, "ingest-graphiti");
        assert_eq!(job.data["is_retry"], true);
        assert_eq!(job.data["deal_id"], rig.deal_id);
        assert_eq!(job.data["user_id"], "user-1");

        // Etapas restantes del mapa.
        let parsing_job_id = rig
            .manager
            .enqueue_stage_retry(&rig.document_id, "parsing", None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rig.queue.get_job(&parsing_job_id).await.unwrap().unwrap().name, "parse-document");

        let analyzing_job_id = rig
            .manager
            .enqueue_stage_retry(&rig.document_id, "analyzing", None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            rig.queue.get_job(&analyzing_job_id).await.unwrap().unwrap().name,
            "analyze-document"
        );

        // Etiqueta inválida: nada encolado.
        assert!(rig
            .manager
            .enqueue_stage_retry(&rig.document_id, "invalid_stage", None, None)
            .await
            .unwrap()
            .is_none());
    }

    /**
     * CERTIFICACIÓN: prepare_stage_retry deja el estatus en '*ing' y
     * mark_stage_complete sella el cursor fino.
     */
    #[tokio::test]
    async fn certify_prepare_and_mark_stage() {
        let rig = setup("retry_prepare").await;

        assert!(rig.manager.prepare_stage_retry(&rig.document_id, "parsing").await.unwrap());
        let document =
            rig.storage.documents.get_document(&rig.document_id).await.unwrap().unwrap();
        assert_eq!(document.processing_status, "parsing");

        assert!(rig.manager.prepare_stage_retry(&rig.document_id, "embedding").await.unwrap());
        let document =
            rig.storage.documents.get_document(&rig.document_id).await.unwrap().unwrap();
        assert_eq!(document.processing_status, "embedding");

        // Sellado del cursor: parsing|parsed -> parsed, embedding ->
        // embedded, analyzing -> analyzed.
        rig.manager.mark_stage_complete(&rig.document_id, "parsing").await.unwrap();
        assert_eq!(
            rig.storage.documents.get_document_stage(&rig.document_id).await.unwrap().as_deref(),
            Some("parsed")
        );

        rig.manager.mark_stage_complete(&rig.document_id, "parsed").await.unwrap();
        assert_eq!(
            rig.storage.documents.get_document_stage(&rig.document_id).await.unwrap().as_deref(),
            Some("parsed")
        );

        rig.manager.mark_stage_complete(&rig.document_id, "embedding").await.unwrap();
        assert_eq!(
            rig.storage.documents.get_document_stage(&rig.document_id).await.unwrap().as_deref(),
            Some("embedded")
        );

        rig.manager.mark_stage_complete(&rig.document_id, "analyzing").await.unwrap();
        assert_eq!(
            rig.storage.documents.get_document_stage(&rig.document_id).await.unwrap().as_deref(),
            Some("analyzed")
        );

        // Etiquetas sin cursor propio no tocan nada.
        assert!(!rig.manager.mark_stage_complete(&rig.document_id, "contradiction_detection").await.unwrap());
    }
}
