// [tests/mirror/libs/infra/db_turso/chunk_store.test.rs]
/**
 * =================================================================
 * APARATO: CHUNK STORE INTEGRITY TEST (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-DB)
 * RESPONSABILIDAD: IDEMPOTENCIA ATÓMICA Y METADATOS DE RETRY
 *
 * # Logic:
 * 1. store_chunks_and_update_status re-ejecutado con el mismo payload
 *    produce el mismo conjunto (delete-then-insert).
 * 2. retry_history queda acotado a 10, newest-first.
 * 3. Todo chunk resuelve el camino deal -> organization.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use acumen_domain_models::{ChunkType, RetryHistoryEntry};
    use acumen_infra_db::{ChunkDraft, Storage};
    use serde_json::json;

    async fn setup_storage(anchor: &str) -> Storage {
        Storage::connect(&format!("file:{}?mode=memory&cache=shared", anchor), None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.")
    }

    async fn seed_document(storage: &Storage) -> (String, String, String) {
        let organization_id =
            storage.tenancy.create_organization("Atlas Capital").await.unwrap();
        let deal_id =
            storage.tenancy.create_deal(&organization_id, "Project Borealis").await.unwrap();
        let document_id = storage
            .documents
            .create_document(&deal_id, "cim.pdf", "/tmp/cim.pdf", "application/pdf")
            .await
            .unwrap();
        (organization_id, deal_id, document_id)
    }

    fn draft(index: i64, content: &str) -> ChunkDraft {
        ChunkDraft {
            content: content.to_string(),
            chunk_type: ChunkType::Text,
            chunk_index: index,
            page_number: Some(index + 1),
            sheet_name: None,
            cell_reference: None,
            token_count: Some(12),
            metadata: json!({ "source_file": "cim.pdf" }),
        }
    }

    /**
     * CERTIFICACIÓN: reejecución idéntica -> conjunto idéntico.
     */
    #[tokio::test]
    async fn certify_chunk_swap_is_idempotent() {
        let storage = setup_storage("chunks_idempotent").await;
        let (_org, _deal, document_id) = seed_document(&storage).await;

        let drafts = vec![draft(0, "First page."), draft(1, "Second page.")];

        let first = storage
            .chunks
            .store_chunks_and_update_status(&document_id, &drafts, "parsed")
            .await
            .unwrap();
        assert_eq!(first, 2);

        // Segunda corrida con el mismo payload: mismo conjunto, sin
        // duplicados acumulados.
        let second = storage
            .chunks
            .store_chunks_and_update_status(&document_id, &drafts, "parsed")
            .await
            .unwrap();
        assert_eq!(second, 2);

        let stored = storage.chunks.get_chunks_by_document(&document_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].chunk_index, 0);
        assert_eq!(stored[1].chunk_index, 1);
        assert_eq!(stored[0].content, "First page.");

        let document = storage.documents.get_document(&document_id).await.unwrap().unwrap();
        assert_eq!(document.processing_status, "parsed");
    }

    /**
     * CERTIFICACIÓN: embeddings + estatus en una transacción.
     */
    #[tokio::test]
    async fn certify_embeddings_update_is_atomic() {
        let storage = setup_storage("chunks_embeddings").await;
        let (_org, _deal, document_id) = seed_document(&storage).await;

        storage
            .chunks
            .store_chunks_and_update_status(&document_id, &[draft(0, "Alpha Corp revenue 100")], "parsed")
            .await
            .unwrap();

        let stored = storage.chunks.get_chunks_by_document(&document_id).await.unwrap();
        let pairs = vec![(stored[0].id.clone(), vec![0.1_f32, 0.2, 0.3])];

        storage
            .chunks
            .update_embeddings_and_status(&document_id, &pairs, "graphiti_ingested")
            .await
            .unwrap();

        let refreshed = storage.chunks.get_chunks_by_document(&document_id).await.unwrap();
        assert_eq!(refreshed[0].embedding.as_ref().unwrap().len(), 3);

        let document = storage.documents.get_document(&document_id).await.unwrap().unwrap();
        assert_eq!(document.processing_status, "graphiti_ingested");
    }

    /**
     * CERTIFICACIÓN: camino de tenencia resoluble para todo chunk.
     */
    #[tokio::test]
    async fn certify_chunk_resolves_tenancy_path() {
        let storage = setup_storage("chunks_tenancy").await;
        let (organization_id, deal_id, document_id) = seed_document(&storage).await;

        storage
            .chunks
            .store_chunks_and_update_status(&document_id, &[draft(0, "content")], "parsed")
            .await
            .unwrap();

        let document = storage.documents.get_document(&document_id).await.unwrap().unwrap();
        assert_eq!(document.deal_id, deal_id);

        let resolved_org =
            storage.tenancy.get_organization_id_for_deal(&document.deal_id).await.unwrap();
        assert_eq!(resolved_org, organization_id);
    }

    /**
     * CERTIFICACIÓN: historial acotado a 10, newest-first.
     */
    #[tokio::test]
    async fn certify_retry_history_bounded_newest_first() {
        let storage = setup_storage("chunks_history").await;
        let (_org, _deal, document_id) = seed_document(&storage).await;

        for attempt in 1..=13_i64 {
            storage
                .documents
                .append_retry_history(
                    &document_id,
                    RetryHistoryEntry {
                        attempt,
                        stage: "parsing".into(),
                        error_type: "timeout".into(),
                        message: format!("attempt {}", attempt),
                        timestamp: format!("2026-07-01T00:00:{:02}+00:00", attempt),
                    },
                )
                .await
                .unwrap();
        }

        let history = storage.documents.get_retry_history(&document_id).await.unwrap();
        assert_eq!(history.len(), 10, "history bounded at 10 entries");

        // Newest-first por timestamp descendente.
        for window in history.windows(2) {
            assert!(window[0].timestamp >= window[1].timestamp);
        }
        assert_eq!(history[0].attempt, 13);
    }

    /**
     * CERTIFICACIÓN: clear_stage_data retrocede el cursor un paso.
     */
    #[tokio::test]
    async fn certify_clear_stage_data_rewinds_cursor() {
        let storage = setup_storage("chunks_clear").await;
        let (_org, _deal, document_id) = seed_document(&storage).await;

        storage
            .chunks
            .store_chunks_and_update_status(&document_id, &[draft(0, "body")], "parsed")
            .await
            .unwrap();
        storage.documents.update_document_stage(&document_id, Some("embedded")).await.unwrap();

        // Retry de embedding: embeddings anulados, cursor a 'parsed'.
        storage.documents.clear_stage_data(&document_id, "embedding").await.unwrap();

        let stage = storage.documents.get_document_stage(&document_id).await.unwrap();
        assert_eq!(stage.as_deref(), Some("parsed"));

        let chunks = storage.chunks.get_chunks_by_document(&document_id).await.unwrap();
        assert_eq!(chunks.len(), 1, "chunks survive an embedding reset");
        assert!(chunks[0].embedding.is_none());

        // Retry de parseo: chunks fuera, cursor a NULL.
        storage.documents.clear_stage_data(&document_id, "parsing").await.unwrap();
        assert!(storage.documents.get_document_stage(&document_id).await.unwrap().is_none());
        assert!(storage.chunks.get_chunks_by_document(&document_id).await.unwrap().is_empty());
    }
}
