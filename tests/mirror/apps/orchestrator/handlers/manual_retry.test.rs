// [tests/mirror/apps/orchestrator/handlers/manual_retry.test.rs]
/**
 * =================================================================
 * APARATO: MANUAL RETRY API TEST (V4.0)
 * CLASIFICACIÓN: E2E INTEGRATION / TRINITY EVIDENCE
 * RESPONSABILIDAD: PROTOCOLO HTTP DE POST /api/documents/:id/retry
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use acumen_domain_models::RetryHistoryEntry;
    use acumen_domain_pipeline::{ErrorClassifier, RetryManager};
    use acumen_infra_db::{JobQueue, Storage};
    use acumen_infra_graph::{
        EpisodeRequest, FindingSync, GraphError, GraphSearchResult, KnowledgeGraph,
    };
    use acumen_infra_llm::{EmbeddingProvider, LlmError, Usage};
    use acumen_orchestrator::{create_router, AppState};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const TEST_API_KEY: &str = "sovereign_test_secret";

    struct NullEmbedder;

    #[async_trait]
    impl EmbeddingProvider for NullEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, Usage), LlmError> {
            Ok((
                texts.iter().map(|_| vec![1.0]).collect(),
                Usage {
                    input_tokens: 0,
                    output_tokens: 0,
                    provider: "voyage".into(),
                    model: "voyage-3.5".into(),
                },
            ))
        }
    }

    struct NullGraph;

    #[async_trait]
    impl KnowledgeGraph for NullGraph {
        async fn add_episode(&self, _request: EpisodeRequest) -> Result<(), GraphError> {
            Ok(())
        }
        async fn search(
            &self,
            _deal_id: &str,
            _organization_id: &str,
            _search_query: &str,
            _num_results: usize,
        ) -> Result<Vec<GraphSearchResult>, GraphError> {
            Ok(Vec::new())
        }
        async fn sync_finding(
            &self,
            _deal_id: &str,
            _organization_id: &str,
            _finding: &FindingSync,
        ) -> Result<(), GraphError> {
            Ok(())
        }
        async fn close(&self) -> Result<(), GraphError> {
            Ok(())
        }
    }

    async fn setup(anchor: &str) -> (AppState, Storage, Arc<JobQueue>, String) {
        let storage =
            Storage::connect(&format!("file:{}?mode=memory&cache=shared", anchor), None)
                .await
                .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

        let queue = Arc::new(JobQueue::new(storage.client.clone()));
        let retry = Arc::new(RetryManager::new(
            storage.clone(),
            queue.clone(),
            ErrorClassifier::new(),
        ));

        let organization_id = storage.tenancy.create_organization("Atlas Capital").await.unwrap();
        let deal_id =
            storage.tenancy.create_deal(&organization_id, "Project Borealis").await.unwrap();
        let document_id = storage
            .documents
            .create_document(&deal_id, "cim.pdf", "/tmp/cim.pdf", "application/pdf")
            .await
            .unwrap();

        let state = AppState {
            storage: storage.clone(),
            queue: queue.clone(),
            retry,
            graph: Arc::new(NullGraph),
            embeddings: Arc::new(NullEmbedder),
            api_key: TEST_API_KEY.to_string(),
        };

        (state, storage, queue, document_id)
    }

    async fn post_retry(state: AppState, document_id: &str) -> (StatusCode, Value) {
        let router = create_router(state);
        let request = Request::builder()
            .uri(format!("/api/documents/{}/retry", document_id))
            .method("POST")
            .header(header::AUTHORIZATION, format!("Bearer {}", TEST_API_KEY))
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.expect("dispatch");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap_or(json!({}));
        (status, body)
    }

    /**
     * CERTIFICACIÓN: documento fresco sin parseo -> retry de parsing,
     * trabajo parse-document encolado con is_retry.
     */
    #[tokio::test]
    async fn certify_retry_enqueues_mapped_stage_job() {
        let (state, storage, queue, document_id) = setup("manual_retry_ok").await;

        let (status, body) = post_retry(state, &document_id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allowed"], true);
        assert_eq!(body["stage"], "parsing");

        let job_id = body["job_id"].as_str().expect("job id present");
        let job = queue.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.name, "parse-document");
        assert_eq!(job.data["is_retry"], true);

        // prepare_stage_retry dejó el estatus en '*ing'.
        let document = storage.documents.get_document(&document_id).await.unwrap().unwrap();
        assert_eq!(document.processing_status, "parsing");
    }

    /**
     * CERTIFICACIÓN: dentro de la ventana de enfriamiento -> 429.
     */
    #[tokio::test]
    async fn certify_cooldown_denial() {
        let (state, storage, _queue, document_id) = setup("manual_retry_cooldown").await;

        storage
            .documents
            .append_retry_history(
                &document_id,
                RetryHistoryEntry {
                    attempt: 1,
                    stage: "parsing".into(),
                    error_type: "timeout".into(),
                    message: "recent attempt".into(),
                    timestamp: Utc::now().to_rfc3339(),
                },
            )
            .await
            .unwrap();

        let (status, body) = post_retry(state, &document_id).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["allowed"], false);
        assert!(body["reason"].as_str().unwrap().to_lowercase().contains("wait"));
    }

    /**
     * CERTIFICACIÓN: tras el enfriamiento el retry vuelve a fluir.
     */
    #[tokio::test]
    async fn certify_retry_allowed_after_cooldown() {
        let (state, storage, _queue, document_id) = setup("manual_retry_after").await;

        storage
            .documents
            .append_retry_history(
                &document_id,
                RetryHistoryEntry {
                    attempt: 1,
                    stage: "parsing".into(),
                    error_type: "timeout".into(),
                    message: "old attempt".into(),
                    timestamp: (Utc::now() - Duration::seconds(120)).to_rfc3339(),
                },
            )
            .await
            .unwrap();

        let (status, body) = post_retry(state, &document_id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allowed"], true);
    }

    /**
     * CERTIFICACIÓN: documento completo -> 409, nada que reintentar.
     */
    #[tokio::test]
    async fn certify_complete_document_conflicts() {
        let (state, storage, _queue, document_id) = setup("manual_retry_complete").await;

        storage.documents.update_document_stage(&document_id, Some("complete")).await.unwrap();

        let (status, body) = post_retry(state, &document_id).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["allowed"], false);
    }

    /**
     * CERTIFICACIÓN: documento inexistente -> 404.
     */
    #[tokio::test]
    async fn certify_unknown_document_not_found() {
        let (state, _storage, _queue, _document_id) = setup("manual_retry_missing").await;

        let (status, _) = post_retry(state, "00000000-0000-0000-0000-000000000000").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
