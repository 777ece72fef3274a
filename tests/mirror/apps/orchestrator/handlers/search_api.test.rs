// [tests/mirror/apps/orchestrator/handlers/search_api.test.rs]
/**
 * =================================================================
 * APARATO: SIMILARITY SEARCH API TEST (V5.0)
 * CLASIFICACIÓN: E2E INTEGRATION / TRINITY EVIDENCE
 * RESPONSABILIDAD: CONTRATO HTTP DE GET /api/search/similar
 *
 * # Logic:
 * Certifica el guard bearer, el 422 por query en blanco, la forma del
 * resultado con scores en [0,1] y el scoping por project_id, con
 * Ledger en RAM y adaptadores guionados.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use acumen_domain_pipeline::{ErrorClassifier, RetryManager};
    use acumen_infra_db::{ChunkDraft, JobQueue, Storage};
    use acumen_infra_graph::{
        EpisodeRequest, FindingSync, GraphError, GraphSearchResult, KnowledgeGraph,
    };
    use acumen_infra_llm::{EmbeddingProvider, LlmError, Usage};
    use acumen_orchestrator::{create_router, AppState};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const TEST_API_KEY: &str = "sovereign_test_secret";

    struct ScriptedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ScriptedEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, Usage), LlmError> {
            // Vector determinista alineado con los fixtures sembrados.
            let vectors = texts
                .iter()
                .map(|text| {
                    if text.to_lowercase().contains("revenue") {
                        vec![1.0, 0.0, 0.0]
                    } else {
                        vec![0.0, 1.0, 0.0]
                    }
                })
                .collect();
            Ok((
                vectors,
                Usage {
                    input_tokens: 1,
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

    async fn setup_state(anchor: &str) -> (AppState, String, String) {
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

        // Dos chunks con embeddings ortogonales para un ranking nítido.
        storage
            .chunks
            .store_chunks_and_update_status(
                &document_id,
                &[
                    ChunkDraft {
                        content: "Revenue was $5.0M in Q3 2024, growing 20% YoY.".into(),
                        chunk_type: acumen_domain_models::ChunkType::Text,
                        chunk_index: 0,
                        page_number: Some(1),
                        sheet_name: None,
                        cell_reference: None,
                        token_count: Some(10),
                        metadata: json!({}),
                    },
                    ChunkDraft {
                        content: "The leadership team has deep sector experience.".into(),
                        chunk_type: acumen_domain_models::ChunkType::Text,
                        chunk_index: 1,
                        page_number: Some(2),
                        sheet_name: None,
                        cell_reference: None,
                        token_count: Some(8),
                        metadata: json!({}),
                    },
                ],
                "parsed",
            )
            .await
            .unwrap();

        let chunks = storage.chunks.get_chunks_by_document(&document_id).await.unwrap();
        storage
            .chunks
            .update_embeddings_and_status(
                &document_id,
                &[
                    (chunks[0].id.clone(), vec![1.0, 0.0, 0.0]),
                    (chunks[1].id.clone(), vec![0.0, 1.0, 0.0]),
                ],
                "graphiti_ingested",
            )
            .await
            .unwrap();

        let state = AppState {
            storage,
            queue,
            retry,
            graph: Arc::new(NullGraph),
            embeddings: Arc::new(ScriptedEmbedder),
            api_key: TEST_API_KEY.to_string(),
        };

        (state, deal_id, document_id)
    }

    async fn get(state: AppState, uri: &str, with_auth: bool) -> (StatusCode, Value) {
        let router = create_router(state);

        let mut request = Request::builder().uri(uri).method("GET");
        if with_auth {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", TEST_API_KEY));
        }

        let response =
            router.oneshot(request.body(Body::empty()).unwrap()).await.expect("dispatch");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = if bytes.is_empty() {
            json!({})
        } else {
            serde_json::from_slice(&bytes).unwrap_or(json!({}))
        };
        (status, body)
    }

    /**
     * CERTIFICACIÓN: sin bearer no hay servicio.
     */
    #[tokio::test]
    async fn certify_bearer_guard() {
        let (state, _, _) = setup_state("search_guard").await;
        let (status, _) = get(state, "/api/search/similar?query=revenue", false).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    /**
     * CERTIFICACIÓN: query ausente o en blanco -> 422.
     */
    #[tokio::test]
    async fn certify_blank_query_rejected() {
        let (state, _, _) = setup_state("search_blank").await;

        let (status, _) = get(state.clone(), "/api/search/similar", true).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = get(state, "/api/search/similar?query=%20%20", true).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    /**
     * CERTIFICACIÓN: forma del contrato y ranking por similitud.
     */
    #[tokio::test]
    async fn certify_result_shape_and_ranking() {
        let (state, deal_id, document_id) = setup_state("search_shape").await;

        let (status, body) = get(
            state,
            &format!("/api/search/similar?query=revenue&project_id={}", deal_id),
            true,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_results"], 2);

        let results = body["results"].as_array().unwrap();
        // El chunk de revenue rankea primero con score máximo.
        assert!(results[0]["content_preview"].as_str().unwrap().contains("Revenue"));
        for result in results {
            assert_eq!(result["document_id"], document_id.as_str());
            assert_eq!(result["project_id"], deal_id.as_str());
            assert_eq!(result["document_name"], "cim.pdf");
            let similarity = result["similarity"].as_f64().unwrap();
            assert!((0.0..=1.0).contains(&similarity));
            assert!(result["chunk_index"].is_i64());
            assert!(result.get("content_preview").is_some());
        }

        let top = results[0]["similarity"].as_f64().unwrap();
        let second = results[1]["similarity"].as_f64().unwrap();
        assert!(top > second, "ranking must be similarity-descending");
    }

    /**
     * CERTIFICACIÓN: limit acotado y filtro por documento.
     */
    #[tokio::test]
    async fn certify_limit_and_document_filter() {
        let (state, deal_id, document_id) = setup_state("search_limit").await;

        let (status, body) = get(
            state.clone(),
            &format!("/api/search/similar?query=revenue&project_id={}&limit=1", deal_id),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_results"], 1);

        let (status, body) = get(
            state,
            &format!("/api/search/similar?query=revenue&document_id={}", document_id),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_results"], 2);
    }

    /**
     * CERTIFICACIÓN: un deal ajeno no expone chunks de otro tenant.
     */
    #[tokio::test]
    async fn certify_project_scoping_blocks_foreign_deals() {
        let (state, _deal_id, _) = setup_state("search_scope").await;

        let (status, body) = get(
            state,
            "/api/search/similar?query=revenue&project_id=another-deal-entirely",
            true,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_results"], 0);
    }
}
