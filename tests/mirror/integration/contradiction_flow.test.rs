// [tests/mirror/integration/contradiction_flow.test.rs]
/**
 * =================================================================
 * APARATO: CONTRADICTION FLOW CERTIFICATION (V5.0)
 * CLASIFICACIÓN: E2E INTEGRATION / TRINITY EVIDENCE
 * RESPONSABILIDAD: DETECCIÓN DEAL-WIDE CON DEDUPLICACIÓN DE CONJUNTO
 *
 * # Logic:
 * Dos hallazgos financieros con cifras incompatibles para el mismo
 * período, desde chunks distintos, producen exactamente una
 * contradicción 'unresolved' con confianza >= 0.70. Corridas
 * repetidas no duplican el par.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use acumen_domain_models::{job_names, ChunkType, FindingDomain, FindingDraft, FindingType};
    use acumen_domain_pipeline::{
        process_job, Dependencies, ErrorClassifier, PipelineConfig, RetryManager,
    };
    use acumen_infra_blob::HttpBlobStore;
    use acumen_infra_db::{ChunkDraft, JobQueue, Storage};
    use acumen_infra_graph::{
        EpisodeRequest, FindingSync, GraphError, GraphSearchResult, KnowledgeGraph,
    };
    use acumen_infra_llm::{EmbeddingProvider, LanguageModel, LlmError, ModelTier, Usage};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct ComparisonModel;

    #[async_trait]
    impl LanguageModel for ComparisonModel {
        async fn run(
            &self,
            prompt: &str,
            _system_prompt: Option<&str>,
            tier: ModelTier,
        ) -> Result<(String, Usage), LlmError> {
            // La comparación de pares corre en el nivel PRO.
            assert!(
                !prompt.contains("Compare the following pairs") || tier == ModelTier::Pro,
                "pair comparison must use the PRO tier"
            );

            let response = if prompt.contains("Compare the following pairs") {
                r#"[{"pair": 1, "contradicts": true, "confidence": 0.85,
                     "reason": "Same metric and period with incompatible values"}]"#
                    .to_string()
            } else {
                "[]".to_string()
            };

            Ok((
                response,
                Usage {
                    input_tokens: 200,
                    output_tokens: 40,
                    provider: "gemini".into(),
                    model: "gemini-2.5-pro".into(),
                },
            ))
        }
    }

    struct NullEmbedder;

    #[async_trait]
    impl EmbeddingProvider for NullEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, Usage), LlmError> {
            Ok((
                texts.iter().map(|_| vec![1.0, 0.0]).collect(),
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

    async fn setup(anchor: &str) -> (Dependencies, Storage, Arc<JobQueue>, String) {
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

        let deps = Dependencies {
            storage: storage.clone(),
            queue: queue.clone(),
            retry,
            language_model: Arc::new(ComparisonModel),
            embeddings: Arc::new(NullEmbedder),
            graph: Arc::new(NullGraph),
            blobs: Arc::new(HttpBlobStore::new(None)),
            config: PipelineConfig::default(),
        };

        // Deal con dos hallazgos financieros incompatibles, originados
        // en chunks distintos, con el mismo período referenciado.
        let organization_id = storage.tenancy.create_organization("Atlas Capital").await.unwrap();
        let deal_id =
            storage.tenancy.create_deal(&organization_id, "Project Borealis").await.unwrap();
        let document_id = storage
            .documents
            .create_document(&deal_id, "report.pdf", "/tmp/report.pdf", "application/pdf")
            .await
            .unwrap();

        let chunk_drafts: Vec<ChunkDraft> = (0..2)
            .map(|i| ChunkDraft {
                content: format!("chunk body {}", i),
                chunk_type: ChunkType::Text,
                chunk_index: i,
                page_number: Some(i + 1),
                sheet_name: None,
                cell_reference: None,
                token_count: Some(3),
                metadata: json!({}),
            })
            .collect();
        storage
            .chunks
            .store_chunks_and_update_status(&document_id, &chunk_drafts, "parsed")
            .await
            .unwrap();
        let chunks = storage.chunks.get_chunks_by_document(&document_id).await.unwrap();

        let findings = vec![
            FindingDraft {
                deal_id: deal_id.clone(),
                document_id: document_id.clone(),
                chunk_id: Some(chunks[0].id.clone()),
                text: "Revenue was $5.0M in Q3 2024".into(),
                finding_type: FindingType::Metric,
                domain: FindingDomain::Financial,
                confidence: 0.9,
                metadata: json!({ "date_referenced": "Q3 2024" }),
            },
            FindingDraft {
                deal_id: deal_id.clone(),
                document_id: document_id.clone(),
                chunk_id: Some(chunks[1].id.clone()),
                text: "Revenue was $3.5M in Q3 2024".into(),
                finding_type: FindingType::Metric,
                domain: FindingDomain::Financial,
                confidence: 0.9,
                metadata: json!({ "date_referenced": "Q3 2024" }),
            },
        ];
        storage
            .findings
            .store_findings_and_update_status(&document_id, &findings, "analyzed")
            .await
            .unwrap();

        (deps, storage, queue, deal_id)
    }

    async fn run_detection(deps: &Dependencies, queue: &JobQueue, deal_id: &str) {
        queue
            .enqueue(job_names::DETECT_CONTRADICTIONS, json!({ "deal_id": deal_id }), None)
            .await
            .unwrap();

        let jobs = queue.dequeue(job_names::DETECT_CONTRADICTIONS, 5).await.unwrap();
        assert_eq!(jobs.len(), 1);
        process_job(deps, &jobs[0]).await;
    }

    /**
     * CERTIFICACIÓN: exactamente una contradicción por par no ordenado,
     * estable frente a corridas repetidas.
     */
    #[tokio::test]
    async fn certify_contradiction_detected_once() {
        println!("\n🔍 [AUDIT]: Initiating contradiction-flow certification...");

        let (deps, storage, queue, deal_id) = setup("contradiction_flow").await;

        run_detection(&deps, &queue, &deal_id).await;

        let rows = storage.contradictions.get_contradictions_by_deal(&deal_id).await.unwrap();
        assert_eq!(rows.len(), 1, "exactly one contradiction row");
        assert_eq!(rows[0].status, "unresolved");
        assert!(rows[0].confidence >= 0.70, "inclusive threshold");
        assert!(!rows[0].reason.is_empty());

        let findings = storage.findings.get_findings_by_deal(&deal_id).await.unwrap();
        let ids = [rows[0].finding_a_id.clone(), rows[0].finding_b_id.clone()];
        assert!(findings.iter().all(|f| ids.contains(&f.id)), "both finding ids present");

        // Segunda corrida deal-wide: el conjunto no crece.
        run_detection(&deps, &queue, &deal_id).await;
        let rows_after = storage.contradictions.get_contradictions_by_deal(&deal_id).await.unwrap();
        assert_eq!(rows_after.len(), 1, "re-runs must supersede, never duplicate");

        println!("   ✅ [AUDIT]: Contradiction set invariant preserved.");
    }

    /**
     * CERTIFICACIÓN: hallazgos rechazados quedan fuera de la corrida.
     */
    #[tokio::test]
    async fn certify_rejected_findings_excluded() {
        let (deps, storage, queue, deal_id) = setup("contradiction_rejected").await;

        // Rechazamos uno de los dos hallazgos: el par desaparece.
        let findings = storage.findings.get_findings_by_deal(&deal_id).await.unwrap();
        let connection = storage.client.get_connection().unwrap();
        connection
            .execute(
                "UPDATE findings SET status = 'rejected' WHERE id = ?1",
                libsql::params![findings[0].id.clone()],
            )
            .await
            .unwrap();

        run_detection(&deps, &queue, &deal_id).await;

        let rows = storage.contradictions.get_contradictions_by_deal(&deal_id).await.unwrap();
        assert!(rows.is_empty(), "rejected findings never enter comparison");
    }
}
