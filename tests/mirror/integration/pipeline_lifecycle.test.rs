// [tests/mirror/integration/pipeline_lifecycle.test.rs]
/**
 * =================================================================
 * APARATO: PIPELINE LIFECYCLE CERTIFICATION (V8.0)
 * CLASIFICACIÓN: E2E INTEGRATION / TRINITY EVIDENCE
 * RESPONSABILIDAD: TRAYECTORIAS COMPLETAS DEL PIPELINE DOCUMENTAL
 *
 * # Logic:
 * Tres trayectorias sobre Ledger en RAM con adaptadores guionados:
 * 1. Camino feliz PDF de dos páginas hasta 'complete'.
 * 2. Tormenta transitoria ('Connection reset') hasta el agotamiento
 *    de la cola y el sellado 'analyzing_failed'.
 * 3. Error permanente (PDF cifrado): un solo intento, sin reintentos.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use acumen_domain_pipeline::{
        process_job, Dependencies, ErrorClassifier, PipelineConfig, RetryManager,
        REGISTERED_JOB_NAMES,
    };
    use acumen_infra_blob::HttpBlobStore;
    use acumen_infra_db::{JobQueue, Storage};
    use acumen_infra_graph::{
        EpisodeRequest, FindingSync, GraphError, GraphSearchResult, KnowledgeGraph,
    };
    use acumen_infra_llm::{EmbeddingProvider, LanguageModel, LlmError, ModelTier, Usage};
    use async_trait::async_trait;
    use serde_json::json;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    // --- DOBLES GUIONADOS -------------------------------------------------

    struct ScriptedModel {
        /// Respuesta para prompts de análisis de hallazgos.
        analysis_response: String,
        /// Respuesta para prompts de comparación de contradicciones.
        comparison_response: String,
        /// Fallo forzado para toda invocación (tormenta transitoria).
        forced_failure: Option<String>,
        calls: Mutex<usize>,
    }

    impl ScriptedModel {
        fn happy(analysis_response: &str) -> Self {
            Self {
                analysis_response: analysis_response.to_string(),
                comparison_response:
                    r#"[{"pair": 1, "contradicts": false, "confidence": 0.2, "reason": "complementary"}]"#
                        .to_string(),
                forced_failure: None,
                calls: Mutex::new(0),
            }
        }

        fn storm(message: &str) -> Self {
            Self {
                analysis_response: String::new(),
                comparison_response: String::new(),
                forced_failure: Some(message.to_string()),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn run(
            &self,
            prompt: &str,
            _system_prompt: Option<&str>,
            _tier: ModelTier,
        ) -> Result<(String, Usage), LlmError> {
            *self.calls.lock().unwrap() += 1;

            if let Some(message) = &self.forced_failure {
                return Err(LlmError::Server(message.clone()));
            }

            let response = if prompt.contains("Compare the following pairs") {
                self.comparison_response.clone()
            } else if prompt.contains("Extract the entities") {
                r#"{"entities": [], "edges": []}"#.to_string()
            } else {
                self.analysis_response.clone()
            };

            Ok((
                response,
                Usage {
                    input_tokens: 100,
                    output_tokens: 50,
                    provider: "gemini".into(),
                    model: "gemini-2.5-flash".into(),
                },
            ))
        }
    }

    struct StaticEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StaticEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, Usage), LlmError> {
            let vectors = texts
                .iter()
                .map(|text| vec![text.len() as f32, 1.0, 0.5])
                .collect();
            Ok((
                vectors,
                Usage {
                    input_tokens: texts.iter().map(|t| (t.len() / 4) as i64).sum(),
                    output_tokens: 0,
                    provider: "voyage".into(),
                    model: "voyage-3.5".into(),
                },
            ))
        }
    }

    #[derive(Default)]
    struct RecordingGraph {
        episodes: Mutex<Vec<EpisodeRequest>>,
        synced_findings: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl KnowledgeGraph for RecordingGraph {
        async fn add_episode(&self, request: EpisodeRequest) -> Result<(), GraphError> {
            self.episodes.lock().unwrap().push(request);
            Ok(())
        }

        async fn search(
            &self,
            deal_id: &str,
            organization_id: &str,
            search_query: &str,
            num_results: usize,
        ) -> Result<Vec<GraphSearchResult>, GraphError> {
            let namespace = format!("{}:{}", organization_id, deal_id);
            let lowered = search_query.to_lowercase();
            let results = self
                .episodes
                .lock()
                .unwrap()
                .iter()
                .filter(|e| format!("{}:{}", e.organization_id, e.deal_id) == namespace)
                .filter(|e| e.content.to_lowercase().contains(&lowered))
                .take(num_results)
                .map(|e| GraphSearchResult {
                    episode_name: e.name.clone(),
                    content: e.content.clone(),
                    score: 1.0,
                })
                .collect();
            Ok(results)
        }

        async fn sync_finding(
            &self,
            _deal_id: &str,
            _organization_id: &str,
            finding: &FindingSync,
        ) -> Result<(), GraphError> {
            self.synced_findings.lock().unwrap().push(finding.finding_id.clone());
            Ok(())
        }

        async fn close(&self) -> Result<(), GraphError> {
            Ok(())
        }
    }

    // --- ANDAMIAJE --------------------------------------------------------

    struct Rig {
        deps: Dependencies,
        storage: Storage,
        queue: Arc<JobQueue>,
        graph: Arc<RecordingGraph>,
    }

    async fn setup(anchor: &str, model: ScriptedModel) -> Rig {
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
        let graph = Arc::new(RecordingGraph::default());

        let deps = Dependencies {
            storage: storage.clone(),
            queue: queue.clone(),
            retry,
            language_model: Arc::new(model),
            embeddings: Arc::new(StaticEmbedder),
            graph: graph.clone(),
            blobs: Arc::new(HttpBlobStore::new(None)),
            config: PipelineConfig::default(),
        };

        Rig { deps, storage, queue, graph }
    }

    fn write_fixture(name: &str, payload: &[u8]) -> String {
        let path = std::env::temp_dir().join(name);
        let mut file = std::fs::File::create(&path).expect("fixture");
        file.write_all(payload).expect("fixture write");
        path.to_string_lossy().to_string()
    }

    /// Drena la cola procesando hasta que no quede trabajo elegible.
    /// Entre rondas adelanta los 'retry' para no esperar el backoff.
    async fn drain(rig: &Rig) {
        for _ in 0..64 {
            let mut processed = false;
            for name in REGISTERED_JOB_NAMES {
                for job in rig.queue.dequeue(name, 10).await.unwrap() {
                    processed = true;
                    process_job(&rig.deps, &job).await;
                }
            }
            if !processed {
                // Rebobina la elegibilidad de los retry pendientes.
                let connection = rig.storage.client.get_connection().unwrap();
                let rewound = connection
                    .execute(
                        "UPDATE jobs SET start_after = '1970-01-01T00:00:00+00:00' WHERE state = 'retry'",
                        (),
                    )
                    .await
                    .unwrap();
                if rewound == 0 {
                    break;
                }
            }
        }
    }

    // --- CERTIFICACIONES --------------------------------------------------

    /**
     * CERTIFICACIÓN 1: Camino feliz de un PDF de dos páginas.
     * Trayectoria pending -> ... -> complete, cursor en 'analyzed',
     * chunks >= 2 con embeddings, hallazgos tipados y episodios con
     * namespace compuesto org:deal.
     */
    #[tokio::test]
    async fn certify_happy_path_pdf_lifecycle() {
        println!("\n🔍 [AUDIT]: Initiating E2E happy-path certification...");

        let analysis = r#"[
            {"text": "Alpha Corp revenue was $5.0M in Q3 2024", "finding_type": "fact",
             "domain": "financial", "confidence": 0.9, "source_chunk_index": 0,
             "date_referenced": "Q3 2024"},
            {"text": "The company operates in the industrial sector", "finding_type": "insight",
             "domain": "market", "confidence": 0.7, "source_chunk_index": 1}
        ]"#;
        let rig = setup("lifecycle_happy", ScriptedModel::happy(analysis)).await;

        let organization_id =
            rig.storage.tenancy.create_organization("Atlas Capital").await.unwrap();
        let deal_id =
            rig.storage.tenancy.create_deal(&organization_id, "Project Borealis").await.unwrap();

        let blob = write_fixture(
            "acumen_happy.pdf",
            b"%PDF-1.4\nAlpha Corp revenue was $5.0M in Q3 2024.\x0cThe company operates in the industrial sector.",
        );
        let document_id = rig
            .storage
            .documents
            .create_document(&deal_id, "cim.pdf", &blob, "application/pdf")
            .await
            .unwrap();

        rig.queue
            .enqueue(
                "parse-document",
                json!({ "document_id": document_id, "deal_id": deal_id }),
                None,
            )
            .await
            .unwrap();

        drain(&rig).await;

        // Estatus final y cursor fino autoritativo.
        let document = rig.storage.documents.get_document(&document_id).await.unwrap().unwrap();
        assert_eq!(document.processing_status, "complete");
        assert_eq!(document.last_completed_stage.as_deref(), Some("analyzed"));
        assert!(document.processing_error.is_none());

        // Chunks por página, con embeddings persistidos.
        let chunks = rig.storage.chunks.get_chunks_by_document(&document_id).await.unwrap();
        assert!(chunks.len() >= 2, "expected at least one chunk per page");
        assert!(chunks.iter().all(|c| c.embedding.is_some()));

        // Hallazgos tipados enlazados a chunks.
        let findings = rig.storage.findings.get_findings_by_deal(&deal_id).await.unwrap();
        assert!(findings
            .iter()
            .any(|f| matches!(f.finding_type.as_str(), "fact" | "insight")));
        assert!(findings.iter().all(|f| f.deal_id == deal_id));

        // Episodios con aislamiento por namespace compuesto.
        let episodes = rig.graph.episodes.lock().unwrap();
        assert_eq!(episodes.len(), chunks.len());
        assert!(episodes
            .iter()
            .all(|e| e.organization_id == organization_id && e.deal_id == deal_id));
        assert!(episodes.iter().all(|e| (e.confidence - 0.85).abs() < 1e-9));
        drop(episodes);

        // Búsqueda con organización ajena: cero resultados.
        let foreign = rig
            .graph
            .search(&deal_id, "other-organization", "Alpha", 10)
            .await
            .unwrap();
        assert!(foreign.is_empty(), "cross-tenant search must return nothing");

        let scoped = rig.graph.search(&deal_id, &organization_id, "Alpha", 10).await.unwrap();
        assert!(!scoped.is_empty());

        // Sync best-effort de hallazgos hacia el grafo.
        assert_eq!(rig.graph.synced_findings.lock().unwrap().len(), findings.len());

        println!("   ✅ [AUDIT]: Happy-path chain of custody intact.");
    }

    /**
     * CERTIFICACIÓN 2: Tormenta transitoria. El adaptador LLM responde
     * 'Connection reset' en cada llamada: la cola agota su contrato,
     * el trabajo queda 'failed', el cursor fino no avanza y el
     * documento se sella 'analyzing_failed'. El retry manual inmediato
     * queda denegado por enfriamiento.
     */
    #[tokio::test]
    async fn certify_transient_retry_storm() {
        println!("\n🔍 [AUDIT]: Initiating retry-storm certification...");

        let rig = setup("lifecycle_storm", ScriptedModel::storm("Connection reset by peer")).await;

        let organization_id =
            rig.storage.tenancy.create_organization("Atlas Capital").await.unwrap();
        let deal_id =
            rig.storage.tenancy.create_deal(&organization_id, "Project Borealis").await.unwrap();
        let document_id = rig
            .storage
            .documents
            .create_document(&deal_id, "cim.pdf", "/tmp/none.pdf", "application/pdf")
            .await
            .unwrap();

        // Documento ya parseado e ingresado: la tormenta cae en analyze.
        rig.storage
            .chunks
            .store_chunks_and_update_status(
                &document_id,
                &[acumen_infra_db::ChunkDraft {
                    content: "Revenue was $5.0M".into(),
                    chunk_type: acumen_domain_models::ChunkType::Text,
                    chunk_index: 0,
                    page_number: Some(1),
                    sheet_name: None,
                    cell_reference: None,
                    token_count: Some(5),
                    metadata: json!({}),
                }],
                "graphiti_ingested",
            )
            .await
            .unwrap();
        rig.storage.documents.update_document_stage(&document_id, Some("embedded")).await.unwrap();

        let job_id = rig
            .queue
            .enqueue(
                "analyze-document",
                json!({ "document_id": document_id, "deal_id": deal_id }),
                None,
            )
            .await
            .unwrap();

        drain(&rig).await;

        // El trabajo terminó 'failed' tras agotar el contrato.
        let job = rig.queue.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.state, acumen_domain_models::JobState::Failed);
        assert_eq!(job.retry_count, job.retry_limit);

        // Cursor fino intacto; estatus grueso sellado por etapa.
        let document = rig.storage.documents.get_document(&document_id).await.unwrap().unwrap();
        assert_eq!(document.last_completed_stage.as_deref(), Some("embedded"));
        assert_eq!(document.processing_status, "analyzing_failed");

        // Historial: una entrada por ejecución (1 + retry_limit),
        // acotado por ambas cotas.
        let history = rig.storage.documents.get_retry_history(&document_id).await.unwrap();
        assert_eq!(history.len(), (1 + job.retry_limit) as usize);
        assert!(history.len() <= 10);
        assert!(history.iter().all(|entry| entry.stage == "analyzing"));
        assert!(history.iter().all(|entry| entry.error_type == "connection_error"));

        // Retry manual inmediato: denegado por enfriamiento.
        let (allowed, reason) = rig.deps.retry.can_manual_retry(&document_id).await.unwrap();
        assert!(!allowed);
        assert!(reason.unwrap().to_lowercase().contains("wait"));

        println!("   ✅ [AUDIT]: Storm contained within queue contract.");
    }

    /**
     * CERTIFICACIÓN 3: Error permanente. Un PDF cifrado cae en la
     * primera ejecución: sin reintentos programados, estatus
     * 'parsing_failed' y error clasificado 'permanent' con mensaje
     * apto para UI.
     */
    #[tokio::test]
    async fn certify_permanent_error_short_circuit() {
        println!("\n🔍 [AUDIT]: Initiating permanent-error certification...");

        let rig = setup("lifecycle_encrypted", ScriptedModel::happy("[]")).await;

        let organization_id =
            rig.storage.tenancy.create_organization("Atlas Capital").await.unwrap();
        let deal_id =
            rig.storage.tenancy.create_deal(&organization_id, "Project Borealis").await.unwrap();

        let blob = write_fixture(
            "acumen_encrypted.pdf",
            b"%PDF-1.7\n/Encrypt 12 0 R\nciphertext-payload",
        );
        let document_id = rig
            .storage
            .documents
            .create_document(&deal_id, "locked.pdf", &blob, "application/pdf")
            .await
            .unwrap();

        let job_id = rig
            .queue
            .enqueue(
                "parse-document",
                json!({ "document_id": document_id, "deal_id": deal_id }),
                None,
            )
            .await
            .unwrap();

        drain(&rig).await;

        // Un solo intento: el corto-circuito no consume reintentos.
        let job = rig.queue.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.state, acumen_domain_models::JobState::Failed);
        assert_eq!(job.retry_count, 0, "no retries scheduled for permanent failures");

        let document = rig.storage.documents.get_document(&document_id).await.unwrap().unwrap();
        assert_eq!(document.processing_status, "parsing_failed");

        let error = document.processing_error.expect("classified error persisted");
        assert_eq!(error["category"], "permanent");
        assert_eq!(error["error_type"], "encrypted_file");
        assert_eq!(error["user_message"], "File is password protected");
        assert_eq!(error["should_retry"], false);

        let history = rig.storage.documents.get_retry_history(&document_id).await.unwrap();
        assert_eq!(history.len(), 1);

        println!("   ✅ [AUDIT]: Permanent failure sealed on first attempt.");
    }
}
