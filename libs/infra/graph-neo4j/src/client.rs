// [libs/infra/graph-neo4j/src/client.rs]
/*!
 * =================================================================
 * APARATO: TEMPORAL GRAPH CLIENT (V11.0 - TENANT SEALED)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: EPISODIOS, EXTRACCIÓN GUIADA Y BÚSQUEDA AISLADA
 *
 * # Invariante de aislamiento (no negociable):
 * Toda escritura y toda búsqueda se parametriza con
 * group_id = "{organization_id}:{deal_id}". Dos tenants con el mismo
 * deal_id pero distinta organización jamás ven datos cruzados.
 *
 * # Logic:
 * Los episodios de un mismo group_id se procesan secuencialmente
 * (candado por grupo). La creación de índices corre una sola vez por
 * vida del proceso y tolera condiciones 'already exists'.
 * =================================================================
 */

use crate::errors::GraphError;
use crate::resolution::{
    is_protected_metric, normalize_company_name, normalize_person_name, resolution_context,
};
use crate::schema::{edge_is_allowed, extraction_schema_prompt};
use acumen_infra_llm::{
    estimate_cost, EmbeddingProvider, LanguageModel, ModelTier,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::{query, Graph};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

/// Confianza base por canal de origen. Invariante: QA > CHAT > DOCUMENT.
pub const QA_CONFIDENCE: f64 = 0.95;
pub const CHAT_CONFIDENCE: f64 = 0.90;
pub const DOCUMENT_CONFIDENCE: f64 = 0.85;

/// Formato canónico del namespace por tenant (separador ':').
pub fn group_id(organization_id: &str, deal_id: &str) -> String {
    format!("{}:{}", organization_id, deal_id)
}

/// Solicitud de ingesta de un episodio.
#[derive(Debug, Clone)]
pub struct EpisodeRequest {
    pub deal_id: String,
    pub organization_id: String,
    pub content: String,
    pub name: String,
    pub source_description: String,
    pub reference_time: DateTime<Utc>,
    /// Confianza del canal (QA/CHAT/DOCUMENT).
    pub confidence: f64,
}

/// Resultado de búsqueda híbrida dentro de un namespace.
#[derive(Debug, Clone)]
pub struct GraphSearchResult {
    pub episode_name: String,
    pub content: String,
    pub score: f64,
}

/// Hallazgo persistido a proyectar como nodo Finding del grafo, con su
/// arista de procedencia EXTRACTED_FROM hacia el nodo Document.
#[derive(Debug, Clone)]
pub struct FindingSync {
    pub finding_id: String,
    pub document_id: String,
    pub document_name: String,
    pub text: String,
    pub finding_type: String,
    pub domain: String,
    pub confidence: f64,
    pub date_referenced: Option<String>,
}

/// Capacidad de grafo de conocimiento consumida por el pipeline.
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    async fn add_episode(&self, request: EpisodeRequest) -> Result<(), GraphError>;

    async fn search(
        &self,
        deal_id: &str,
        organization_id: &str,
        search_query: &str,
        num_results: usize,
    ) -> Result<Vec<GraphSearchResult>, GraphError>;

    /// Proyección best-effort de un hallazgo relacional como nodo
    /// Finding con arista EXTRACTED_FROM; el relacional sigue siendo
    /// la fuente de verdad.
    async fn sync_finding(
        &self,
        deal_id: &str,
        organization_id: &str,
        finding: &FindingSync,
    ) -> Result<(), GraphError>;

    /// Idempotente: múltiples llamadas son seguras.
    async fn close(&self) -> Result<(), GraphError>;
}

#[derive(Debug, Deserialize)]
struct ExtractedEntity {
    name: String,
    entity_type: String,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
struct ExtractedEdge {
    source: String,
    target: String,
    edge_type: String,
    #[serde(default)]
    fact: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractionPayload {
    #[serde(default)]
    entities: Vec<ExtractedEntity>,
    #[serde(default)]
    edges: Vec<ExtractedEdge>,
}

pub struct GraphitiClient {
    graph: Graph,
    language_model: Arc<dyn LanguageModel>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    /// Candado de inicialización: los índices se crean una sola vez.
    indices_latch: OnceCell<()>,
    /// Candados por group_id: episodios del mismo namespace en serie.
    group_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl GraphitiClient {
    /// Abre el enlace al cluster Neo4j.
    ///
    /// # Errors:
    /// - `GraphError::Connection`: credenciales o transporte inválidos.
    #[instrument(skip(password, language_model, embedding_provider))]
    pub async fn connect(
        uri: &str,
        user: &str,
        password: &str,
        language_model: Arc<dyn LanguageModel>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, GraphError> {
        if password.is_empty() {
            return Err(GraphError::Configuration("NEO4J_PASSWORD not set".into()));
        }

        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| GraphError::Connection(format!("NEO4J_HANDSHAKE_FAILED: {}", e)))?;

        info!("🕸️  [GRAPH]: Uplink established to [{}].", uri);

        Ok(Self {
            graph,
            language_model,
            embedding_provider,
            indices_latch: OnceCell::new(),
            group_locks: Mutex::new(HashMap::new()),
        })
    }

    fn group_lock(&self, namespace: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.group_locks.lock().expect("group lock registry poisoned");
        locks.entry(namespace.to_string()).or_default().clone()
    }

    /// Creación única de índices y constraints, tolerante a re-creación.
    async fn ensure_indices(&self) -> Result<(), GraphError> {
        self.indices_latch
            .get_or_try_init(|| async {
                let statements = [
                    "CREATE CONSTRAINT episode_uuid IF NOT EXISTS FOR (e:Episode) REQUIRE e.uuid IS UNIQUE",
                    "CREATE INDEX episode_group IF NOT EXISTS FOR (e:Episode) ON (e.group_id)",
                    "CREATE INDEX entity_group IF NOT EXISTS FOR (n:Entity) ON (n.group_id)",
                    "CREATE INDEX entity_key IF NOT EXISTS FOR (n:Entity) ON (n.resolution_key)",
                ];

                for statement in statements {
                    if let Err(e) = self.graph.run(query(statement)).await {
                        let message = e.to_string();
                        if message.contains("already exists")
                            || message.contains("EquivalentSchemaRuleAlreadyExists")
                        {
                            debug!("🕸️  [GRAPH]: Index already present, skipping.");
                        } else {
                            return Err(GraphError::Query(message));
                        }
                    }
                }

                info!("🕸️  [GRAPH]: Indices and constraints levelized.");
                Ok(())
            })
            .await
            .map(|_| ())
    }

    /// Clave de resolución por tipo: compañías y personas normalizadas;
    /// las métricas protegidas conservan su superficie exacta para que
    /// jamás se auto-fusionen entre variantes.
    fn resolution_key(entity_type: &str, name: &str) -> String {
        match entity_type {
            "Company" => normalize_company_name(name),
            "Person" => normalize_person_name(name),
            "FinancialMetric" if is_protected_metric(name) => name.trim().to_lowercase(),
            _ => name.trim().to_lowercase(),
        }
    }

    async fn extract_graph_material(&self, content: &str) -> ExtractionPayload {
        let prompt = format!(
            "Extract the entities and relationships asserted in the text below.\n\n\
             {}\n\n{}\n\n\
             Respond with JSON only, in this exact shape:\n\
             {{\"entities\": [{{\"name\": \"...\", \"entity_type\": \"...\", \"summary\": \"...\"}}],\n \
             \"edges\": [{{\"source\": \"...\", \"target\": \"...\", \"edge_type\": \"...\", \"fact\": \"...\"}}]}}\n\n\
             ## Text\n{}",
            extraction_schema_prompt(),
            resolution_context(),
            content
        );

        match self.language_model.run(&prompt, None, ModelTier::Flash).await {
            Ok((response_text, _usage)) => match parse_json_payload(&response_text) {
                Some(payload) => payload,
                None => {
                    warn!("🕸️  [GRAPH]: Extraction response unparseable; episode kept bare.");
                    ExtractionPayload::default()
                }
            },
            Err(e) => {
                warn!("🕸️  [GRAPH]: Entity extraction failed ({}); episode kept bare.", e);
                ExtractionPayload::default()
            }
        }
    }
}

/// Localiza el primer objeto JSON plausible dentro de la respuesta.
fn parse_json_payload(response_text: &str) -> Option<ExtractionPayload> {
    let start = response_text.find('{')?;
    let end = response_text.rfind('}')?;
    serde_json::from_str(&response_text[start..=end]).ok()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl KnowledgeGraph for GraphitiClient {
    #[instrument(skip(self, request), fields(name = %request.name))]
    async fn add_episode(&self, request: EpisodeRequest) -> Result<(), GraphError> {
        self.ensure_indices().await?;

        let namespace = group_id(&request.organization_id, &request.deal_id);

        // Secuencialidad por namespace: contrato del estrato de grafo.
        let lock = self.group_lock(&namespace);
        let _guard = lock.lock().await;

        // Clave idempotente: reingestar (group, name, content) es seguro.
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        hasher.update(request.name.as_bytes());
        hasher.update(request.content.as_bytes());
        let episode_uuid = hex::encode(hasher.finalize());

        let (vectors, embed_usage) = self
            .embedding_provider
            .embed(std::slice::from_ref(&request.content))
            .await
            .map_err(|e| GraphError::Extraction(format!("EPISODE_EMBED_FAILED: {}", e)))?;

        let embedding_json = vectors
            .first()
            .map(|v| serde_json::to_string(v).unwrap_or_else(|_| "[]".into()))
            .unwrap_or_else(|| "[]".into());

        self.graph
            .run(
                query(
                    r#"
                    MERGE (e:Episode {uuid: $uuid})
                    SET e.group_id = $group_id,
                        e.name = $name,
                        e.content = $content,
                        e.source_description = $source_description,
                        e.reference_time = $reference_time,
                        e.confidence = $confidence,
                        e.embedding = $embedding
                    "#,
                )
                .param("uuid", episode_uuid.clone())
                .param("group_id", namespace.clone())
                .param("name", request.name.clone())
                .param("content", request.content.clone())
                .param("source_description", request.source_description.clone())
                .param("reference_time", request.reference_time.to_rfc3339())
                .param("confidence", request.confidence)
                .param("embedding", embedding_json),
            )
            .await
            .map_err(|e| GraphError::Connection(format!("EPISODE_WRITE_FAILED: {}", e)))?;

        // Extracción guiada por esquema; las entidades novedosas entran
        // con su tipo descriptivo.
        let extraction = self.extract_graph_material(&request.content).await;

        let mut key_by_name: HashMap<String, (String, String)> = HashMap::new();
        for entity in &extraction.entities {
            let resolution_key = Self::resolution_key(&entity.entity_type, &entity.name);
            if resolution_key.is_empty() {
                continue;
            }
            key_by_name.insert(
                entity.name.clone(),
                (entity.entity_type.clone(), resolution_key.clone()),
            );

            self.graph
                .run(
                    query(
                        r#"
                        MERGE (n:Entity {group_id: $group_id, entity_type: $entity_type,
                                         resolution_key: $resolution_key})
                        ON CREATE SET n.name = $name, n.summary = $summary
                        WITH n
                        MATCH (e:Episode {uuid: $episode_uuid})
                        MERGE (e)-[:MENTIONS]->(n)
                        "#,
                    )
                    .param("group_id", namespace.clone())
                    .param("entity_type", entity.entity_type.clone())
                    .param("resolution_key", resolution_key)
                    .param("name", entity.name.clone())
                    .param("summary", entity.summary.clone())
                    .param("episode_uuid", episode_uuid.clone()),
                )
                .await
                .map_err(|e| GraphError::Connection(format!("ENTITY_WRITE_FAILED: {}", e)))?;
        }

        for edge in &extraction.edges {
            let (Some((source_type, source_key)), Some((target_type, target_key))) =
                (key_by_name.get(&edge.source), key_by_name.get(&edge.target))
            else {
                continue;
            };

            if !edge_is_allowed(source_type, target_type, &edge.edge_type) {
                debug!(
                    "🕸️  [GRAPH]: Edge {} ({} -> {}) outside schema map; dropped.",
                    edge.edge_type, source_type, target_type
                );
                continue;
            }

            // El tipo de relación viene validado contra el catálogo
            // cerrado de EDGE_TYPES, por lo que la interpolación es segura.
            let cypher = format!(
                r#"
                MATCH (a:Entity {{group_id: $group_id, resolution_key: $source_key}})
                MATCH (b:Entity {{group_id: $group_id, resolution_key: $target_key}})
                MERGE (a)-[r:{}]->(b)
                SET r.fact = $fact, r.group_id = $group_id
                "#,
                edge.edge_type
            );

            self.graph
                .run(
                    query(&cypher)
                        .param("group_id", namespace.clone())
                        .param("source_key", source_key.clone())
                        .param("target_key", target_key.clone())
                        .param("fact", edge.fact.clone()),
                )
                .await
                .map_err(|e| GraphError::Connection(format!("EDGE_WRITE_FAILED: {}", e)))?;
        }

        // Contabilidad de costo por llamada (tokens estimados por longitud).
        let estimated_tokens = (request.content.len() / 4) as i64;
        let estimated_cost =
            estimate_cost(&embed_usage.provider, &embed_usage.model, estimated_tokens, 0);
        info!(
            provider = %embed_usage.provider,
            model = %embed_usage.model,
            group_id = %namespace,
            estimated_tokens,
            estimated_cost_usd = format!("{:.6}", estimated_cost),
            "🕸️  [GRAPH]: Episode [{}] ingested ({} entities, {} edges).",
            request.name,
            extraction.entities.len(),
            extraction.edges.len()
        );

        Ok(())
    }

    #[instrument(skip(self, search_query))]
    async fn search(
        &self,
        deal_id: &str,
        organization_id: &str,
        search_query: &str,
        num_results: usize,
    ) -> Result<Vec<GraphSearchResult>, GraphError> {
        self.ensure_indices().await?;

        let namespace = group_id(organization_id, deal_id);

        let (vectors, _usage) = self
            .embedding_provider
            .embed(&[search_query.to_string()])
            .await
            .map_err(|e| GraphError::Extraction(format!("QUERY_EMBED_FAILED: {}", e)))?;
        let query_vector = vectors.into_iter().next().unwrap_or_default();

        let mut stream = self
            .graph
            .execute(
                query(
                    r#"
                    MATCH (e:Episode {group_id: $group_id})
                    RETURN e.name AS name, e.content AS content, e.embedding AS embedding
                    "#,
                )
                .param("group_id", namespace.clone()),
            )
            .await
            .map_err(|e| GraphError::Connection(format!("SEARCH_FAILED: {}", e)))?;

        let lowered_query = search_query.to_lowercase();
        let mut scored: Vec<GraphSearchResult> = Vec::new();

        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| GraphError::Query(e.to_string()))?
        {
            let name: String = row.get("name").unwrap_or_default();
            let content: String = row.get("content").unwrap_or_default();
            let embedding_raw: String = row.get("embedding").unwrap_or_default();
            let embedding: Vec<f32> = serde_json::from_str(&embedding_raw).unwrap_or_default();

            // Híbrido: similitud vectorial + refuerzo léxico CONTAINS.
            let mut score = cosine_similarity(&query_vector, &embedding);
            if content.to_lowercase().contains(&lowered_query) {
                score = score.max(0.5) + 0.25;
            }

            if score > 0.0 {
                scored.push(GraphSearchResult { episode_name: name, content, score });
            }
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(num_results);

        debug!(
            group_id = %namespace,
            results = scored.len(),
            "🔎 [GRAPH]: Scoped search completed."
        );
        Ok(scored)
    }

    #[instrument(skip(self, finding), fields(finding_id = %finding.finding_id))]
    async fn sync_finding(
        &self,
        deal_id: &str,
        organization_id: &str,
        finding: &FindingSync,
    ) -> Result<(), GraphError> {
        self.ensure_indices().await?;

        let namespace = group_id(organization_id, deal_id);

        self.graph
            .run(
                query(
                    r#"
                    MERGE (d:Entity {group_id: $group_id, entity_type: 'Document',
                                     resolution_key: $document_id})
                    ON CREATE SET d.name = $document_name
                    MERGE (f:Entity {group_id: $group_id, entity_type: 'Finding',
                                     resolution_key: $finding_id})
                    SET f.name = $finding_id,
                        f.content = $text,
                        f.finding_type = $finding_type,
                        f.domain = $domain,
                        f.confidence = $confidence,
                        f.date_referenced = $date_referenced
                    MERGE (f)-[r:EXTRACTED_FROM]->(d)
                    SET r.group_id = $group_id
                    "#,
                )
                .param("group_id", namespace)
                .param("document_id", finding.document_id.clone())
                .param("document_name", finding.document_name.clone())
                .param("finding_id", finding.finding_id.clone())
                .param("text", finding.text.clone())
                .param("finding_type", finding.finding_type.clone())
                .param("domain", finding.domain.clone())
                .param("confidence", finding.confidence)
                .param("date_referenced", finding.date_referenced.clone().unwrap_or_default()),
            )
            .await
            .map_err(|e| GraphError::Connection(format!("FINDING_SYNC_FAILED: {}", e)))?;

        Ok(())
    }

    async fn close(&self) -> Result<(), GraphError> {
        // El driver cierra sus conexiones al soltar el pool; la operación
        // es idempotente por contrato.
        info!("🕸️  [GRAPH]: Uplink sealed.");
        Ok(())
    }
}
