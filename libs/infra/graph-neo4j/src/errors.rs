// [libs/infra/graph-neo4j/src/errors.rs]
//! =================================================================
//! APARATO: GRAPH ERROR CATALOG (V3.0)
//! CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
//! RESPONSABILIDAD: FALLOS DEL GRAFO CON VEREDICTO DE REINTENTO
//! =================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    /// Fallo de transporte o autenticación contra Neo4j. Reintentable.
    #[error("[L3_GRAPH_NET_FAULT]: GRAPH_UPLINK_SEVERED -> {0}")]
    Connection(String),

    /// El motor rechazó una sentencia Cypher.
    #[error("[L3_GRAPH_FAULT]: CYPHER_REJECTED -> {0}")]
    Query(String),

    /// Fallo del estrato de extracción de entidades (LLM/embeddings).
    #[error("[L3_GRAPH_FAULT]: EXTRACTION_FAILED -> {0}")]
    Extraction(String),

    /// Configuración ausente o malformada. No reintentable.
    #[error("[L3_GRAPH_CONFIG_FAULT]: {0}")]
    Configuration(String),
}

impl GraphError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Query(_) | Self::Extraction(_))
    }
}
