// [libs/infra/graph-neo4j/src/lib.rs]
/*!
 * =================================================================
 * APARATO: GRAPH INFRASTRUCTURE ROOT (V4.0)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GRAFO TEMPORAL CON AISLAMIENTO POR TENANT
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod resolution;
pub mod schema;

pub use client::{
    group_id, EpisodeRequest, FindingSync, GraphSearchResult, GraphitiClient, KnowledgeGraph,
    CHAT_CONFIDENCE, DOCUMENT_CONFIDENCE, QA_CONFIDENCE,
};
pub use errors::GraphError;
