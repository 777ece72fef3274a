// [libs/infra/db-turso/src/lib.rs]
/*!
 * =================================================================
 * APARATO: RELATIONAL INFRASTRUCTURE ROOT (V4.0)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: EXPOSICIÓN DEL CLIENTE, ESQUEMA, COLA Y REPOSITORIOS
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod queue;
pub mod repositories;
pub mod schema;

pub use client::TursoClient;
pub use errors::DbError;
pub use queue::{default_job_options, JobDefaults, JobQueue};
pub use repositories::{
    ChunkDraft, ChunkRepository, ContradictionRepository, CorrectionRow, DocumentRepository,
    FeedbackRepository, FinancialMetricRecord, FinancialMetricRepository, FindingRepository,
    TenancyRepository, UsageRecord, UsageRepository, ValidationRow,
};

use std::sync::Arc;

/// Fachada de almacenamiento: un único objeto process-wide que agrupa
/// todos los repositorios sobre el mismo driver compartido.
#[derive(Clone)]
pub struct Storage {
    pub client: TursoClient,
    pub documents: Arc<DocumentRepository>,
    pub chunks: Arc<ChunkRepository>,
    pub findings: Arc<FindingRepository>,
    pub metrics: Arc<FinancialMetricRepository>,
    pub contradictions: Arc<ContradictionRepository>,
    pub tenancy: Arc<TenancyRepository>,
    pub usage: Arc<UsageRepository>,
    pub feedback: Arc<FeedbackRepository>,
}

impl Storage {
    pub fn new(client: TursoClient) -> Self {
        Self {
            documents: Arc::new(DocumentRepository::new(client.clone())),
            chunks: Arc::new(ChunkRepository::new(client.clone())),
            findings: Arc::new(FindingRepository::new(client.clone())),
            metrics: Arc::new(FinancialMetricRepository::new(client.clone())),
            contradictions: Arc::new(ContradictionRepository::new(client.clone())),
            tenancy: Arc::new(TenancyRepository::new(client.clone())),
            usage: Arc::new(UsageRepository::new(client.clone())),
            feedback: Arc::new(FeedbackRepository::new(client.clone())),
            client,
        }
    }

    /// Conexión + esquema + fachada en un solo paso.
    pub async fn connect(url: &str, token: Option<String>) -> Result<Self, DbError> {
        let client = TursoClient::connect(url, token).await?;
        Ok(Self::new(client))
    }
}
