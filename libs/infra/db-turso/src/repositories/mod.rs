// [libs/infra/db-turso/src/repositories/mod.rs]
pub mod chunk;
pub mod contradiction;
pub mod document;
pub mod feedback;
pub mod financial;
pub mod finding;
pub mod tenancy;
pub mod usage;

pub use chunk::{ChunkDraft, ChunkRepository};
pub use contradiction::ContradictionRepository;
pub use document::DocumentRepository;
pub use feedback::{CorrectionRow, FeedbackRepository, ValidationRow};
pub use financial::{FinancialMetricRecord, FinancialMetricRepository};
pub use finding::FindingRepository;
pub use tenancy::TenancyRepository;
pub use usage::{UsageRecord, UsageRepository};
