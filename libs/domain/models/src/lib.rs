// [libs/domain/models/src/lib.rs]
pub mod contradiction;
pub mod document;
pub mod feedback;
pub mod financial;
pub mod finding;
pub mod job;
pub mod payloads;
pub mod retry;
pub mod tenancy;

pub use contradiction::{Contradiction, ContradictionStatus};
pub use document::{
    failed_status_for_stage, next_stage, running_status_for_stage, stage_to_status,
    status_to_stage, ChunkRecord, ChunkType, Document, ProcessingStage, ProcessingStatus,
    STAGE_ORDER,
};
pub use feedback::{ConfidenceAdjustment, DomainStats, FeedbackPattern, FeedbackSummary, Recommendation};
pub use financial::{normalize_metric, FinancialMetricDraft, MetricCategory, PeriodType};
pub use finding::{Finding, FindingDomain, FindingDraft, FindingStatus, FindingType};
pub use job::{EnqueueOptions, Job, JobState};
pub use retry::{ClassifiedError, ErrorCategory, RetryHistoryEntry};
pub use tenancy::{Deal, Organization};

/// Registro nominal de los trabajos que circulan por la cola táctica.
pub mod job_names {
    pub const PARSE_DOCUMENT: &str = "parse-document";
    pub const INGEST_GRAPHITI: &str = "ingest-graphiti";
    pub const ANALYZE_DOCUMENT: &str = "analyze-document";
    pub const EXTRACT_FINANCIALS: &str = "extract-financials";
    pub const DETECT_CONTRADICTIONS: &str = "detect-contradictions";
    pub const INGEST_QA_RESPONSE: &str = "ingest-qa-response";
    pub const INGEST_CHAT_FACT: &str = "ingest-chat-fact";
    pub const ANALYZE_FEEDBACK: &str = "analyze-feedback";
    pub const ANALYZE_FEEDBACK_ALL: &str = "analyze-feedback-all";
}
