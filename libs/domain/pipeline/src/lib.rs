// [libs/domain/pipeline/src/lib.rs]
/*!
 * =================================================================
 * APARATO: PIPELINE DOMAIN ROOT (V5.0)
 * CLASIFICACIÓN: DOMAIN LAYER (ESTRATO L2)
 * RESPONSABILIDAD: NÚCLEO DEL PIPELINE DE INTELIGENCIA DOCUMENTAL
 * =================================================================
 */

pub mod chunker;
pub mod classifier;
pub mod config;
pub mod contradiction;
pub mod deps;
pub mod feedback;
pub mod financial;
pub mod handlers;
pub mod parsers;
pub mod retry;
pub mod worker;

pub use chunker::{Chunker, TokenEstimator};
pub use classifier::ErrorClassifier;
pub use config::PipelineConfig;
pub use contradiction::{
    BatchComparisonResult, ContradictionComparison, ContradictionDetector,
    CONTRADICTION_CONFIDENCE_THRESHOLD,
};
pub use deps::Dependencies;
pub use feedback::{FeedbackAnalyzer, MIN_SAMPLE_SIZE};
pub use handlers::{dispatch, StageError, REGISTERED_JOB_NAMES};
pub use retry::{
    RetryManager, MANUAL_RETRY_COOLDOWN_SECONDS, MAX_RETRY_ATTEMPTS, MAX_TOTAL_RETRY_ATTEMPTS,
};
pub use worker::{process_job, WorkerEngine};
