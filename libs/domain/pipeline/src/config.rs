// [libs/domain/pipeline/src/config.rs]
// =================================================================
// APARATO: PIPELINE CONFIGURATION (V4.1)
// RESPONSABILIDAD: TUNABLES DEL PIPELINE CON DEFAULTS OPERATIVOS
// =================================================================

/// Configuración del pipeline. Construida una vez en el arranque e
/// inyectada a los handlers; los tests construyen la suya propia.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Presupuesto mínimo de tokens por chunk.
    pub chunk_min_tokens: usize,
    /// Techo de tokens por chunk.
    pub chunk_max_tokens: usize,
    /// Solapamiento de tokens entre chunks consecutivos.
    pub chunk_overlap_tokens: usize,
    /// Chunks por llamada LLM en el modo batch de análisis.
    pub llm_analysis_batch_size: usize,
    /// Pares por llamada LLM en la comparación de contradicciones.
    pub contradiction_batch_size: usize,
    /// Workers concurrentes del pool.
    pub worker_count: usize,
    /// Lote máximo por dequeue.
    pub dequeue_batch_size: usize,
    /// Segundos antes de que el reaper reclame un arrendamiento.
    pub visibility_timeout_seconds: i64,
    /// Directorio scratch para la hidratación de blobs.
    pub scratch_dir: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_min_tokens: 512,
            chunk_max_tokens: 1024,
            chunk_overlap_tokens: 50,
            llm_analysis_batch_size: 5,
            contradiction_batch_size: 5,
            worker_count: 5,
            dequeue_batch_size: 5,
            visibility_timeout_seconds: 600,
            scratch_dir: std::env::temp_dir().to_string_lossy().to_string(),
        }
    }
}
