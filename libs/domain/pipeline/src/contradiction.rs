// [libs/domain/pipeline/src/contradiction.rs]
/*!
 * =================================================================
 * APARATO: CONTRADICTION COMPARATOR (V8.2 - BATCHED PAIRS)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: COMPARACIÓN LLM DE PARES DE HALLAZGOS
 *
 * # Logic:
 * Los pares viajan en lotes (5 por request) al nivel PRO; la
 * respuesta es un arreglo JSON [{pair, contradicts, confidence,
 * reason}]. Se marcan contradicciones con confianza >= 0.70
 * (inclusivo). Los fallos de parseo por lote se registran y no
 * detienen la corrida.
 * =================================================================
 */

use acumen_domain_models::Finding;
use acumen_infra_llm::{LanguageModel, LlmError, ModelTier};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Umbral de confianza inclusivo para sellar una contradicción.
pub const CONTRADICTION_CONFIDENCE_THRESHOLD: f64 = 0.70;

const CONTRADICTION_SYSTEM_PROMPT: &str = "You are an expert M&A analyst specialized in \
identifying contradictory information across due diligence documents. Your task is to compare \
pairs of findings and determine if they contradict each other.\n\n\
A contradiction exists when two findings make incompatible claims about:\n\
- The same metric or measurement (e.g., different revenue figures for the same period)\n\
- The same fact or characteristic (e.g., different employee counts at the same time)\n\
- The same assessment or conclusion (e.g., opposite statements about financial health)\n\n\
Important distinction - these are NOT contradictions:\n\
- Different metrics (revenue vs profit)\n\
- Different time periods (Q2 vs Q3, 2023 vs 2024)\n\
- Complementary or additional information\n\
- Different levels of detail about the same topic\n\
- Approximations vs precise figures (unless wildly different)\n\n\
Always provide structured JSON output with your analysis.";

/// Veredicto de una comparación de par.
#[derive(Debug, Clone)]
pub struct ContradictionComparison {
    pub finding_a_id: String,
    pub finding_b_id: String,
    pub contradicts: bool,
    pub confidence: f64,
    pub reason: String,
}

impl ContradictionComparison {
    pub fn above_threshold(&self) -> bool {
        self.contradicts && self.confidence >= CONTRADICTION_CONFIDENCE_THRESHOLD
    }
}

/// Resultado agregado de la corrida por lotes.
#[derive(Debug, Default)]
pub struct BatchComparisonResult {
    pub comparisons: Vec<ContradictionComparison>,
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    pub batch_count: usize,
    pub failed_comparisons: Vec<(String, String)>,
}

impl BatchComparisonResult {
    pub fn contradictions_found(&self) -> Vec<&ContradictionComparison> {
        self.comparisons.iter().filter(|c| c.above_threshold()).collect()
    }

    pub fn contradictions_below_threshold(&self) -> Vec<&ContradictionComparison> {
        self.comparisons.iter().filter(|c| c.contradicts && !c.above_threshold()).collect()
    }
}

fn date_referenced(finding: &Finding) -> String {
    finding.metadata["date_referenced"].as_str().unwrap_or("Not specified").to_string()
}

fn batch_comparison_prompt(pairs: &[(&Finding, &Finding)]) -> String {
    let mut sections =
        vec!["Compare the following pairs of findings and determine if any contradict each other.\n"
            .to_string()];

    for (i, (finding_a, finding_b)) in pairs.iter().enumerate() {
        sections.push(format!(
            "\n---\n## Pair {}\n\n### Finding A\n**Text:** {}\n**Domain:** {}\n**Date Referenced:** {}\n\n\
             ### Finding B\n**Text:** {}\n**Domain:** {}\n**Date Referenced:** {}\n",
            i + 1,
            finding_a.text,
            finding_a.domain.as_str(),
            date_referenced(finding_a),
            finding_b.text,
            finding_b.domain.as_str(),
            date_referenced(finding_b),
        ));
    }

    sections.push(
        "\n---\n## Task\nFor each pair, analyze whether the findings contradict each other.\n\n\
         Respond with JSON array in this exact format:\n```json\n[\n  \
         {\"pair\": 1, \"contradicts\": true/false, \"confidence\": 0.0-1.0, \"reason\": \"explanation\"},\n  \
         ...\n]\n```"
            .to_string(),
    );

    sections.join("\n")
}

/// Extrae el primer arreglo JSON de la respuesta del modelo.
fn parse_batch_response(response_text: &str) -> Result<Vec<Value>, String> {
    let start = response_text.find('[').ok_or("No JSON array found in response")?;
    let end = response_text.rfind(']').ok_or("No JSON array terminator in response")?;
    if end < start {
        return Err("Malformed JSON array bounds".to_string());
    }

    let parsed: Value = serde_json::from_str(&response_text[start..=end])
        .map_err(|e| format!("JSON decode failed: {}", e))?;

    parsed.as_array().cloned().ok_or_else(|| "Response is not a JSON array".to_string())
}

pub struct ContradictionDetector {
    language_model: Arc<dyn LanguageModel>,
}

impl ContradictionDetector {
    pub fn new(language_model: Arc<dyn LanguageModel>) -> Self {
        Self { language_model }
    }

    /// Compara los pares en lotes secuenciales dentro del deal.
    ///
    /// # Errors:
    /// - `LlmError` reintentable: se re-lanza para que la cola
    ///   reprograme. Los fallos de parseo no son fatales.
    #[instrument(skip(self, pairs), fields(pair_count = pairs.len()))]
    pub async fn compare_batch(
        &self,
        pairs: &[(&Finding, &Finding)],
        batch_size: usize,
    ) -> Result<BatchComparisonResult, LlmError> {
        let mut result = BatchComparisonResult::default();

        if pairs.is_empty() {
            return Ok(result);
        }

        info!("⚖️  [CONTRADICTION]: Starting batch comparison of {} pair(s).", pairs.len());

        for (batch_idx, batch_pairs) in pairs.chunks(batch_size.max(1)).enumerate() {
            let prompt = batch_comparison_prompt(batch_pairs);

            let invocation = self
                .language_model
                .run(&prompt, Some(CONTRADICTION_SYSTEM_PROMPT), ModelTier::Pro)
                .await;

            let (response_text, usage) = match invocation {
                Ok(output) => output,
                Err(e) if e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(batch_idx, "Batch comparison failed (non-retryable LLM error): {}", e);
                    for (finding_a, finding_b) in batch_pairs {
                        result
                            .failed_comparisons
                            .push((finding_a.id.clone(), finding_b.id.clone()));
                    }
                    continue;
                }
            };

            result.total_input_tokens += usage.input_tokens;
            result.total_output_tokens += usage.output_tokens;
            result.batch_count += 1;

            let batch_verdicts = match parse_batch_response(&response_text) {
                Ok(verdicts) => verdicts,
                Err(parse_error) => {
                    warn!(batch_idx, "Batch comparison failed (parse error): {}", parse_error);
                    for (finding_a, finding_b) in batch_pairs {
                        result
                            .failed_comparisons
                            .push((finding_a.id.clone(), finding_b.id.clone()));
                    }
                    continue;
                }
            };

            for (pair_idx, (finding_a, finding_b)) in batch_pairs.iter().enumerate() {
                let verdict = batch_verdicts
                    .iter()
                    .find(|entry| entry["pair"].as_i64() == Some((pair_idx as i64) + 1));

                match verdict {
                    Some(entry) => {
                        let comparison = ContradictionComparison {
                            finding_a_id: finding_a.id.clone(),
                            finding_b_id: finding_b.id.clone(),
                            contradicts: entry["contradicts"].as_bool().unwrap_or(false),
                            confidence: entry["confidence"].as_f64().unwrap_or(0.0),
                            reason: entry["reason"].as_str().unwrap_or_default().to_string(),
                        };

                        debug!(
                            batch_idx,
                            pair_idx,
                            contradicts = comparison.contradicts,
                            confidence = comparison.confidence,
                            above_threshold = comparison.above_threshold(),
                            "Batch comparison result"
                        );
                        result.comparisons.push(comparison);
                    }
                    None => {
                        warn!(batch_idx, pair_idx, "No result found for pair in batch response");
                        result
                            .failed_comparisons
                            .push((finding_a.id.clone(), finding_b.id.clone()));
                    }
                }
            }
        }

        info!(
            comparisons = result.comparisons.len(),
            above_threshold = result.contradictions_found().len(),
            failed = result.failed_comparisons.len(),
            "⚖️  [CONTRADICTION]: Batch comparison complete."
        );

        Ok(result)
    }
}
