// [libs/domain/pipeline/src/chunker.rs]
/*!
 * =================================================================
 * APARATO: SEMANTIC CHUNKER (V8.0 - TOKEN BUDGETED)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: PARTICIÓN SEMÁNTICA BAJO PRESUPUESTO DE TOKENS
 *
 * # Logic:
 * Párrafo primero; oración cuando el párrafo desborda; ventana de
 * tokens como último recurso. Las tablas se mantienen enteras bajo el
 * techo; al partirlas, cada parte repite encabezado + separador y
 * carga is_complete_table=false con su ordinal table_part.
 *
 * El conteo de tokens es un estimador determinista por palabras
 * (~4 caracteres por token); una aproximación suficiente para
 * presupuestar embeddings sin arrastrar un modelo de vocabulario.
 * =================================================================
 */

use crate::parsers::{ChunkData, ChunkSource};
use acumen_domain_models::ChunkType;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::debug;

static PARAGRAPH_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("static pattern"));
static SENTENCE_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<end>[.!?])\s+(?P<start>[A-Z])").expect("static pattern"));
static TABLE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\|[-:| ]+\|$").expect("static pattern"));

/// Estimador determinista: cada palabra pesa ~len/4 tokens, mínimo 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenEstimator;

impl TokenEstimator {
    fn word_weight(word: &str) -> usize {
        word.chars().count().div_ceil(4).max(1)
    }

    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        text.split_whitespace().map(Self::word_weight).sum()
    }

    /// Últimas palabras cuyo peso acumulado cubre 'token_budget'.
    pub fn tail(&self, text: &str, token_budget: usize) -> String {
        if token_budget == 0 {
            return String::new();
        }
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut accumulated = 0usize;
        let mut taken = Vec::new();

        for word in words.iter().rev() {
            accumulated += Self::word_weight(word);
            taken.push(*word);
            if accumulated >= token_budget {
                break;
            }
        }

        taken.reverse();
        taken.join(" ")
    }
}

pub struct Chunker {
    min_tokens: usize,
    max_tokens: usize,
    overlap_tokens: usize,
    estimator: TokenEstimator,
}

impl Chunker {
    pub fn new(min_tokens: usize, max_tokens: usize, overlap_tokens: usize) -> Self {
        Self { min_tokens, max_tokens, overlap_tokens, estimator: TokenEstimator }
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.estimator.count(text)
    }

    /// Particiona texto libre respetando fronteras semánticas.
    /// 'start_index' es el próximo chunk_index denso del documento.
    pub fn chunk_text(
        &self,
        text: &str,
        chunk_type: ChunkType,
        start_index: i64,
        source: &ChunkSource,
        base_metadata: &Map<String, Value>,
    ) -> Vec<ChunkData> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let paragraphs = self.split_into_paragraphs(text);

        let mut chunks: Vec<ChunkData> = Vec::new();
        let mut current_parts: Vec<String> = Vec::new();
        let mut current_tokens = 0usize;
        let mut chunk_index = start_index;

        let mut flush =
            |parts: &mut Vec<String>, tokens: &mut usize, index: &mut i64, out: &mut Vec<ChunkData>| {
                if parts.is_empty() {
                    return;
                }
                let content = parts.join("\n\n");
                out.push(self.create_chunk(
                    content,
                    chunk_type,
                    *index,
                    *tokens,
                    source,
                    base_metadata.clone(),
                ));
                *index += 1;
                parts.clear();
                *tokens = 0;
            };

        for paragraph in paragraphs {
            let paragraph_tokens = self.count_tokens(&paragraph);

            // Un solo párrafo que desborda el techo baja al nivel oración.
            if paragraph_tokens > self.max_tokens {
                flush(&mut current_parts, &mut current_tokens, &mut chunk_index, &mut chunks);

                for piece in self.split_large_paragraph(&paragraph) {
                    let piece_tokens = self.count_tokens(&piece);
                    chunks.push(self.create_chunk(
                        piece,
                        chunk_type,
                        chunk_index,
                        piece_tokens,
                        source,
                        base_metadata.clone(),
                    ));
                    chunk_index += 1;
                }
                continue;
            }

            let mut potential = current_tokens + paragraph_tokens;
            if !current_parts.is_empty() {
                potential += 2;
            }

            if potential > self.max_tokens {
                // Cerramos el chunk y arrancamos el siguiente con solape.
                let overlap_seed = if self.overlap_tokens > 0 && !current_parts.is_empty() {
                    let previous = current_parts.join("\n\n");
                    let tail = self.estimator.tail(&previous, self.overlap_tokens);
                    if tail.is_empty() {
                        None
                    } else {
                        Some(tail)
                    }
                } else {
                    None
                };

                flush(&mut current_parts, &mut current_tokens, &mut chunk_index, &mut chunks);

                if let Some(seed) = overlap_seed {
                    current_tokens = self.count_tokens(&seed) + paragraph_tokens + 2;
                    current_parts.push(seed);
                    current_parts.push(paragraph);
                } else {
                    current_tokens = paragraph_tokens;
                    current_parts.push(paragraph);
                }
            } else {
                current_parts.push(paragraph);
                current_tokens = potential;
            }
        }

        flush(&mut current_parts, &mut current_tokens, &mut chunk_index, &mut chunks);

        debug!(
            input_tokens = self.count_tokens(text),
            num_chunks = chunks.len(),
            "Text chunked"
        );

        chunks
    }

    /// Una tabla se mantiene entera bajo el techo; al partirla, cada
    /// parte repite el encabezado y carga su ordinal.
    pub fn chunk_table(
        &self,
        table_content: &str,
        start_index: i64,
        source: &ChunkSource,
        base_metadata: &Map<String, Value>,
    ) -> Vec<ChunkData> {
        let table_tokens = self.count_tokens(table_content);

        if table_tokens <= self.max_tokens {
            let mut metadata = base_metadata.clone();
            metadata.insert("is_complete_table".into(), json!(true));
            return vec![self.create_chunk(
                table_content.to_string(),
                ChunkType::Table,
                start_index,
                table_tokens,
                source,
                metadata,
            )];
        }

        let lines: Vec<&str> = table_content.trim().split('\n').collect();

        // Encabezado = filas hasta la línea separadora inclusive.
        let mut header_lines: Vec<&str> = Vec::new();
        let mut data_start = 0usize;
        for (i, line) in lines.iter().enumerate() {
            if TABLE_SEPARATOR.is_match(line) {
                header_lines = lines[..=i].to_vec();
                data_start = i + 1;
                break;
            }
        }

        if header_lines.is_empty() {
            // Sin formato markdown: tratar como texto plano tipado tabla.
            return self.chunk_text(
                table_content,
                ChunkType::Table,
                start_index,
                source,
                base_metadata,
            );
        }

        let header_text = header_lines.join("\n");
        let header_tokens = self.count_tokens(&header_text);

        let mut chunks: Vec<ChunkData> = Vec::new();
        let mut chunk_index = start_index;
        let mut current_rows: Vec<&str> = Vec::new();
        let mut current_tokens = header_tokens;

        for line in &lines[data_start..] {
            let row_tokens = self.count_tokens(line);

            if current_tokens + row_tokens + 1 > self.max_tokens && !current_rows.is_empty() {
                let content = format!("{}\n{}", header_text, current_rows.join("\n"));
                let mut metadata = base_metadata.clone();
                metadata.insert("is_complete_table".into(), json!(false));
                metadata.insert("table_part".into(), json!(chunks.len() + 1));
                chunks.push(self.create_chunk(
                    content,
                    ChunkType::Table,
                    chunk_index,
                    current_tokens,
                    source,
                    metadata,
                ));
                chunk_index += 1;
                current_rows.clear();
                current_tokens = header_tokens;
            }

            current_rows.push(line);
            current_tokens += row_tokens + 1;
        }

        if !current_rows.is_empty() {
            let content = format!("{}\n{}", header_text, current_rows.join("\n"));
            let mut metadata = base_metadata.clone();
            metadata.insert("is_complete_table".into(), json!(chunks.is_empty()));
            metadata.insert("table_part".into(), json!(chunks.len() + 1));
            chunks.push(self.create_chunk(
                content,
                ChunkType::Table,
                chunk_index,
                current_tokens,
                source,
                metadata,
            ));
        }

        chunks
    }

    fn split_into_paragraphs(&self, text: &str) -> Vec<String> {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        PARAGRAPH_SPLIT
            .split(&normalized)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn split_large_paragraph(&self, paragraph: &str) -> Vec<String> {
        let sentences = self.split_into_sentences(paragraph);

        let mut pieces: Vec<String> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_tokens = 0usize;

        for sentence in sentences {
            let sentence_tokens = self.count_tokens(&sentence);

            // Oración imposible: ventana de tokens como último recurso.
            if sentence_tokens > self.max_tokens {
                if !current.is_empty() {
                    pieces.push(current.join(" "));
                    current.clear();
                    current_tokens = 0;
                }
                pieces.extend(self.force_split_by_tokens(&sentence));
                continue;
            }

            let mut potential = current_tokens + sentence_tokens;
            if !current.is_empty() {
                potential += 1;
            }

            if potential > self.max_tokens {
                pieces.push(current.join(" "));
                current = vec![sentence];
                current_tokens = sentence_tokens;
            } else {
                current.push(sentence);
                current_tokens = potential;
            }
        }

        if !current.is_empty() {
            pieces.push(current.join(" "));
        }

        pieces
    }

    fn split_into_sentences(&self, text: &str) -> Vec<String> {
        // Insertamos un marcador en cada frontera y partimos por él;
        // el lookbehind no está disponible en este motor de regex.
        let marked = SENTENCE_SPLIT.replace_all(text, "$end\u{1}$start");
        marked
            .split('\u{1}')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Ventana deslizante de palabras bajo el techo, con solape.
    fn force_split_by_tokens(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let step = self.max_tokens.saturating_sub(self.overlap_tokens).max(1);
        let mut pieces = Vec::new();
        let mut window_start = 0usize;

        while window_start < words.len() {
            let mut accumulated = 0usize;
            let mut end = window_start;
            while end < words.len() {
                let weight = TokenEstimator::word_weight(words[end]);
                if accumulated + weight > self.max_tokens && end > window_start {
                    break;
                }
                accumulated += weight;
                end += 1;
            }
            pieces.push(words[window_start..end].join(" "));

            // Avance por peso: saltamos 'step' tokens desde el inicio.
            let mut advanced = 0usize;
            let mut next_start = window_start;
            while next_start < words.len() && advanced < step {
                advanced += TokenEstimator::word_weight(words[next_start]);
                next_start += 1;
            }
            if next_start == window_start {
                break;
            }
            window_start = next_start;
            if window_start >= words.len() {
                break;
            }
            if end >= words.len() && window_start >= end {
                break;
            }
        }

        pieces
    }

    fn create_chunk(
        &self,
        content: String,
        chunk_type: ChunkType,
        chunk_index: i64,
        token_count: usize,
        source: &ChunkSource,
        metadata: Map<String, Value>,
    ) -> ChunkData {
        ChunkData {
            content,
            chunk_type,
            chunk_index,
            token_count: Some(token_count as i64),
            page_number: source.page_number,
            sheet_name: source.sheet_name.clone(),
            cell_reference: source.cell_reference.clone(),
            metadata: Value::Object(metadata),
        }
    }

    pub fn min_tokens(&self) -> usize {
        self.min_tokens
    }
}
