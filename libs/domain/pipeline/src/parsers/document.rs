// [libs/domain/pipeline/src/parsers/document.rs]
/*!
 * =================================================================
 * APARATO: UNIVERSAL DOCUMENT PARSER (V9.3 - CATEGORY DISPATCH)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: DESPACHO POR CATEGORÍA Y ENSAMBLE DEL ParseResult
 *
 * # Logic:
 * - pdf/word/image: convertidor de páginas -> prosa + tablas por
 *   página, chunking semántico con atribución de página.
 * - spreadsheet: lector de libro -> fórmulas preservadas como texto
 *   (con referencia de celda y hoja), tabla por hoja, texto plano de
 *   hoja, y un chunk-resumen de fórmulas por documento.
 * - 'chunk_index' es denso, cero-based, global al documento.
 * =================================================================
 */

use super::{
    build_cell_reference, ChunkData, ChunkSource, ConvertedDocument, DocumentConverter,
    FileCategory, FormulaData, ParseResult, ParserError, SheetData, TableData, WorkbookData,
    WorkbookReader,
};
use crate::chunker::Chunker;
use acumen_domain_models::ChunkType;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

static CELL_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:'?[\w\s]+'?!)?\$?[A-Z]{1,3}\$?\d+").expect("static pattern")
});

/// Operadores que marcan una fórmula significativa para el resumen.
const SIGNIFICANT_FORMULA_MARKS: &[&str] =
    &["SUM", "AVERAGE", "IF", "VLOOKUP", "INDEX", "MATCH", "+", "-", "*", "/"];

pub struct UniversalParser {
    chunker: Chunker,
    converter: Arc<dyn DocumentConverter>,
    workbook_reader: Arc<dyn WorkbookReader>,
}

impl UniversalParser {
    pub fn new(
        chunker: Chunker,
        converter: Arc<dyn DocumentConverter>,
        workbook_reader: Arc<dyn WorkbookReader>,
    ) -> Self {
        Self { chunker, converter, workbook_reader }
    }

    /// Parsea el archivo según su categoría.
    ///
    /// # Errors:
    /// - `ParserError::Unsupported`: MIME sin categoría conocida.
    /// - `ParserError` del convertidor: cifrado, corrupto, vacío.
    #[instrument(skip(self), fields(file = %file_path.display()))]
    pub fn parse(&self, file_path: &Path, mime_type: &str) -> Result<ParseResult, ParserError> {
        let started = Instant::now();

        let category = FileCategory::detect(mime_type)
            .or_else(|| FileCategory::detect(&file_path.to_string_lossy()))
            .ok_or_else(|| ParserError::Unsupported(mime_type.to_string()))?;

        let mut result = match category {
            FileCategory::Spreadsheet => {
                let workbook = self.workbook_reader.read(file_path)?;
                self.parse_workbook(workbook, file_path)
            }
            _ => {
                let converted = self.converter.convert(file_path, category)?;
                self.parse_paged(converted, file_path)
            }
        }?;

        result.parse_time_ms = started.elapsed().as_millis() as i64;

        info!(
            category = category.as_str(),
            chunks = result.chunks.len(),
            tables = result.tables.len(),
            formulas = result.formulas.len(),
            parse_time_ms = result.parse_time_ms,
            "📄 [PARSER]: Document decomposed."
        );

        Ok(result)
    }

    fn parse_paged(
        &self,
        converted: ConvertedDocument,
        file_path: &Path,
    ) -> Result<ParseResult, ParserError> {
        let mut chunks: Vec<ChunkData> = Vec::new();
        let mut tables: Vec<TableData> = Vec::new();
        let warnings: Vec<String> = Vec::new();

        let total_pages = converted.pages.len() as i64;
        let source_file = file_name(file_path);
        let mut chunk_index = 0i64;

        for page in converted.pages {
            let source = ChunkSource {
                page_number: Some(page.page_number),
                sheet_name: None,
                cell_reference: None,
            };

            let mut base_metadata = Map::new();
            base_metadata.insert("source_file".into(), json!(source_file));

            if !page.text.trim().is_empty() {
                let page_chunks = self.chunker.chunk_text(
                    &page.text,
                    ChunkType::Text,
                    chunk_index,
                    &source,
                    &base_metadata,
                );
                chunk_index += page_chunks.len() as i64;
                chunks.extend(page_chunks);
            }

            for table in page.tables {
                let mut table_metadata = base_metadata.clone();
                table_metadata.insert("is_table".into(), json!(true));

                let table_chunks =
                    self.chunker.chunk_table(&table.content, chunk_index, &source, &table_metadata);
                chunk_index += table_chunks.len() as i64;
                chunks.extend(table_chunks);
                tables.push(table);
            }
        }

        Ok(ParseResult {
            chunks,
            tables,
            formulas: Vec::new(),
            metadata: converted.metadata,
            total_pages: Some(total_pages),
            total_sheets: None,
            parse_time_ms: 0,
            errors: Vec::new(),
            warnings,
        })
    }

    fn parse_workbook(
        &self,
        workbook: WorkbookData,
        file_path: &Path,
    ) -> Result<ParseResult, ParserError> {
        let mut chunks: Vec<ChunkData> = Vec::new();
        let mut tables: Vec<TableData> = Vec::new();
        let mut formulas: Vec<FormulaData> = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        let total_sheets = workbook.sheets.len() as i64;
        let source_file = file_name(file_path);
        let mut chunk_index = 0i64;

        for sheet in &workbook.sheets {
            match self.process_sheet(sheet) {
                Ok((sheet_text, sheet_table, sheet_formulas)) => {
                    let source = ChunkSource {
                        page_number: None,
                        sheet_name: Some(sheet.name.clone()),
                        cell_reference: None,
                    };

                    let mut base_metadata = Map::new();
                    base_metadata.insert("source_file".into(), json!(source_file));
                    base_metadata.insert("sheet_name".into(), json!(sheet.name));

                    if !sheet_text.trim().is_empty() {
                        let text_chunks = self.chunker.chunk_text(
                            &sheet_text,
                            ChunkType::Text,
                            chunk_index,
                            &source,
                            &base_metadata,
                        );
                        chunk_index += text_chunks.len() as i64;
                        chunks.extend(text_chunks);
                    }

                    if let Some(table) = sheet_table {
                        let mut table_metadata = base_metadata.clone();
                        table_metadata.insert("is_table".into(), json!(true));

                        let table_chunks = self.chunker.chunk_table(
                            &table.content,
                            chunk_index,
                            &source,
                            &table_metadata,
                        );
                        chunk_index += table_chunks.len() as i64;
                        chunks.extend(table_chunks);
                        tables.push(table);
                    }

                    formulas.extend(sheet_formulas);
                }
                Err(e) => {
                    errors.push(format!("Error processing sheet '{}': {}", sheet.name, e));
                    warn!("Sheet processing error on [{}]: {}", sheet.name, e);
                }
            }
        }

        // Chunk-resumen de fórmulas significativas, uno por documento.
        if !formulas.is_empty() {
            let summary = format_formulas_as_text(&formulas);
            if !summary.is_empty() {
                chunks.push(ChunkData {
                    content: summary,
                    chunk_type: ChunkType::Formula,
                    chunk_index,
                    token_count: None,
                    page_number: None,
                    sheet_name: None,
                    cell_reference: None,
                    metadata: json!({
                        "source_file": source_file,
                        "formula_count": formulas.len(),
                    }),
                });
            }
        }

        Ok(ParseResult {
            chunks,
            tables,
            formulas,
            metadata: json!({ "source": source_file, "total_sheets": total_sheets }),
            total_pages: None,
            total_sheets: Some(total_sheets),
            parse_time_ms: 0,
            errors,
            warnings: Vec::new(),
        })
    }

    /// Procesa una hoja: (texto plano, tabla detectada, fórmulas).
    fn process_sheet(
        &self,
        sheet: &SheetData,
    ) -> Result<(String, Option<TableData>, Vec<FormulaData>), ParserError> {
        let mut formulas: Vec<FormulaData> = Vec::new();

        // Fórmulas preservadas como texto, con referencia 1-based.
        for (row_idx, row) in sheet.rows.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                if let Some(formula) = &cell.formula {
                    formulas.push(FormulaData {
                        formula: formula.clone(),
                        cell_reference: build_cell_reference(row_idx + 1, col_idx + 1),
                        sheet_name: sheet.name.clone(),
                        result_value: if cell.value.is_empty() {
                            None
                        } else {
                            Some(cell.value.clone())
                        },
                        references: extract_cell_references(formula),
                    });
                }
            }
        }

        let table = detect_sheet_table(sheet);
        let text = sheet_to_text(sheet);

        Ok((text, table, formulas))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}

fn cell_display(cell: &super::CellData) -> String {
    if let Some(formula) = &cell.formula {
        if cell.value.is_empty() {
            return formula.clone();
        }
    }
    cell.value.clone()
}

/// Heurística de tabla por hoja: una fila-encabezado con 3+ celdas no
/// vacías seguida de al menos una fila con datos.
fn detect_sheet_table(sheet: &SheetData) -> Option<TableData> {
    let header_row_idx = sheet.rows.iter().position(|row| {
        row.iter().filter(|cell| !cell_display(cell).trim().is_empty()).count() >= 3
    })?;

    let headers: Vec<String> =
        sheet.rows[header_row_idx].iter().map(cell_display).collect();
    if headers.is_empty() {
        return None;
    }

    let mut data: Vec<Vec<String>> = Vec::new();
    for row in sheet.rows.iter().skip(header_row_idx + 1) {
        if row.iter().all(|cell| cell_display(cell).trim().is_empty()) {
            break;
        }
        let mut cells: Vec<String> = row.iter().map(cell_display).collect();
        cells.resize(headers.len(), String::new());
        cells.truncate(headers.len());
        data.push(cells);
    }

    if data.is_empty() {
        return None;
    }

    Some(TableData {
        content: build_markdown_table(&headers, &data),
        rows: data.len() + 1,
        cols: headers.len(),
        headers,
        data,
        sheet_name: Some(sheet.name.clone()),
        page_number: None,
    })
}

fn build_markdown_table(headers: &[String], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return String::new();
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format!(
        "| {} |",
        headers.iter().map(|h| if h.is_empty() { " " } else { h.as_str() }).collect::<Vec<_>>().join(" | ")
    ));
    lines.push(format!("| {} |", vec!["---"; headers.len()].join(" | ")));

    for row in rows {
        lines.push(format!(
            "| {} |",
            row.iter().map(|c| if c.is_empty() { " " } else { c.as_str() }).collect::<Vec<_>>().join(" | ")
        ));
    }

    lines.join("\n")
}

/// Representación de texto plano de la hoja; las fórmulas se muestran
/// como '[Formula: =...]'.
fn sheet_to_text(sheet: &SheetData) -> String {
    let mut lines: Vec<String> = Vec::new();

    for row in &sheet.rows {
        let mut row_values: Vec<String> = Vec::new();
        let mut has_content = false;

        for cell in row {
            if let Some(formula) = &cell.formula {
                has_content = true;
                row_values.push(format!("[Formula: {}]", formula));
            } else if !cell.value.is_empty() {
                has_content = true;
                row_values.push(cell.value.clone());
            }
        }

        if has_content {
            let content = row_values.join("\t");
            if !content.trim().is_empty() {
                lines.push(content);
            }
        }
    }

    if lines.is_empty() {
        String::new()
    } else {
        format!("## Sheet: {}\n\n{}", sheet.name, lines.join("\n"))
    }
}

/// Referencias de celda dentro de una fórmula: '=SUM(B2:B13)' -> [B2, B13].
fn extract_cell_references(formula: &str) -> Vec<String> {
    let upper = formula.to_uppercase();
    let mut references: Vec<String> =
        CELL_REFERENCE.find_iter(&upper).map(|m| m.as_str().to_string()).collect();
    references.sort();
    references.dedup();
    references
}

/// Resumen legible de fórmulas significativas, agrupado por hoja.
fn format_formulas_as_text(formulas: &[FormulaData]) -> String {
    if formulas.is_empty() {
        return String::new();
    }

    let mut by_sheet: BTreeMap<&str, Vec<&FormulaData>> = BTreeMap::new();
    for formula in formulas {
        by_sheet.entry(formula.sheet_name.as_str()).or_default().push(formula);
    }

    let mut lines = vec!["## Formula Summary\n".to_string()];

    for (sheet_name, sheet_formulas) in by_sheet {
        lines.push(format!("\n### Sheet: {}\n", sheet_name));

        let significant = sheet_formulas.iter().filter(|f| {
            let upper = f.formula.to_uppercase();
            SIGNIFICANT_FORMULA_MARKS.iter().any(|mark| upper.contains(mark))
        });

        for formula in significant.take(50) {
            let result = formula
                .result_value
                .as_ref()
                .map(|v| format!(" = {}", v))
                .unwrap_or_default();
            lines.push(format!("- **{}**: `{}`{}", formula.cell_reference, formula.formula, result));
        }
    }

    lines.join("\n")
}
