// [libs/domain/pipeline/src/parsers/convert.rs]
/*!
 * =================================================================
 * APARATO: BUILT-IN CONVERTERS (V5.2)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: CONVERTIDORES INCORPORADOS TEXTO/MARKDOWN/DELIMITADO
 *
 * # Logic:
 * - Documentos paginados: UTF-8 con saltos de página '\f'; tablas
 *   markdown detectadas dentro de cada página. Un payload PDF con
 *   diccionario '/Encrypt' es un fallo permanente de cifrado.
 * - Libros: texto delimitado (tab o coma); las líneas '# Sheet: X'
 *   abren hoja nueva; las celdas que comienzan con '=' preservan su
 *   fórmula como texto.
 * =================================================================
 */

use super::{
    CellData, ConvertedDocument, DocumentConverter, FileCategory, PageContent, ParserError,
    SheetData, TableData, WorkbookData, WorkbookReader,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::path::Path;

static TABLE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\|[-:| ]+\|$").expect("static pattern"));

fn file_label(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}

/// Convertidor incorporado para contenido textual y fixtures.
#[derive(Debug, Default)]
pub struct PlainTextConverter;

impl PlainTextConverter {
    fn decode(path: &Path, payload: Vec<u8>) -> Result<String, ParserError> {
        if payload.is_empty() {
            return Err(ParserError::Empty(file_label(path)));
        }

        if payload.starts_with(b"%PDF") {
            // Diccionario de cifrado presente: documento protegido.
            if payload.windows(8).any(|w| w == b"/Encrypt") {
                return Err(ParserError::Encrypted(file_label(path)));
            }
            // Carga de texto con cabecera PDF (fixtures): se descarta la
            // línea de cabecera y se procesa el resto como texto.
            let text = String::from_utf8_lossy(&payload);
            let without_header =
                text.lines().skip(1).collect::<Vec<&str>>().join("\n");
            if without_header.trim().is_empty() {
                return Err(ParserError::Empty(file_label(path)));
            }
            return Ok(without_header);
        }

        String::from_utf8(payload)
            .map_err(|_| ParserError::Corrupt(format!("undecodable binary payload in {}", file_label(path))))
    }

    /// Separa las tablas markdown del texto corrido de una página.
    fn split_tables(page_text: &str, page_number: i64) -> (String, Vec<TableData>) {
        let lines: Vec<&str> = page_text.lines().collect();
        let mut prose: Vec<String> = Vec::new();
        let mut tables: Vec<TableData> = Vec::new();

        let mut i = 0usize;
        while i < lines.len() {
            let line = lines[i].trim();
            let next_is_separator =
                i + 1 < lines.len() && TABLE_SEPARATOR.is_match(lines[i + 1].trim());

            if line.starts_with('|') && line.ends_with('|') && next_is_separator {
                // Bloque de tabla: cabecera, separador y filas contiguas.
                let mut block: Vec<&str> = vec![lines[i].trim(), lines[i + 1].trim()];
                let mut j = i + 2;
                while j < lines.len() {
                    let candidate = lines[j].trim();
                    if candidate.starts_with('|') && candidate.ends_with('|') {
                        block.push(candidate);
                        j += 1;
                    } else {
                        break;
                    }
                }

                let headers = parse_row(block[0]);
                let data: Vec<Vec<String>> = block[2..].iter().map(|row| parse_row(row)).collect();

                tables.push(TableData {
                    content: block.join("\n"),
                    rows: data.len() + 1,
                    cols: headers.len(),
                    headers,
                    data,
                    sheet_name: None,
                    page_number: Some(page_number),
                });

                i = j;
            } else {
                prose.push(lines[i].to_string());
                i += 1;
            }
        }

        (prose.join("\n"), tables)
    }
}

fn parse_row(row_line: &str) -> Vec<String> {
    row_line
        .trim()
        .trim_matches('|')
        .split('|')
        .map(|cell| cell.trim().to_string())
        .collect()
}

impl DocumentConverter for PlainTextConverter {
    fn convert(
        &self,
        path: &Path,
        _category: FileCategory,
    ) -> Result<ConvertedDocument, ParserError> {
        let payload = std::fs::read(path)?;
        let text = Self::decode(path, payload)?;

        if text.trim().is_empty() {
            return Err(ParserError::Empty(file_label(path)));
        }

        let pages: Vec<PageContent> = text
            .split('\u{c}')
            .enumerate()
            .filter(|(_, page_text)| !page_text.trim().is_empty())
            .map(|(idx, page_text)| {
                let page_number = (idx as i64) + 1;
                let (prose, tables) = Self::split_tables(page_text, page_number);
                PageContent { page_number, text: prose, tables }
            })
            .collect();

        if pages.is_empty() {
            return Err(ParserError::Empty(file_label(path)));
        }

        Ok(ConvertedDocument {
            metadata: json!({ "source": file_label(path), "converter": "plain_text" }),
            pages,
        })
    }
}

/// Lector incorporado de libros delimitados (CSV/TSV multi-hoja).
#[derive(Debug, Default)]
pub struct DelimitedWorkbookReader;

impl WorkbookReader for DelimitedWorkbookReader {
    fn read(&self, path: &Path) -> Result<WorkbookData, ParserError> {
        let payload = std::fs::read(path)?;
        if payload.is_empty() {
            return Err(ParserError::Empty(file_label(path)));
        }

        let text = String::from_utf8(payload)
            .map_err(|_| ParserError::Corrupt(format!("undecodable workbook payload in {}", file_label(path))))?;

        let delimiter = if text.contains('\t') { '\t' } else { ',' };

        let default_sheet_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "Sheet1".to_string());

        let mut sheets: Vec<SheetData> = Vec::new();
        let mut current = SheetData { name: default_sheet_name, rows: Vec::new() };

        for line in text.lines() {
            // Las líneas '# Sheet: NAME' abren una hoja nueva.
            if let Some(sheet_name) = line.trim().strip_prefix("# Sheet:") {
                if !current.rows.is_empty() {
                    sheets.push(current);
                }
                current = SheetData { name: sheet_name.trim().to_string(), rows: Vec::new() };
                continue;
            }

            if line.trim().is_empty() {
                current.rows.push(Vec::new());
                continue;
            }

            let cells: Vec<CellData> = line
                .split(delimiter)
                .map(|raw| {
                    let trimmed = raw.trim().trim_matches('"').to_string();
                    if trimmed.starts_with('=') {
                        CellData { value: String::new(), formula: Some(trimmed) }
                    } else {
                        CellData { value: trimmed, formula: None }
                    }
                })
                .collect();

            current.rows.push(cells);
        }

        if !current.rows.is_empty() {
            sheets.push(current);
        }

        if sheets.is_empty() {
            return Err(ParserError::Empty(file_label(path)));
        }

        Ok(WorkbookData { sheets })
    }
}
