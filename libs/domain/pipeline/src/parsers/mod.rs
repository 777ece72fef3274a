// [libs/domain/pipeline/src/parsers/mod.rs]
/*!
 * =================================================================
 * APARATO: PARSER CONTRACTS (V6.1 - CAPABILITY SEAMS)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: TIPOS DE PARSEO Y COSTURAS DE CAPACIDAD
 *
 * # Logic:
 * La decodificación binaria de formatos propietarios cruza una costura
 * de capacidad ('DocumentConverter' / 'WorkbookReader'); el pipeline
 * solo conoce el contrato. Los convertidores incorporados manejan
 * texto, páginas estilo markdown y libros delimitados; todo payload
 * indescifrable es un error de parseo permanente.
 * =================================================================
 */

pub mod convert;
pub mod document;

use acumen_domain_models::ChunkType;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Fallos de parseo. Los mensajes están redactados para que el
/// clasificador los resuelva al tipo correcto sin ayuda.
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Unsupported format: {0}")]
    Unsupported(String),

    #[error("Invalid file: {0}")]
    Corrupt(String),

    #[error("File is password protected: {0}")]
    Encrypted(String),

    #[error("Empty file: no extractable content in {0}")]
    Empty(String),

    #[error("File too large: {0}")]
    TooLarge(String),

    #[error("Parse error: {0}")]
    Malformed(String),

    #[error("IO failure while parsing: {0}")]
    Io(#[from] std::io::Error),
}

/// Categoría gruesa del archivo, derivada de MIME con fallback a extensión.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Pdf,
    Spreadsheet,
    Word,
    Image,
}

impl FileCategory {
    pub fn detect(mime_or_extension: &str) -> Option<Self> {
        let lowered = mime_or_extension.to_lowercase();

        if lowered.contains("pdf") {
            return Some(Self::Pdf);
        }
        if lowered.contains("spreadsheet")
            || lowered.contains("excel")
            || lowered.contains("csv")
            || lowered.ends_with(".xlsx")
            || lowered.ends_with(".xls")
            || lowered.ends_with(".tsv")
        {
            return Some(Self::Spreadsheet);
        }
        if lowered.contains("word")
            || lowered.contains("officedocument.wordprocessingml")
            || lowered.ends_with(".docx")
            || lowered.ends_with(".doc")
            || lowered.contains("text/plain")
            || lowered.contains("markdown")
            || lowered.ends_with(".txt")
            || lowered.ends_with(".md")
        {
            return Some(Self::Word);
        }
        if lowered.contains("image") || lowered.ends_with(".png") || lowered.ends_with(".jpg") {
            return Some(Self::Image);
        }
        None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Spreadsheet => "spreadsheet",
            Self::Word => "word",
            Self::Image => "image",
        }
    }
}

/// Atribución de origen de un chunk en construcción.
#[derive(Debug, Clone, Default)]
pub struct ChunkSource {
    pub page_number: Option<i64>,
    pub sheet_name: Option<String>,
    pub cell_reference: Option<String>,
}

/// Chunk producido por el parseo, previo a su persistencia.
#[derive(Debug, Clone)]
pub struct ChunkData {
    pub content: String,
    pub chunk_type: ChunkType,
    pub chunk_index: i64,
    pub token_count: Option<i64>,
    pub page_number: Option<i64>,
    pub sheet_name: Option<String>,
    pub cell_reference: Option<String>,
    pub metadata: Value,
}

/// Tabla estructurada detectada durante el parseo.
#[derive(Debug, Clone)]
pub struct TableData {
    /// Representación markdown de la tabla completa.
    pub content: String,
    pub rows: usize,
    pub cols: usize,
    pub headers: Vec<String>,
    pub data: Vec<Vec<String>>,
    pub sheet_name: Option<String>,
    pub page_number: Option<i64>,
}

/// Fórmula preservada como texto, con sus referencias de celda.
#[derive(Debug, Clone)]
pub struct FormulaData {
    pub formula: String,
    pub cell_reference: String,
    pub sheet_name: String,
    pub result_value: Option<String>,
    pub references: Vec<String>,
}

/// Resultado completo de la etapa de parseo.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub chunks: Vec<ChunkData>,
    pub tables: Vec<TableData>,
    pub formulas: Vec<FormulaData>,
    pub metadata: Value,
    pub total_pages: Option<i64>,
    pub total_sheets: Option<i64>,
    pub parse_time_ms: i64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Página ya decodificada por el convertidor externo.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub page_number: i64,
    pub text: String,
    pub tables: Vec<TableData>,
}

#[derive(Debug, Clone, Default)]
pub struct ConvertedDocument {
    pub pages: Vec<PageContent>,
    pub metadata: Value,
}

/// Costura de capacidad: decodificación de documentos paginados
/// (equivalente a la librería de conversión documental externa).
pub trait DocumentConverter: Send + Sync {
    fn convert(&self, path: &Path, category: FileCategory)
        -> Result<ConvertedDocument, ParserError>;
}

/// Celda cruda de un libro: valor calculado y fórmula opcional.
#[derive(Debug, Clone, Default)]
pub struct CellData {
    pub value: String,
    pub formula: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SheetData {
    pub name: String,
    pub rows: Vec<Vec<CellData>>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkbookData {
    pub sheets: Vec<SheetData>,
}

/// Costura de capacidad: lectura celda a celda de hojas de cálculo.
pub trait WorkbookReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<WorkbookData, ParserError>;
}

/// Letra de columna estilo Excel desde índice 1-based (1 -> A, 27 -> AA).
pub fn column_letter(mut column: usize) -> String {
    let mut letters = String::new();
    while column > 0 {
        column -= 1;
        letters.insert(0, (b'A' + (column % 26) as u8) as char);
        column /= 26;
    }
    letters
}

/// Referencia de celda estilo Excel desde fila/columna 1-based.
pub fn build_cell_reference(row: usize, column: usize) -> String {
    format!("{}{}", column_letter(column), row)
}
