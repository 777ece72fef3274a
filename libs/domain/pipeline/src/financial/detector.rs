// [libs/domain/pipeline/src/financial/detector.rs]
/*!
 * =================================================================
 * APARATO: FINANCIAL DOCUMENT DETECTOR (V7.1 - EN/DE PATTERNS)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: PUNTUACIÓN DE EVIDENCIA FINANCIERA EN ParseResult
 *
 * # Logic:
 * Evidencia puntuada por patrones sobre encabezados de tabla (15 pts),
 * densidad numérica (10), fórmulas (10-20 + agregaciones SUM) y
 * terminología en chunks (5/3/2). Confianza final:
 * max*1.5 + (total-max)*0.3, con refuerzo x1.2 si coexisten tablas y
 * fórmulas. El umbral de aceptación es >= 30 (inclusive).
 * =================================================================
 */

use crate::parsers::{ChunkData, FormulaData, ParseResult, TableData};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use tracing::{info, instrument};

/// Confianza mínima para considerar el documento financiero.
pub const MIN_CONFIDENCE_THRESHOLD: f64 = 30.0;
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 70.0;

fn patterns(raw: &[&str]) -> Vec<Regex> {
    raw.iter()
        .map(|p| {
            RegexBuilder::new(p).case_insensitive(true).build().expect("static detector pattern")
        })
        .collect()
}

static INCOME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"income\s*statement",
        r"profit\s*(?:and|&)?\s*loss",
        r"p\s*(?:and|&)?\s*l",
        r"revenue",
        r"sales",
        r"net\s*sales",
        r"gross\s*profit",
        r"operating\s*(?:income|profit|expenses?)",
        r"ebitda",
        r"ebit",
        r"net\s*income",
        r"cost\s*of\s*(?:goods\s*)?sold",
        r"cogs",
        r"gross\s*margin",
        // Alemán
        r"gewinn[\s-]*und[\s-]*verlust",
        r"guv",
        r"erfolgsrechnung",
        r"umsatz",
        r"erlöse",
        r"rohergebnis",
        r"betriebsergebnis",
        r"jahresüberschuss",
        r"herstellungskosten",
        r"bruttogewinn",
        r"bruttomarge",
    ])
});

static BALANCE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"balance\s*sheet",
        r"assets?",
        r"liabilit(?:y|ies)",
        r"equity",
        r"shareholders?\s*equity",
        r"total\s*assets?",
        r"current\s*assets?",
        r"fixed\s*assets?",
        r"current\s*liabilit(?:y|ies)",
        r"long[\s-]*term\s*debt",
        r"working\s*capital",
        r"retained\s*earnings",
        // Alemán
        r"bilanz",
        r"aktiva",
        r"passiva",
        r"bilanzsumme",
        r"eigenkapital",
        r"fremdkapital",
        r"verbindlichkeiten",
        r"anlagevermögen",
        r"umlaufvermögen",
        r"rückstellungen",
    ])
});

static CASHFLOW_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"cash\s*flow",
        r"statement\s*of\s*cash\s*flows?",
        r"operating\s*(?:cash\s*)?(?:activities|cash\s*flow)",
        r"investing\s*(?:activities|cash\s*flow)",
        r"financing\s*(?:activities|cash\s*flow)",
        r"free\s*cash\s*flow",
        r"fcf",
        r"capex",
        r"capital\s*expenditure",
        r"depreciation",
        r"amortization",
        // Alemán
        r"kapitalfluss",
        r"cashflow",
        r"mittelfluss",
        r"liquiditätsrechnung",
        r"operativer\s*cashflow",
        r"investitions(?:tätigkeit|cashflow)",
        r"finanzierungs(?:tätigkeit|cashflow)",
    ])
});

static MODEL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"financial\s*model",
        r"forecast",
        r"projection",
        r"budget",
        r"plan(?:ung)?",
        r"scenario",
        r"sensitivity",
        r"dcf",
        r"discounted\s*cash\s*flow",
        r"valuation",
        r"multiple",
        r"npv",
        r"irr",
        r"wacc",
        r"terminal\s*value",
    ])
});

static ACTUAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"\d{4}\s*[aA](?:ctual)?",
        r"(?:ist|actual)[\s-]*\d{4}",
        r"ytd",
        r"year[\s-]*to[\s-]*date",
        r"[hH]1\s*\d{4}",
        r"[hH]2\s*\d{4}",
    ])
});

static PROJECTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"\d{4}\s*[eEfFpP](?:stimate|orecast|rojection)?",
        r"(?:plan|forecast|projection|budget)[\s-]*\d{4}",
        r"(?:\d{4}|\d{2})[\s-]*(?:plan|fc|budget)",
    ])
});

static NUMERIC_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\$€£¥]?\s*-?[\d,\.]+\s*[%KMB]?$").expect("static pattern"));

/// Resultado de la detección, con el desglose de evidencia.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub has_financial_data: bool,
    /// Escala 0-100.
    pub confidence: f64,
    pub document_type: Option<String>,
    pub detected_patterns: Vec<String>,
    pub sheet_classifications: HashMap<String, String>,
    pub table_count: usize,
    pub formula_count: usize,
}

#[derive(Debug, Default, Clone)]
pub struct FinancialDocumentDetector;

impl FinancialDocumentDetector {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, parse_result))]
    pub fn detect(&self, parse_result: &ParseResult) -> DetectionResult {
        let mut detected_patterns: Vec<String> = Vec::new();
        let mut sheet_classifications: HashMap<String, String> = HashMap::new();
        let mut scores: HashMap<&'static str, f64> = HashMap::from([
            ("income_statement", 0.0),
            ("balance_sheet", 0.0),
            ("cash_flow", 0.0),
            ("financial_model", 0.0),
        ]);

        for table in &parse_result.tables {
            let table_score = analyze_table(table, &mut detected_patterns, &mut scores);
            if let (Some(sheet_name), true) = (&table.sheet_name, table_score > 0.0) {
                if let Some(primary) = primary_type(&scores) {
                    sheet_classifications.insert(sheet_name.clone(), primary);
                }
            }
        }

        let formula_score = analyze_formulas(&parse_result.formulas, &mut detected_patterns);
        *scores.entry("financial_model").or_default() += formula_score;

        analyze_chunks(&parse_result.chunks, &mut detected_patterns, &mut scores);

        let max_score = scores.values().cloned().fold(0.0_f64, f64::max);
        let total_score: f64 = scores.values().sum();

        let mut confidence = (max_score * 1.5 + (total_score - max_score) * 0.3).min(100.0);
        if !parse_result.tables.is_empty() && !parse_result.formulas.is_empty() {
            confidence = (confidence * 1.2).min(100.0);
        }
        confidence = (confidence * 100.0).round() / 100.0;

        // Umbral inclusivo: exactamente 30 acepta.
        let has_financial_data = confidence >= MIN_CONFIDENCE_THRESHOLD;

        detected_patterns.sort();
        detected_patterns.dedup();

        let result = DetectionResult {
            has_financial_data,
            confidence,
            document_type: if has_financial_data { primary_type(&scores) } else { None },
            detected_patterns,
            sheet_classifications,
            table_count: parse_result.tables.len(),
            formula_count: parse_result.formulas.len(),
        };

        info!(
            has_financial_data,
            confidence = result.confidence,
            document_type = ?result.document_type,
            "💹 [FIN_DETECTOR]: Detection complete."
        );

        result
    }

    pub fn is_projection_year(&self, text: &str) -> bool {
        PROJECTION_PATTERNS.iter().any(|p| p.is_match(text))
    }

    pub fn is_actual_year(&self, text: &str) -> bool {
        if ACTUAL_PATTERNS.iter().any(|p| p.is_match(text)) {
            return true;
        }
        // Años de 4 dígitos sin sufijo son típicamente reales.
        Regex::new(r"^\d{4}$").expect("static pattern").is_match(text.trim())
    }
}

fn analyze_table(
    table: &TableData,
    detected_patterns: &mut Vec<String>,
    scores: &mut HashMap<&'static str, f64>,
) -> f64 {
    let mut total_score = 0.0;
    let headers_text = table.headers.join(" ").to_lowercase();

    for (family, pattern_set, label) in [
        ("income_statement", &*INCOME_PATTERNS, "income"),
        ("balance_sheet", &*BALANCE_PATTERNS, "balance"),
        ("cash_flow", &*CASHFLOW_PATTERNS, "cashflow"),
    ] {
        for pattern in pattern_set {
            if pattern.is_match(&headers_text) {
                *scores.entry(family).or_default() += 15.0;
                detected_patterns.push(format!("{}:{}", label, pattern.as_str()));
                total_score += 15.0;
            }
        }
    }

    // Densidad numérica: tablas cargadas de cifras puntúan como modelo.
    let numeric_count = table
        .data
        .iter()
        .flat_map(|row| row.iter())
        .filter(|cell| NUMERIC_CELL.is_match(cell.trim()))
        .count();

    if table.rows > 0 && table.cols > 0 {
        let numeric_ratio = numeric_count as f64 / (table.rows * table.cols) as f64;
        if numeric_ratio > 0.5 {
            *scores.entry("financial_model").or_default() += 10.0;
            total_score += 10.0;
        }
    }

    total_score
}

fn analyze_formulas(formulas: &[FormulaData], detected_patterns: &mut Vec<String>) -> f64 {
    if formulas.is_empty() {
        return 0.0;
    }

    let mut score = 0.0;
    let formula_count = formulas.len();

    if formula_count > 10 {
        score += 20.0;
    } else {
        score += 10.0;
    }
    detected_patterns.push(format!("formula_count:{}", formula_count));

    let sum_count = formulas.iter().filter(|f| f.formula.to_uppercase().contains("SUM")).count();
    let complex_count = formulas.iter().filter(|f| f.references.len() > 2).count();

    if sum_count > 5 {
        score += 15.0;
        detected_patterns.push(format!("sum_formulas:{}", sum_count));
    }
    if complex_count > 3 {
        score += 10.0;
        detected_patterns.push(format!("complex_formulas:{}", complex_count));
    }

    score
}

fn analyze_chunks(
    chunks: &[ChunkData],
    detected_patterns: &mut Vec<String>,
    scores: &mut HashMap<&'static str, f64>,
) -> f64 {
    let mut total_score = 0.0;

    for chunk in chunks {
        let content = chunk.content.to_lowercase();

        // Una sola cuenta por chunk y familia.
        if let Some(pattern) = MODEL_PATTERNS.iter().find(|p| p.is_match(&content)) {
            *scores.entry("financial_model").or_default() += 5.0;
            detected_patterns.push(format!("model:{}", pattern.as_str()));
            total_score += 5.0;
        }

        if let Some(pattern) = ACTUAL_PATTERNS.iter().find(|p| p.is_match(&content)) {
            detected_patterns.push(format!("actual:{}", pattern.as_str()));
            total_score += 2.0;
        }

        if let Some(pattern) = PROJECTION_PATTERNS.iter().find(|p| p.is_match(&content)) {
            detected_patterns.push(format!("projection:{}", pattern.as_str()));
            *scores.entry("financial_model").or_default() += 3.0;
            total_score += 3.0;
        }
    }

    total_score
}

fn primary_type(scores: &HashMap<&'static str, f64>) -> Option<String> {
    scores
        .iter()
        .filter(|(_, score)| **score > 0.0)
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(family, _)| family.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::TableData;

    fn financial_table() -> TableData {
        TableData {
            content: String::new(),
            rows: 3,
            cols: 4,
            headers: vec![
                "Income Statement".into(),
                "2022".into(),
                "2023".into(),
                "2024E".into(),
            ],
            data: vec![
                vec!["Revenue".into(), "100000".into(), "120000".into(), "150000".into()],
                vec!["EBITDA".into(), "20000".into(), "25000".into(), "32000".into()],
            ],
            sheet_name: Some("P&L".into()),
            page_number: None,
        }
    }

    #[test]
    fn pnl_table_with_formulas_crosses_threshold() {
        let parse_result = ParseResult {
            tables: vec![financial_table()],
            formulas: vec![FormulaData {
                formula: "=SUM(B2:B13)".into(),
                cell_reference: "B14".into(),
                sheet_name: "P&L".into(),
                result_value: None,
                references: vec!["B2".into(), "B13".into()],
            }],
            ..ParseResult::default()
        };

        let detection = FinancialDocumentDetector::new().detect(&parse_result);
        assert!(detection.has_financial_data);
        assert!(detection.confidence >= MIN_CONFIDENCE_THRESHOLD);
        assert_eq!(detection.sheet_classifications.get("P&L").map(String::as_str), Some("income_statement"));
    }

    #[test]
    fn prose_document_stays_below_threshold() {
        let parse_result = ParseResult {
            chunks: vec![ChunkData {
                content: "The quarterly newsletter covers team events and holidays.".into(),
                chunk_type: acumen_domain_models::ChunkType::Text,
                chunk_index: 0,
                token_count: None,
                page_number: Some(1),
                sheet_name: None,
                cell_reference: None,
                metadata: serde_json::json!({}),
            }],
            ..ParseResult::default()
        };

        let detection = FinancialDocumentDetector::new().detect(&parse_result);
        assert!(!detection.has_financial_data);
        assert!(detection.document_type.is_none());
    }

    #[test]
    fn projection_and_actual_year_heuristics() {
        let detector = FinancialDocumentDetector::new();
        assert!(detector.is_projection_year("2024E"));
        assert!(detector.is_projection_year("Budget 2025"));
        assert!(detector.is_actual_year("2023"));
        assert!(detector.is_actual_year("2023A"));
        assert!(!detector.is_projection_year("plain text"));
    }
}
