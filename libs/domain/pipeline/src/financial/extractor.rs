// [libs/domain/pipeline/src/financial/extractor.rs]
/*!
 * =================================================================
 * APARATO: FINANCIAL METRIC EXTRACTOR (V9.0 - SOURCE ATTRIBUTED)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: EXTRACCIÓN DE MÉTRICAS CON PERÍODO Y ATRIBUCIÓN
 *
 * # Logic:
 * - Identificación por tabla de sinónimos (EN + DE) hacia nombre
 *   canónico y categoría contable.
 * - Períodos: año con sufijo A/E/F/P (real vs proyección), trimestre
 *   'Q[1-4] YYYY' y nombres de mes.
 * - Valores: símbolos de divisa a ISO, porcentajes, separadores de
 *   miles, negativos contables '(1,234)' y multiplicadores K/M/B.
 * - Atribución: referencia de celda 1-based relativa a la tabla,
 *   hoja/página, y enlace a la fórmula por (hoja, celda).
 * =================================================================
 */

use crate::financial::detector::FinancialDocumentDetector;
use crate::parsers::{build_cell_reference, ChunkData, FormulaData, ParseResult, TableData};
use acumen_domain_models::{normalize_metric, FinancialMetricDraft, MetricCategory, PeriodType};
use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{info, instrument, warn};

/// Tabla de sinónimos -> métrica canónica.
static METRIC_PATTERNS: Lazy<Vec<(&'static str, Vec<Regex>)>> = Lazy::new(|| {
    fn compile(raw: &[&str]) -> Vec<Regex> {
        raw.iter()
            .map(|p| {
                RegexBuilder::new(p).case_insensitive(true).build().expect("static metric pattern")
            })
            .collect()
    }

    vec![
        // Estado de resultados
        ("revenue", compile(&[r"revenue", r"sales", r"net\s*sales", r"total\s*revenue", r"umsatz", r"erlöse"])),
        ("cogs", compile(&[r"cogs", r"cost\s*of\s*(?:goods\s*)?sold", r"cost\s*of\s*sales", r"herstellungskosten"])),
        ("gross_profit", compile(&[r"gross\s*profit", r"gross\s*margin\s*(?:amount)?", r"bruttogewinn", r"rohergebnis"])),
        ("operating_expenses", compile(&[r"operating\s*expenses?", r"opex", r"betriebsaufwand"])),
        ("ebitda", compile(&[r"ebitda", r"operating\s*(?:income|profit)\s*(?:before)?"])),
        ("ebit", compile(&[r"ebit", r"operating\s*(?:income|profit)", r"betriebsergebnis"])),
        ("net_income", compile(&[r"net\s*income", r"net\s*profit", r"bottom\s*line", r"jahresüberschuss", r"gewinn"])),
        // Balance
        ("total_assets", compile(&[r"total\s*assets?", r"assets?\s*total", r"bilanzsumme"])),
        ("current_assets", compile(&[r"current\s*assets?", r"umlaufvermögen"])),
        ("fixed_assets", compile(&[r"fixed\s*assets?", r"non[\s-]*current\s*assets?", r"anlagevermögen"])),
        ("total_liabilities", compile(&[r"total\s*liabilit(?:y|ies)", r"liabilit(?:y|ies)\s*total", r"verbindlichkeiten"])),
        ("current_liabilities", compile(&[r"current\s*liabilit(?:y|ies)", r"kurzfristige\s*verbindlichkeiten"])),
        ("equity", compile(&[r"(?:shareholders?'?)?\s*equity", r"eigenkapital", r"net\s*worth"])),
        ("working_capital", compile(&[r"working\s*capital", r"betriebskapital"])),
        // Flujo de caja
        ("operating_cash_flow", compile(&[r"(?:operating|cash\s*flow\s*from\s*operations?)\s*cash\s*flow", r"operativer?\s*cashflow"])),
        ("investing_cash_flow", compile(&[r"investing\s*(?:activities|cash\s*flow)", r"investitions\s*cashflow"])),
        ("financing_cash_flow", compile(&[r"financing\s*(?:activities|cash\s*flow)", r"finanzierungs\s*cashflow"])),
        ("free_cash_flow", compile(&[r"free\s*cash\s*flow", r"fcf"])),
        ("capex", compile(&[r"capex", r"capital\s*expenditure", r"investitionen"])),
        // Ratios
        ("gross_margin", compile(&[r"gross\s*margin", r"bruttomarge"])),
        ("net_margin", compile(&[r"net\s*(?:profit\s*)?margin", r"nettomarge"])),
        ("ebitda_margin", compile(&[r"ebitda\s*margin"])),
        ("operating_margin", compile(&[r"operating\s*margin", r"betriebliche\s*marge"])),
    ]
});

static YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"(?:FY|CY)?\s*(\d{4})\s*([AaEeFfPp])?")
        .case_insensitive(true)
        .build()
        .expect("static pattern")
});

static QUARTER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r#"Q([1-4])\s*['"]?(\d{2,4})?"#)
        .case_insensitive(true)
        .build()
        .expect("static pattern")
});

static MONTH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(
        r#"(Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|Jun(?:e)?|Jul(?:y)?|Aug(?:ust)?|Sep(?:tember)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)\s*['"]?(\d{2,4})?"#,
    )
    .case_insensitive(true)
    .build()
    .expect("static pattern")
});

static TEXT_VALUE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"(?:of|was|is|equals?|:)\s*([\$€£¥]?\s*[\d,\.]+\s*(?:million|billion|thousand|[KMB])?)")
        .case_insensitive(true)
        .build()
        .expect("static pattern")
});

const CURRENCY_SYMBOLS: &[(&str, &str)] =
    &[("$", "USD"), ("€", "EUR"), ("£", "GBP"), ("¥", "JPY"), ("CHF", "CHF")];

/// Información de período extraída de un encabezado.
#[derive(Debug, Clone, Default)]
struct PeriodInfo {
    period_type: Option<PeriodType>,
    fiscal_year: Option<i32>,
    fiscal_quarter: Option<i32>,
    is_actual: bool,
}

/// Resultado de la corrida de extracción.
#[derive(Debug, Clone)]
pub struct FinancialExtractionResult {
    pub document_id: String,
    pub has_financial_data: bool,
    pub detection_confidence: f64,
    pub document_type: Option<String>,
    pub metrics: Vec<FinancialMetricDraft>,
    pub errors: Vec<String>,
    pub processing_time_ms: i64,
}

pub struct FinancialMetricExtractor {
    detector: FinancialDocumentDetector,
}

impl FinancialMetricExtractor {
    pub fn new(detector: FinancialDocumentDetector) -> Self {
        Self { detector }
    }

    /// Detecta y extrae. Bajo el umbral de detección no se extrae nada.
    #[instrument(skip(self, parse_result))]
    pub fn extract(&self, document_id: &str, parse_result: &ParseResult) -> FinancialExtractionResult {
        let started = std::time::Instant::now();
        let detection = self.detector.detect(parse_result);

        let mut result = FinancialExtractionResult {
            document_id: document_id.to_string(),
            has_financial_data: detection.has_financial_data,
            detection_confidence: detection.confidence,
            document_type: detection.document_type.clone(),
            metrics: Vec::new(),
            errors: Vec::new(),
            processing_time_ms: 0,
        };

        if !detection.has_financial_data {
            result.processing_time_ms = started.elapsed().as_millis() as i64;
            info!(
                confidence = detection.confidence,
                "💹 [FIN_EXTRACTOR]: No financial data detected, skipping extraction."
            );
            return result;
        }

        let table_metrics =
            self.extract_from_tables(document_id, &parse_result.tables, &parse_result.formulas);
        result.metrics.extend(table_metrics);

        let chunk_metrics = self.extract_from_chunks(document_id, &parse_result.chunks);
        result.metrics.extend(chunk_metrics);

        result.processing_time_ms = started.elapsed().as_millis() as i64;
        info!(
            metrics = result.metrics.len(),
            "💹 [FIN_EXTRACTOR]: Extraction complete."
        );
        result
    }

    fn extract_from_tables(
        &self,
        document_id: &str,
        tables: &[TableData],
        formulas: &[FormulaData],
    ) -> Vec<FinancialMetricDraft> {
        let mut metrics = Vec::new();

        // Lookup de fórmulas por (hoja, celda) en minúsculas.
        let formula_lookup: HashMap<String, &FormulaData> = formulas
            .iter()
            .map(|f| (format!("{}:{}", f.sheet_name, f.cell_reference).to_lowercase(), f))
            .collect();

        for table in tables {
            let header_periods = self.extract_periods_from_headers(&table.headers);

            for (row_idx, row) in table.data.iter().enumerate() {
                let Some(label) = row.first() else { continue };
                let label = label.trim().to_lowercase();

                let Some((metric_name, category)) = identify_metric(&label) else { continue };

                for (col_idx, cell_value) in row.iter().enumerate().skip(1) {
                    let Some((value, unit)) = parse_value(cell_value) else { continue };

                    let period = header_periods.get(&col_idx).cloned().unwrap_or_default();
                    let cell_ref = build_cell_reference(row_idx + 1, col_idx + 1);

                    let source_formula = table.sheet_name.as_ref().and_then(|sheet| {
                        formula_lookup
                            .get(&format!("{}:{}", sheet, cell_ref).to_lowercase())
                            .map(|f| f.formula.clone())
                    });

                    metrics.push(FinancialMetricDraft {
                        document_id: document_id.to_string(),
                        metric_name: metric_name.to_string(),
                        metric_category: category,
                        value,
                        unit,
                        period_type: period.period_type,
                        fiscal_year: period.fiscal_year,
                        fiscal_quarter: period.fiscal_quarter,
                        period_start: None,
                        period_end: None,
                        source_cell: Some(cell_ref),
                        source_sheet: table.sheet_name.clone(),
                        source_page: table.page_number,
                        source_formula,
                        is_actual: period.is_actual,
                        confidence_score: 70.0,
                        notes: None,
                    });
                }
            }
        }

        metrics
    }

    /// Respaldo para métricas mencionadas en texto corrido:
    /// 'revenue of $10M'.
    fn extract_from_chunks(
        &self,
        document_id: &str,
        chunks: &[ChunkData],
    ) -> Vec<FinancialMetricDraft> {
        let mut metrics = Vec::new();

        for chunk in chunks {
            let content = &chunk.content;

            for (metric_name, pattern_set) in METRIC_PATTERNS.iter() {
                for pattern in pattern_set {
                    for found in pattern.find_iter(content) {
                        let context_start = found.end();
                        let context_end = (found.end() + 100).min(content.len());
                        let Some(context) = content.get(context_start..context_end) else {
                            continue;
                        };

                        if let Some(captures) = TEXT_VALUE_PATTERN.captures(context) {
                            if let Some((value, unit)) = parse_value(&captures[1]) {
                                let snippet_start = found.start().saturating_sub(20);
                                let snippet_end = (found.end() + 50).min(content.len());
                                let snippet = content
                                    .get(snippet_start..snippet_end)
                                    .unwrap_or_default()
                                    .to_string();

                                metrics.push(FinancialMetricDraft {
                                    document_id: document_id.to_string(),
                                    metric_name: metric_name.to_string(),
                                    metric_category: normalize_metric(metric_name),
                                    value,
                                    unit,
                                    period_type: None,
                                    fiscal_year: None,
                                    fiscal_quarter: None,
                                    period_start: None,
                                    period_end: None,
                                    source_cell: None,
                                    source_sheet: None,
                                    source_page: chunk.page_number,
                                    source_formula: None,
                                    // En prosa se asume cifra real.
                                    is_actual: true,
                                    confidence_score: 50.0,
                                    notes: Some(format!("Extracted from text: {}", snippet)),
                                });
                                break;
                            }
                        }
                    }
                }
            }
        }

        metrics
    }

    /// Períodos por columna de encabezado (índice 0-based de columna).
    fn extract_periods_from_headers(&self, headers: &[String]) -> HashMap<usize, PeriodInfo> {
        let mut periods = HashMap::new();
        let current_year = Utc::now().year();

        for (idx, header) in headers.iter().enumerate() {
            let mut period = PeriodInfo { is_actual: true, ..PeriodInfo::default() };
            let mut matched = false;

            if let Some(captures) = YEAR_PATTERN.captures(header) {
                if let Ok(year) = captures[1].parse::<i32>() {
                    period.fiscal_year = Some(year);
                    period.period_type = Some(PeriodType::Annual);
                    matched = true;

                    match captures.get(2) {
                        Some(indicator) => {
                            period.is_actual = indicator.as_str().eq_ignore_ascii_case("a");
                        }
                        // Sin sufijo: los años históricos se asumen reales.
                        None => period.is_actual = year < current_year,
                    }
                }
            }

            if let Some(captures) = QUARTER_PATTERN.captures(header) {
                if let Ok(quarter) = captures[1].parse::<i32>() {
                    period.fiscal_quarter = Some(quarter);
                    period.period_type = Some(PeriodType::Quarterly);
                    matched = true;

                    if let Some(year_match) = captures.get(2) {
                        let mut year_str = year_match.as_str().to_string();
                        if year_str.len() == 2 {
                            year_str = format!("20{}", year_str);
                        }
                        if let Ok(year) = year_str.parse::<i32>() {
                            period.fiscal_year = Some(year);
                        }
                    }
                }
            }

            if MONTH_PATTERN.is_match(header) {
                period.period_type = Some(PeriodType::Monthly);
                matched = true;
            }

            if matched {
                periods.insert(idx, period);
            }
        }

        periods
    }
}

/// Identifica la métrica canónica desde la etiqueta de fila.
fn identify_metric(label: &str) -> Option<(&'static str, MetricCategory)> {
    for (metric_name, pattern_set) in METRIC_PATTERNS.iter() {
        if pattern_set.iter().any(|p| p.is_match(label)) {
            return Some((metric_name, normalize_metric(metric_name)));
        }
    }
    None
}

/// Parsea una celda numérica: divisa, porcentaje, separadores de miles,
/// negativos contables y multiplicadores.
fn parse_value(cell_value: &str) -> Option<(Decimal, Option<String>)> {
    let mut text = cell_value.trim().to_string();
    if text.is_empty() || ["-", "—", "N/A", "n/a", "NA"].contains(&text.as_str()) {
        return None;
    }

    let mut unit: Option<String> = None;

    for (symbol, currency) in CURRENCY_SYMBOLS {
        if text.contains(symbol) {
            unit = Some((*currency).to_string());
            text = text.replace(symbol, "");
            break;
        }
    }

    if text.contains('%') {
        unit = Some("%".to_string());
        text = text.replace('%', "");
    }

    // Multiplicadores: anotación '(in millions)' y sufijos K/M/B.
    let mut multiplier = Decimal::ONE;
    let annotation_rules: &[(&str, i64)] = &[
        ("(in billions)", 1_000_000_000),
        ("(in billion)", 1_000_000_000),
        ("(in millions)", 1_000_000),
        ("(in million)", 1_000_000),
        ("(in thousands)", 1_000),
        ("(in thousand)", 1_000),
    ];
    for (annotation, factor) in annotation_rules {
        let lowered = text.to_lowercase();
        if lowered.contains(annotation) {
            multiplier = Decimal::from(*factor);
            let start = lowered.find(annotation).unwrap_or(0);
            text.replace_range(start..start + annotation.len(), "");
            break;
        }
    }

    let lowered = text.to_lowercase();
    let suffix_rules: &[(&str, i64)] = &[
        ("billion", 1_000_000_000),
        ("million", 1_000_000),
        ("thousand", 1_000),
        ("bn", 1_000_000_000),
        ("mn", 1_000_000),
        ("mm", 1_000_000),
        ("b", 1_000_000_000),
        ("m", 1_000_000),
        ("k", 1_000),
    ];
    if multiplier == Decimal::ONE {
        for (suffix, factor) in suffix_rules {
            if lowered.trim_end().ends_with(suffix) {
                multiplier = Decimal::from(*factor);
                let cut = text.trim_end().len() - suffix.len();
                text.truncate(cut);
                break;
            }
        }
    }

    text = text.replace(',', "").replace(' ', "");

    let mut is_negative = false;
    if text.starts_with('(') && text.ends_with(')') {
        is_negative = true;
        text = text[1..text.len() - 1].to_string();
    } else if let Some(stripped) = text.strip_prefix('-') {
        is_negative = true;
        text = stripped.to_string();
    }

    let mut value = Decimal::from_str(text.trim()).ok()? * multiplier;
    if is_negative {
        value = -value;
    }
    Some((value, unit))
}
