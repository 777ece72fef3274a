// [libs/domain/models/src/financial.rs]
// =================================================================
// APARATO: FINANCIAL METRIC MODELS (V4.1)
// RESPONSABILIDAD: EXTRACCIÓN NUMÉRICA TIPADA CON ATRIBUCIÓN DE FUENTE
// =================================================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Estado financiero al que pertenece una métrica.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    IncomeStatement,
    BalanceSheet,
    CashFlow,
    Ratio,
}

impl MetricCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncomeStatement => "income_statement",
            Self::BalanceSheet => "balance_sheet",
            Self::CashFlow => "cash_flow",
            Self::Ratio => "ratio",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "income_statement" => Some(Self::IncomeStatement),
            "balance_sheet" => Some(Self::BalanceSheet),
            "cash_flow" => Some(Self::CashFlow),
            "ratio" => Some(Self::Ratio),
            _ => None,
        }
    }
}

/// Granularidad temporal del período reportado.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Annual,
    Quarterly,
    Monthly,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Quarterly => "quarterly",
            Self::Monthly => "monthly",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "annual" => Some(Self::Annual),
            "quarterly" => Some(Self::Quarterly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }
}

/// Métrica extraída pendiente de persistencia.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialMetricDraft {
    pub document_id: String,
    /// Etiqueta canónica en minúsculas (ej. 'revenue', 'ebitda').
    pub metric_name: String,
    pub metric_category: MetricCategory,
    pub value: Decimal,
    /// Código ISO de divisa o '%'.
    pub unit: Option<String>,
    pub period_type: Option<PeriodType>,
    pub fiscal_year: Option<i32>,
    pub fiscal_quarter: Option<i32>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub source_cell: Option<String>,
    pub source_sheet: Option<String>,
    pub source_page: Option<i64>,
    pub source_formula: Option<String>,
    /// true = cifra real; false = proyección (sufijos E/F/P).
    pub is_actual: bool,
    pub confidence_score: f64,
    pub notes: Option<String>,
}

/// Mapea un nombre canónico de métrica hacia su categoría contable.
pub fn normalize_metric(metric_name: &str) -> MetricCategory {
    match metric_name {
        "revenue" | "cogs" | "gross_profit" | "operating_expenses" | "ebitda" | "ebit"
        | "net_income" => MetricCategory::IncomeStatement,
        "total_assets" | "current_assets" | "fixed_assets" | "total_liabilities"
        | "current_liabilities" | "equity" | "working_capital" => MetricCategory::BalanceSheet,
        "operating_cash_flow" | "investing_cash_flow" | "financing_cash_flow"
        | "free_cash_flow" | "capex" => MetricCategory::CashFlow,
        "gross_margin" | "net_margin" | "ebitda_margin" | "operating_margin" => {
            MetricCategory::Ratio
        }
        _ => MetricCategory::IncomeStatement,
    }
}
