// [libs/infra/graph-neo4j/src/resolution.rs]
/*!
 * =================================================================
 * APARATO: ENTITY RESOLUTION (V7.3 - MERGE DISCIPLINE)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: NORMALIZACIÓN DE NOMBRES Y DISCIPLINA DE FUSIÓN
 *
 * # Logic:
 * - Compañías: sufijos legales fuera, minúsculas, puntuación a espacio.
 *   'ABC Corp', 'ABC Inc.' y 'ABC LLC' normalizan todas a 'abc'.
 * - Personas: títulos entre paréntesis fuera; las iniciales se
 *   preservan para el patrón 'J. Smith' ~ 'John Smith'.
 * - Métricas protegidas: nunca se auto-fusionan. 'Revenue' y
 *   'Net Revenue' son nodos semánticamente distintos aunque sus
 *   superficies colisionen.
 * =================================================================
 */

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Sufijos legales reconocidos, ya en minúsculas.
pub static COMPANY_SUFFIX_VARIATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "corp", "corporation", "inc", "incorporated", "llc", "ltd", "limited", "gmbh", "ag",
        "plc", "holdings", "holding", "group", "co", "company", "sa", "se", "kg", "lp", "llp",
    ]
    .into_iter()
    .collect()
});

/// Familias de métricas semánticamente distintas que jamás deben
/// fusionarse entre sí por similitud superficial.
pub const DISTINCT_METRICS: &[(&str, &[&str])] = &[
    (
        "revenue_types",
        &["revenue", "net revenue", "gross revenue", "recurring revenue", "arr", "mrr"],
    ),
    (
        "margin_types",
        &["gross margin", "operating margin", "net margin", "ebitda margin"],
    ),
];

/// Umbrales de decisión de fusión.
pub const RESOLUTION_THRESHOLDS: &[(&str, f64)] = &[
    ("exact_match", 0.95),
    ("high_confidence", 0.80),
    ("review_threshold", 0.60),
    ("low_confidence", 0.40),
];

fn threshold(key: &str) -> f64 {
    RESOLUTION_THRESHOLDS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| *value)
        .unwrap_or(0.0)
}

/// Normaliza un nombre de compañía: minúsculas, puntuación a espacio,
/// sufijos legales eliminados del final (en cascada).
pub fn normalize_company_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();

    let sanitized: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut words: Vec<&str> = sanitized.split_whitespace().collect();
    while let Some(last) = words.last() {
        if COMPANY_SUFFIX_VARIATIONS.contains(last) {
            words.pop();
        } else {
            break;
        }
    }

    words.join(" ")
}

/// Normaliza un nombre de persona: recorta el primer bloque entre
/// paréntesis (títulos) y baja a minúsculas. Las iniciales con punto
/// se preservan intactas.
pub fn normalize_person_name(name: &str) -> String {
    let without_titles = match name.find('(') {
        Some(idx) => &name[..idx],
        None => name,
    };
    without_titles.trim().to_lowercase()
}

/// Una métrica protegida nunca participa de auto-fusión.
pub fn is_protected_metric(name: &str) -> bool {
    let lowered = name.to_lowercase();
    DISTINCT_METRICS
        .iter()
        .flat_map(|(_, family)| family.iter())
        .any(|metric| lowered.contains(metric))
}

/// Decisión de fusión entre dos nombres de compañía.
/// Devuelve (fusionar, confianza).
pub fn should_merge_companies(name_a: &str, name_b: &str) -> (bool, f64) {
    let normalized_a = normalize_company_name(name_a);
    let normalized_b = normalize_company_name(name_b);

    if normalized_a.is_empty() || normalized_b.is_empty() {
        return (false, 0.0);
    }

    if normalized_a == normalized_b {
        return (true, threshold("exact_match"));
    }

    // Subcadena por palabras completas: 'abc' ⊂ 'abc technology'.
    let words_a: Vec<&str> = normalized_a.split_whitespace().collect();
    let words_b: Vec<&str> = normalized_b.split_whitespace().collect();
    let (shorter, longer) = if words_a.len() <= words_b.len() {
        (&words_a, &words_b)
    } else {
        (&words_b, &words_a)
    };
    if !shorter.is_empty() && shorter.iter().all(|word| longer.contains(word)) {
        return (true, threshold("high_confidence"));
    }

    (false, 0.0)
}

/// Decisión de fusión entre dos nombres de persona, con títulos
/// opcionales: el mismo nombre con roles distintos NO fusiona.
pub fn should_merge_persons(
    name_a: &str,
    name_b: &str,
    title_a: Option<&str>,
    title_b: Option<&str>,
) -> (bool, f64) {
    let normalized_a = normalize_person_name(name_a);
    let normalized_b = normalize_person_name(name_b);

    if normalized_a.is_empty() || normalized_b.is_empty() {
        return (false, 0.0);
    }

    if let (Some(t_a), Some(t_b)) = (title_a, title_b) {
        if !t_a.eq_ignore_ascii_case(t_b) {
            return (false, 0.0);
        }
    }

    if normalized_a == normalized_b {
        return (true, 0.90);
    }

    // Patrón de inicial: 'j. smith' ~ 'john smith'.
    if initials_match(&normalized_a, &normalized_b) || initials_match(&normalized_b, &normalized_a)
    {
        return (true, 0.75);
    }

    (false, 0.0)
}

fn initials_match(abbreviated: &str, full: &str) -> bool {
    let abbreviated_parts: Vec<&str> = abbreviated.split_whitespace().collect();
    let full_parts: Vec<&str> = full.split_whitespace().collect();

    if abbreviated_parts.len() != full_parts.len() || abbreviated_parts.is_empty() {
        return false;
    }

    abbreviated_parts.iter().zip(full_parts.iter()).all(|(abbr, full_word)| {
        if let Some(initial) = abbr.strip_suffix('.') {
            initial.len() == 1 && full_word.starts_with(initial)
        } else {
            abbr == full_word
        }
    })
}

/// Guía de resolución entregada al extractor LLM junto al esquema.
pub fn resolution_context() -> String {
    let mut lines = vec![
        "## Entity resolution discipline".to_string(),
        "MERGE company mentions that differ only in legal suffix: \
         'ABC Corp', 'ABC Inc.' and 'ABC LLC' are one company."
            .to_string(),
        "MERGE person mentions matching the initial pattern: 'J. Smith' and 'John Smith' \
         with the same role are one person."
            .to_string(),
        "KEEP SEPARATE every protected metric name even when surfaces collide:".to_string(),
    ];

    for (family, metrics) in DISTINCT_METRICS {
        lines.push(format!("- {}: {}", family, metrics.join(", ")));
    }
    lines.push("'Revenue' and 'Net Revenue' must remain distinct nodes.".to_string());

    lines.join("\n")
}

/// Escapa texto de usuario antes de concatenarlo en un literal de
/// patrón Cypher. Obligatorio para todo helper que arme regex.
pub fn escape_regex_pattern(user_text: &str) -> String {
    regex::escape(user_text)
}
