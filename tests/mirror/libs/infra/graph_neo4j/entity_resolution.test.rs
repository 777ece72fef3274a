// [tests/mirror/libs/infra/graph_neo4j/entity_resolution.test.rs]
/**
 * =================================================================
 * APARATO: ENTITY RESOLUTION TEST (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-GRAPH)
 * RESPONSABILIDAD: DISCIPLINA DE NORMALIZACIÓN Y FUSIÓN
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use acumen_infra_graph::resolution::{
        escape_regex_pattern, is_protected_metric, normalize_company_name,
        normalize_person_name, should_merge_companies, should_merge_persons,
        COMPANY_SUFFIX_VARIATIONS, DISTINCT_METRICS,
    };

    /**
     * CERTIFICACIÓN: variantes de sufijo legal normalizan igual.
     */
    #[test]
    fn certify_company_suffix_normalization() {
        assert_eq!(normalize_company_name("ABC Corp"), "abc");
        assert_eq!(normalize_company_name("ABC Corporation"), "abc");
        assert_eq!(normalize_company_name("ABC Inc."), "abc");
        assert_eq!(normalize_company_name("ABC LLC"), "abc");
        assert_eq!(normalize_company_name("ABC Ltd"), "abc");
        assert_eq!(normalize_company_name("ABC GmbH"), "abc");
        assert_eq!(normalize_company_name("ABC PLC"), "abc");
        assert_eq!(normalize_company_name("ABC Holdings"), "abc");
        assert_eq!(normalize_company_name("ABC Group"), "abc");
        // Sufijos en cascada.
        assert_eq!(normalize_company_name("ABC Corp Inc"), "abc");
        // Núcleo multi-palabra preservado.
        assert_eq!(normalize_company_name("Acme Technology Solutions Inc"), "acme technology solutions");
        // Puntuación y guiones a espacio.
        assert_eq!(normalize_company_name("ABC, Inc."), "abc");
        assert_eq!(normalize_company_name("ABC-Corp"), "abc");
        assert_eq!(normalize_company_name("O'Reilly Corp"), "o reilly");
        assert_eq!(normalize_company_name("  ABC Corp  "), "abc");
    }

    /**
     * CERTIFICACIÓN: personas conservan iniciales, pierden títulos.
     */
    #[test]
    fn certify_person_normalization() {
        assert_eq!(normalize_person_name("John Smith"), "john smith");
        assert_eq!(normalize_person_name("John Smith (CEO)"), "john smith");
        assert_eq!(normalize_person_name("John Smith (CEO, ABC Corp)"), "john smith");
        assert_eq!(normalize_person_name("J. Smith"), "j. smith");
        assert_eq!(normalize_person_name("John Q. Smith"), "john q. smith");
        assert_eq!(normalize_person_name("  JOHN SMITH  "), "john smith");
    }

    /**
     * CERTIFICACIÓN: las métricas protegidas jamás se auto-fusionan.
     * 'Revenue' y 'Net Revenue' son nodos distintos.
     */
    #[test]
    fn certify_protected_metrics_never_merge() {
        for metric in [
            "Revenue",
            "Net Revenue",
            "Gross Revenue",
            "Recurring Revenue",
            "ARR",
            "MRR",
            "Gross Margin",
            "Operating Margin",
            "Net Margin",
            "EBITDA Margin",
        ] {
            assert!(is_protected_metric(metric), "{} must be protected", metric);
        }

        // Insensible a mayúsculas y detectado dentro de frases.
        assert!(is_protected_metric("REVENUE"));
        assert!(is_protected_metric("Q3 2024 Revenue"));
        assert!(is_protected_metric("Annual Net Revenue"));

        assert!(!is_protected_metric("ABC Company"));
        assert!(!is_protected_metric("John Smith"));
    }

    /**
     * CERTIFICACIÓN: decisiones de fusión de compañías con confianza.
     */
    #[test]
    fn certify_company_merge_decisions() {
        let (merge, confidence) = should_merge_companies("ABC Corp", "ABC Inc");
        assert!(merge);
        assert_eq!(confidence, 0.95);

        let (merge, confidence) = should_merge_companies("ABC CORP", "abc corporation");
        assert!(merge);
        assert_eq!(confidence, 0.95);

        let (merge, confidence) = should_merge_companies("ABC Corp", "ABC Technology Corp");
        assert!(merge);
        assert_eq!(confidence, 0.80);

        assert_eq!(should_merge_companies("ABC Corp", "XYZ Corp"), (false, 0.0));
        assert_eq!(should_merge_companies("ABC Corp", "ABD Corp"), (false, 0.0));
        assert_eq!(should_merge_companies("", ""), (false, 0.0));
        // Nombres que son puro sufijo colapsan a vacío: sin fusión.
        assert_eq!(should_merge_companies("Corp", "Inc"), (false, 0.0));
        assert_eq!(should_merge_companies("   ", "ABC Corp"), (false, 0.0));
    }

    /**
     * CERTIFICACIÓN: decisiones de fusión de personas.
     */
    #[test]
    fn certify_person_merge_decisions() {
        let (merge, confidence) = should_merge_persons("John Smith", "John Smith", None, None);
        assert!(merge);
        assert_eq!(confidence, 0.90);

        // Patrón de inicial en ambas direcciones.
        let (merge, confidence) = should_merge_persons("J. Smith", "John Smith", None, None);
        assert!(merge);
        assert_eq!(confidence, 0.75);
        let (merge, _) = should_merge_persons("John Smith", "J. Smith", None, None);
        assert!(merge);

        // Mismo nombre, roles distintos: personas distintas.
        assert_eq!(
            should_merge_persons("John Smith", "John Smith", Some("CEO"), Some("CFO")),
            (false, 0.0)
        );
        let (merge, confidence) =
            should_merge_persons("John Smith", "John Smith", Some("CEO"), Some("CEO"));
        assert!(merge);
        assert_eq!(confidence, 0.90);

        assert_eq!(should_merge_persons("John Smith", "Jane Doe", None, None), (false, 0.0));
        assert_eq!(should_merge_persons("John Smith", "John Jones", None, None), (false, 0.0));
        assert_eq!(should_merge_persons("", "John Smith", None, None), (false, 0.0));
    }

    /**
     * CERTIFICACIÓN: constantes del módulo.
     */
    #[test]
    fn certify_resolution_constants() {
        for suffix in ["corp", "corporation", "inc", "llc", "ltd", "limited", "gmbh", "plc"] {
            assert!(COMPANY_SUFFIX_VARIATIONS.contains(suffix));
        }

        let revenue_family = DISTINCT_METRICS
            .iter()
            .find(|(family, _)| *family == "revenue_types")
            .map(|(_, metrics)| *metrics)
            .expect("revenue family present");
        assert!(revenue_family.contains(&"revenue"));
        assert!(revenue_family.contains(&"arr"));
    }

    /**
     * CERTIFICACIÓN: el texto de usuario se escapa antes de entrar a
     * un literal de patrón Cypher.
     */
    #[test]
    fn certify_regex_escaping_for_cypher() {
        let hostile = "acme.*' OR (1=1";
        let escaped = escape_regex_pattern(hostile);
        assert!(escaped.contains(r"\.\*"));
        assert!(escaped.contains(r"\("));
        // El resultado es un patrón válido que matchea el literal.
        let pattern = regex::Regex::new(&escaped).expect("escaped pattern compiles");
        assert!(pattern.is_match(hostile));
    }
}
