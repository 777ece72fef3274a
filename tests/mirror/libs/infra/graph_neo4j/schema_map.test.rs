// [tests/mirror/libs/infra/graph_neo4j/schema_map.test.rs]
/**
 * =================================================================
 * APARATO: GRAPH SCHEMA MAP TEST (V3.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-GRAPH)
 * RESPONSABILIDAD: MATRIZ DE PARES, DESCUBRIMIENTO Y NAMESPACE
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use acumen_infra_graph::group_id;
    use acumen_infra_graph::schema::{
        allowed_edges, edge_is_allowed, extraction_schema_prompt, is_known_edge_type,
        is_known_entity_type, EDGE_TYPES, ENTITY_TYPES,
    };

    /**
     * CERTIFICACIÓN: catálogo completo de entidades y aristas M&A.
     */
    #[test]
    fn certify_schema_catalog() {
        let entity_names: Vec<&str> = ENTITY_TYPES.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            entity_names,
            vec!["Company", "Person", "FinancialMetric", "Finding", "Risk"]
        );

        let edge_names: Vec<&str> = EDGE_TYPES.iter().map(|(name, _)| *name).collect();
        for required in [
            "WORKS_FOR",
            "SUPERSEDES",
            "CONTRADICTS",
            "SUPPORTS",
            "EXTRACTED_FROM",
            "COMPETES_WITH",
            "INVESTS_IN",
            "MENTIONS",
            "SUPPLIES",
        ] {
            assert!(edge_names.contains(&required), "missing edge {}", required);
        }
    }

    /**
     * CERTIFICACIÓN: la matriz de pares restringe las aristas entre
     * tipos conocidos.
     */
    #[test]
    fn certify_edge_pair_matrix() {
        assert_eq!(allowed_edges("Person", "Company"), &["WORKS_FOR"]);
        assert!(allowed_edges("Company", "Company").contains(&"COMPETES_WITH"));
        assert!(allowed_edges("Finding", "Finding").contains(&"CONTRADICTS"));
        assert!(allowed_edges("Company", "Person").is_empty());

        assert!(edge_is_allowed("Person", "Company", "WORKS_FOR"));
        assert!(!edge_is_allowed("Person", "Company", "COMPETES_WITH"));
        assert!(!edge_is_allowed("Finding", "Finding", "WORKS_FOR"));
        // Aristas fuera de catálogo nunca pasan.
        assert!(!edge_is_allowed("Person", "Company", "LIKES"));
    }

    /**
     * CERTIFICACIÓN: las entidades novedosas se admiten con cualquier
     * arista del catálogo (descubrimiento dinámico).
     */
    #[test]
    fn certify_novel_entities_admitted() {
        assert!(!is_known_entity_type("Product"));
        assert!(is_known_edge_type("MENTIONS"));
        assert!(edge_is_allowed("Finding", "Product", "MENTIONS"));
        assert!(edge_is_allowed("Product", "Company", "SUPPLIES"));
    }

    /**
     * CERTIFICACIÓN: formato canónico del namespace 'org:deal'.
     */
    #[test]
    fn certify_group_id_composite_format() {
        let namespace = group_id("org-123", "deal-456");
        assert_eq!(namespace, "org-123:deal-456");

        // Dos tenants con el mismo deal_id producen namespaces distintos.
        assert_ne!(group_id("org-a", "deal-1"), group_id("org-b", "deal-1"));
    }

    /**
     * CERTIFICACIÓN: el prompt de extracción transporta el esquema.
     */
    #[test]
    fn certify_extraction_prompt_carries_schema() {
        let prompt = extraction_schema_prompt();
        assert!(prompt.contains("Company"));
        assert!(prompt.contains("WORKS_FOR"));
        assert!(prompt.contains("(Person -> Company)"));
    }
}
