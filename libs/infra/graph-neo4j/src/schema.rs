// [libs/infra/graph-neo4j/src/schema.rs]
/*!
 * =================================================================
 * APARATO: M&A GRAPH SCHEMA (V6.2 - GUIDED EXTRACTION)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: ENTIDADES, ARISTAS Y MATRIZ DE PARES PERMITIDOS
 *
 * # Logic:
 * El esquema guía la extracción LLM sin cerrarla: los tipos listados
 * reciben trato tipado, pero las entidades novedosas se admiten como
 * 'Entity' genérica. La matriz de pares restringe qué aristas puede
 * proponer el extractor entre cada par (origen, destino).
 * =================================================================
 */

/// Tipos de entidad del dominio M&A.
pub const ENTITY_TYPES: &[(&str, &str)] = &[
    ("Company", "A business organization: target, acquirer, competitor, customer or supplier."),
    ("Person", "An individual: executive, board member, advisor or key employee."),
    ("FinancialMetric", "A named financial measure with value, period and currency."),
    ("Finding", "A structured assertion extracted from a source channel."),
    ("Risk", "An identified risk with severity and category."),
];

/// Tipos de arista del dominio M&A.
pub const EDGE_TYPES: &[(&str, &str)] = &[
    ("WORKS_FOR", "Employment or board relationship between a person and a company."),
    ("SUPERSEDES", "A newer assertion replaces an older one."),
    ("CONTRADICTS", "Two assertions make incompatible claims."),
    ("SUPPORTS", "One assertion corroborates another."),
    ("EXTRACTED_FROM", "Provenance link from a finding to its source."),
    ("COMPETES_WITH", "Two companies compete in a market."),
    ("INVESTS_IN", "An investment relationship between companies."),
    ("MENTIONS", "A source references an entity."),
    ("SUPPLIES", "A supplier relationship between companies."),
];

/// Matriz de pares permitidos: (origen, destino) -> aristas admisibles.
/// El adaptador entrega esta lista al extractor para que la propuesta
/// de relaciones quede guiada por el esquema.
pub const EDGE_TYPE_MAP: &[((&str, &str), &[&str])] = &[
    (("Person", "Company"), &["WORKS_FOR"]),
    (("Company", "Company"), &["COMPETES_WITH", "INVESTS_IN", "SUPPLIES"]),
    (("Finding", "Finding"), &["SUPERSEDES", "CONTRADICTS", "SUPPORTS"]),
    (("FinancialMetric", "FinancialMetric"), &["SUPERSEDES", "CONTRADICTS"]),
    (("Finding", "Company"), &["MENTIONS"]),
    (("Finding", "Person"), &["MENTIONS"]),
    (("Finding", "FinancialMetric"), &["MENTIONS"]),
    (("Finding", "Risk"), &["MENTIONS"]),
    (("Risk", "Company"), &["MENTIONS"]),
];

/// Aristas admisibles entre un par concreto de tipos.
pub fn allowed_edges(source_type: &str, target_type: &str) -> &'static [&'static str] {
    EDGE_TYPE_MAP
        .iter()
        .find(|((src, dst), _)| *src == source_type && *dst == target_type)
        .map(|(_, edges)| *edges)
        .unwrap_or(&[])
}

pub fn is_known_entity_type(entity_type: &str) -> bool {
    ENTITY_TYPES.iter().any(|(name, _)| *name == entity_type)
}

pub fn is_known_edge_type(edge_type: &str) -> bool {
    EDGE_TYPES.iter().any(|(name, _)| *name == edge_type)
}

/// Valida una arista propuesta contra la matriz. Las entidades fuera
/// de esquema se admiten con cualquier arista conocida (descubrimiento
/// dinámico); entre tipos conocidos rige la matriz estricta.
pub fn edge_is_allowed(source_type: &str, target_type: &str, edge_type: &str) -> bool {
    if !is_known_edge_type(edge_type) {
        return false;
    }
    if !is_known_entity_type(source_type) || !is_known_entity_type(target_type) {
        return true;
    }
    allowed_edges(source_type, target_type).contains(&edge_type)
}

/// Construye la sección de guía de esquema para el prompt de extracción.
pub fn extraction_schema_prompt() -> String {
    let mut sections = Vec::new();

    sections.push("## Entity types".to_string());
    for (name, description) in ENTITY_TYPES {
        sections.push(format!("- {}: {}", name, description));
    }

    sections.push("\n## Edge types".to_string());
    for (name, description) in EDGE_TYPES {
        sections.push(format!("- {}: {}", name, description));
    }

    sections.push("\n## Allowed (source, target) pairs per edge".to_string());
    for ((source, target), edges) in EDGE_TYPE_MAP {
        sections.push(format!("- ({} -> {}): {}", source, target, edges.join(", ")));
    }

    sections.push(
        "\nEntities that do not fit the listed types may still be returned with a \
         descriptive entity_type; prefer the listed types when they apply."
            .to_string(),
    );

    sections.join("\n")
}
