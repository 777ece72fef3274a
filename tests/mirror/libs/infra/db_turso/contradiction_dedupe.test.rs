// [tests/mirror/libs/infra/db_turso/contradiction_dedupe.test.rs]
/**
 * =================================================================
 * APARATO: CONTRADICTION DEDUPE TEST (V3.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-DB)
 * RESPONSABILIDAD: UNICIDAD DEL PAR NO ORDENADO {a, b} POR DEAL
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use acumen_domain_models::{FindingDomain, FindingDraft, FindingType};
    use acumen_infra_db::Storage;
    use serde_json::json;

    async fn seed(anchor: &str) -> (Storage, String, String, String) {
        let storage =
            Storage::connect(&format!("file:{}?mode=memory&cache=shared", anchor), None)
                .await
                .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

        let organization_id = storage.tenancy.create_organization("Atlas Capital").await.unwrap();
        let deal_id =
            storage.tenancy.create_deal(&organization_id, "Project Borealis").await.unwrap();
        let document_id = storage
            .documents
            .create_document(&deal_id, "report.pdf", "/tmp/report.pdf", "application/pdf")
            .await
            .unwrap();

        let findings: Vec<FindingDraft> = (0..2)
            .map(|i| FindingDraft {
                deal_id: deal_id.clone(),
                document_id: document_id.clone(),
                chunk_id: None,
                text: format!("Revenue figure variant {}", i),
                finding_type: FindingType::Metric,
                domain: FindingDomain::Financial,
                confidence: 0.9,
                metadata: json!({}),
            })
            .collect();

        storage
            .findings
            .store_findings_and_update_status(&document_id, &findings, "analyzed")
            .await
            .unwrap();

        let stored = storage.findings.get_findings_by_deal(&deal_id).await.unwrap();
        (storage.clone(), deal_id, stored[0].id.clone(), stored[1].id.clone())
    }

    /**
     * CERTIFICACIÓN: {a,b} y {b,a} son la misma contradicción.
     */
    #[tokio::test]
    async fn certify_unordered_pair_uniqueness() {
        let (storage, deal_id, finding_a, finding_b) = seed("contradiction_pairs").await;

        let first = storage
            .contradictions
            .store_contradiction(&deal_id, &finding_a, &finding_b, 0.82, "conflicting revenue")
            .await
            .unwrap();
        assert!(first, "first insert lands");

        // Mismo par en orden inverso: deduplicado.
        let reversed = storage
            .contradictions
            .store_contradiction(&deal_id, &finding_b, &finding_a, 0.91, "same pair reversed")
            .await
            .unwrap();
        assert!(!reversed, "reversed pair must dedupe");

        let rows = storage.contradictions.get_contradictions_by_deal(&deal_id).await.unwrap();
        assert_eq!(rows.len(), 1, "exactly one row per unordered pair");
        assert_eq!(rows[0].status, "unresolved");
        assert!(rows[0].confidence >= 0.70);

        // Ambos ids presentes sin importar el orden de inserción.
        let ids = [rows[0].finding_a_id.clone(), rows[0].finding_b_id.clone()];
        assert!(ids.contains(&finding_a));
        assert!(ids.contains(&finding_b));

        // El lookup responde en ambos órdenes.
        assert!(storage
            .contradictions
            .get_existing_contradiction(&finding_a, &finding_b)
            .await
            .unwrap()
            .is_some());
        assert!(storage
            .contradictions
            .get_existing_contradiction(&finding_b, &finding_a)
            .await
            .unwrap()
            .is_some());
    }
}
