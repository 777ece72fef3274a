// [libs/domain/models/src/tests_serialization.rs]
/**
 * =================================================================
 * APARATO: DOMAIN SERIALIZATION TEST (V4.0 - INTEGRATION LEVEL)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * RESPONSABILIDAD: CERTIFICACIÓN DE PARIDAD JSON DE LOS CONTRATOS DE COLA
 *
 * # Logic:
 * Los payloads viajan entre servicios como JSON con nombres de campo
 * estables. Este test certifica que la máquina de estados y los
 * contratos de trabajo preservan su forma de cable bit a bit.
 * =================================================================
 */
