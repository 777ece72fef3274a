// [libs/infra/db-turso/src/queue/queries.rs]
/*!
 * =================================================================
 * APARATO: TACTICAL QUEUE SQL STORE (V7.1)
 * CLASIFICACIÓN: INFRASTRUCTURE SQL (ESTRATO L3)
 * RESPONSABILIDAD: SENTENCIAS ATÓMICAS DEL LEDGER DE TRABAJOS
 *
 * # Logic:
 * Las transiciones de propiedad usan guardias de estado
 * (WHERE state IN ('created','retry')) para que la reclamación sea
 * una operación atómica indivisible: dos dequeues concurrentes nunca
 * obtienen la misma fila.
 * =================================================================
 */

/// Inicializa una nueva unidad de trabajo en el Ledger.
pub const INSERT_JOB: &str = r#"
    INSERT INTO jobs (
        id, name, data, state, priority,
        retry_count, retry_limit, retry_delay, retry_backoff,
        start_after, created_on
    ) VALUES (?1, ?2, ?3, 'created', ?4, 0, ?5, ?6, ?7, ?8, ?9)
"#;

/// Localiza candidatos elegibles para despacho, por prioridad y antigüedad.
pub const SELECT_DISPATCH_CANDIDATES: &str = r#"
    SELECT id FROM jobs
    WHERE name = ?1
      AND state IN ('created', 'retry')
      AND start_after <= ?2
    ORDER BY priority DESC, created_on ASC
    LIMIT ?3
"#;

/// Reclama la propiedad de un trabajo de forma atómica.
/// Si otra tarea lo tomó primero, la guardia de estado deja 0 filas.
pub const CLAIM_JOB: &str = r#"
    UPDATE jobs
    SET state = 'active', started_on = ?2
    WHERE id = ?1 AND state IN ('created', 'retry')
"#;

pub const FETCH_JOB: &str = r#"
    SELECT id, name, data, state, priority,
           retry_count, retry_limit, retry_delay, retry_backoff,
           start_after, created_on, started_on, completed_on, output, last_error
    FROM jobs WHERE id = ?1
"#;

pub const MARK_COMPLETED: &str = r#"
    UPDATE jobs
    SET state = 'completed', completed_on = ?2, output = ?3
    WHERE id = ?1
"#;

/// Consulta el contrato de reintentos antes de decidir retry vs failed.
pub const FETCH_RETRY_CONTRACT: &str = r#"
    SELECT retry_count, retry_limit, retry_delay, retry_backoff
    FROM jobs WHERE id = ?1
"#;

pub const SCHEDULE_RETRY: &str = r#"
    UPDATE jobs
    SET state = 'retry', retry_count = retry_count + 1,
        start_after = ?2, last_error = ?3
    WHERE id = ?1
"#;

pub const MARK_FAILED: &str = r#"
    UPDATE jobs
    SET state = 'failed', completed_on = ?2, last_error = ?3
    WHERE id = ?1
"#;

pub const COUNT_BY_NAME_AND_STATE: &str = r#"
    SELECT name, state, COUNT(*) FROM jobs GROUP BY name, state
"#;

/// Recupera misiones estancadas: trabajos 'active' cuyo latido expiró.
pub const RECLAIM_EXPIRED_LEASES: &str = r#"
    UPDATE jobs
    SET state = 'retry', last_error = 'LEASE_EXPIRED: reclaimed by reaper'
    WHERE state = 'active' AND started_on < ?1
"#;
