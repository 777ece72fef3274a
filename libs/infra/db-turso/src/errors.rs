// [libs/infra/db-turso/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG (V8.2)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 *
 * Cada variante porta su veredicto de reintento: el clasificador de
 * errores del pipeline lee primero esta etiqueta tipada y solo cae a
 * regex para errores originados en librerías de terceros.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace físico o de red con el cluster de Turso.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo en la configuración del entorno (variables vacías o malformadas).
    #[error("[L3_DB_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el Dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    /// La fila solicitada no existe en las tablas activas.
    #[error("[L3_DB_FAULT]: ROW_NOT_FOUND -> {0}")]
    NotFound(String),

    /// Error al comprometer cambios en una secuencia multi-tabla.
    #[error("[L3_DB_FAULT]: TRANSACTION_COLLAPSE")]
    TransactionError,
}

impl DbError {
    /// Veredicto conductual: los fallos de red, motor y transacción son
    /// candidatos a reintento; los de mapeo y ausencia de fila no.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::QueryError(_) | Self::TransactionError => true,
            Self::ConfigurationError(_) | Self::MappingError(_) | Self::NotFound(_) => false,
        }
    }
}
