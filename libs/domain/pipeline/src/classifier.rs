// [libs/domain/pipeline/src/classifier.rs]
/*!
 * =================================================================
 * APARATO: ERROR CLASSIFIER (V9.1 - DETERMINISTIC TRIAGE)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: TRIAJE transient/permanent/unknown DE FALLOS DE ETAPA
 *
 * # Logic:
 * Orden de reglas (gana el primer acierto):
 * 1. Patrones transitorios sobre el mensaje (específico antes que
 *    genérico: 'gateway timeout' debe caer en gateway_error, no en
 *    timeout).
 * 2. Patrones permanentes.
 * 3. Veredicto tipado del adaptador de origen (los errores propios
 *    llevan su etiqueta retryable; el regex queda para mensajes de
 *    librerías de terceros).
 * 4. Pistas por nombre de clase del error.
 * 5. Default: unknown, con un reintento concedido.
 * =================================================================
 */

use crate::handlers::StageError;
use acumen_domain_models::{ClassifiedError, ErrorCategory};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::{debug, info};

const MAX_STACK_TRACE_LENGTH: usize = 500;

fn build_pattern(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("static classifier pattern must compile")
}

/// Patrones transitorios. El orden importa: los específicos primero.
static TRANSIENT_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (build_pattern(r"gateway.?(timeout|error)|502|504"), "gateway_error"),
        (build_pattern(r"socket.?(error|timeout)"), "socket_error"),
        (build_pattern(r"deadlock|lock.?timeout"), "database_lock"),
        (build_pattern(r"timeout|timed out"), "timeout"),
        (build_pattern(r"rate.?limit|429|too many requests"), "rate_limit"),
        (build_pattern(r"quota.?exceeded"), "quota_exceeded"),
        (build_pattern(r"service.?unavailable|503"), "service_unavailable"),
        (build_pattern(r"internal.?server.?error|500"), "server_error"),
        (build_pattern(r"connection.?(refused|reset|error)"), "connection_error"),
        (build_pattern(r"network.?(error|failure)"), "network_error"),
        (build_pattern(r"temporary|transient"), "transient_error"),
        (build_pattern(r"resource.?busy|try.?again"), "resource_busy"),
    ]
});

/// Patrones permanentes: cortan el pipeline sin reintento.
static PERMANENT_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (build_pattern(r"invalid.?file|file.?corrupt"), "invalid_file"),
        (build_pattern(r"unsupported.?(format|type)"), "unsupported_format"),
        (build_pattern(r"permission.?denied|403|unauthorized|401"), "auth_error"),
        (build_pattern(r"not.?found|404|does.?not.?exist"), "not_found"),
        (build_pattern(r"validation.?error|invalid.?data"), "validation_error"),
        (build_pattern(r"file.?too.?large|size.?limit"), "file_too_large"),
        (build_pattern(r"empty.?file|no.?content"), "empty_file"),
        (build_pattern(r"password.?protected|encrypted"), "encrypted_file"),
        (build_pattern(r"malformed|parse.?error|syntax.?error"), "parse_error"),
        (build_pattern(r"bad.?request|400"), "bad_request"),
    ]
});

/// Mensaje apto para UI por tipo de error.
fn user_message(error_type: &str) -> &'static str {
    match error_type {
        // Transitorios
        "timeout" => "Processing timed out",
        "rate_limit" => "Service temporarily busy",
        "service_unavailable" => "Processing service unavailable",
        "connection_error" => "Network connection error",
        "database_lock" => "Database temporarily busy",
        "transient_error" => "Temporary error occurred",
        "network_error" => "Network error occurred",
        "socket_error" => "Connection error",
        "server_error" => "Server error occurred",
        "gateway_error" => "Gateway error",
        "resource_busy" => "Resource temporarily busy",
        "quota_exceeded" => "API quota exceeded",
        // Permanentes
        "invalid_file" => "File appears to be invalid or corrupted",
        "unsupported_format" => "File format not supported",
        "auth_error" => "Access denied",
        "not_found" => "Document file not found",
        "validation_error" => "Invalid document data",
        "file_too_large" => "File is too large to process",
        "empty_file" => "File is empty or has no content",
        "encrypted_file" => "File is password protected",
        "parse_error" => "Could not parse document content",
        "bad_request" => "Invalid request",
        _ => "An unexpected error occurred",
    }
}

/// Guía accionable por tipo de error.
fn guidance(error_type: &str) -> Option<&'static str> {
    let text = match error_type {
        "timeout" => "Will retry automatically. Large documents may take longer.",
        "rate_limit" => "Will retry in a few seconds.",
        "service_unavailable" | "connection_error" | "database_lock" | "transient_error"
        | "socket_error" | "gateway_error" | "resource_busy" => "Will retry automatically.",
        "network_error" => "Check your network connection.",
        "server_error" => "Will retry automatically. Contact support if issue persists.",
        "quota_exceeded" => "Will retry in a few minutes. Usage limits may apply.",
        "invalid_file" => "Please re-upload the document or try a different file.",
        "unsupported_format" => {
            "Supported formats: PDF, XLSX, DOCX, TXT, and common office formats."
        }
        "auth_error" => "Contact administrator if issue persists.",
        "not_found" => "Please re-upload the document.",
        "validation_error" => "Check the document and try again.",
        "file_too_large" => "Maximum file size is 100MB. Try splitting the document.",
        "empty_file" => "The file has no extractable content. Check the file and re-upload.",
        "encrypted_file" => "Please remove password protection and re-upload.",
        "parse_error" => "The document format may be corrupted. Try re-saving and re-uploading.",
        "bad_request" => "Please try again. Contact support if issue persists.",
        _ => return None,
    };
    Some(text)
}

/// Clasificador determinista y puro: mismo fallo, mismo veredicto.
#[derive(Debug, Default, Clone)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(
        &self,
        error: &StageError,
        stage: Option<&str>,
        retry_count: i64,
    ) -> ClassifiedError {
        let message = error.to_string();
        let lowered = message.to_lowercase();
        let error_kind = error.kind_name();

        let stack_trace = if message.len() > MAX_STACK_TRACE_LENGTH {
            let mut cut = MAX_STACK_TRACE_LENGTH;
            while cut > 0 && !message.is_char_boundary(cut) {
                cut -= 1;
            }
            Some(format!("{}...", &message[..cut]))
        } else {
            None
        };

        // 1. Patrones transitorios.
        for (pattern, error_type) in TRANSIENT_PATTERNS.iter() {
            if pattern.is_match(&lowered) {
                debug!(error_type, original_kind = error_kind, "Classified error as transient");
                return self.build(
                    ErrorCategory::Transient,
                    error_type,
                    &message,
                    true,
                    stage,
                    retry_count,
                    stack_trace,
                );
            }
        }

        // 2. Patrones permanentes.
        for (pattern, error_type) in PERMANENT_PATTERNS.iter() {
            if pattern.is_match(&lowered) {
                debug!(error_type, original_kind = error_kind, "Classified error as permanent");
                return self.build(
                    ErrorCategory::Permanent,
                    error_type,
                    &message,
                    false,
                    stage,
                    retry_count,
                    stack_trace,
                );
            }
        }

        // 3. Veredicto tipado del adaptador de origen.
        if let Some(retryable) = error.typed_retryable() {
            let (category, error_type) = if retryable {
                (ErrorCategory::Transient, "transient_error")
            } else {
                (ErrorCategory::Permanent, "validation_error")
            };
            return self.build(
                category,
                error_type,
                &message,
                retryable,
                stage,
                retry_count,
                stack_trace,
            );
        }

        // 4. Pistas por nombre de clase.
        let kind_lowered = error_kind.to_lowercase();
        const TRANSIENT_KINDS: &[&str] =
            &["timeout", "connection", "network", "socket", "temporary", "retry", "ratelimit"];
        if TRANSIENT_KINDS.iter().any(|hint| kind_lowered.contains(hint)) {
            return self.build(
                ErrorCategory::Transient,
                "transient_error",
                &message,
                true,
                stage,
                retry_count,
                stack_trace,
            );
        }

        const PERMANENT_KINDS: &[&str] =
            &["value", "type", "key", "index", "attribute", "invalidfile", "unsupported"];
        if PERMANENT_KINDS.iter().any(|hint| kind_lowered.contains(hint)) {
            return self.build(
                ErrorCategory::Permanent,
                "validation_error",
                &message,
                false,
                stage,
                retry_count,
                stack_trace,
            );
        }

        // 5. Default: unknown, reintento concedido.
        let preview_cut = {
            let mut cut = message.len().min(200);
            while cut > 0 && !message.is_char_boundary(cut) {
                cut -= 1;
            }
            cut
        };
        info!(
            error_kind,
            message = &message[..preview_cut],
            "Could not classify error, defaulting to unknown (will retry)"
        );
        self.build(
            ErrorCategory::Unknown,
            "unknown",
            &message,
            true,
            stage,
            retry_count,
            stack_trace,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        category: ErrorCategory,
        error_type: &str,
        message: &str,
        should_retry: bool,
        stage: Option<&str>,
        retry_count: i64,
        stack_trace: Option<String>,
    ) -> ClassifiedError {
        ClassifiedError {
            category,
            error_type: error_type.to_string(),
            message: message.to_string(),
            should_retry,
            user_message: user_message(error_type).to_string(),
            guidance: if error_type == "unknown" {
                Some("Will retry automatically. Contact support if issue persists.".to_string())
            } else {
                guidance(error_type).map(str::to_string)
            },
            stage: stage.map(|s| s.to_string()),
            timestamp: ClassifiedError::now_timestamp(),
            stack_trace,
            retry_count,
        }
    }

    /// Veredicto rápido sin contexto de etapa.
    pub fn is_retryable(&self, error: &StageError) -> bool {
        self.classify(error, None, 0).should_retry
    }
}
