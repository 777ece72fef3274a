// [apps/orchestrator/src/middleware.rs]
/*!
 * =================================================================
 * APARATO: AUTH GUARD (V4.1)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: VERIFICACIÓN BEARER DEL ESTRATO /api
 * =================================================================
 */

use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::warn;

/// Rechaza toda petición /api sin el token maestro.
pub async fn auth_guard(
    State(application_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == application_state.api_key => Ok(next.run(request).await),
        _ => {
            warn!("🛡️  [AUTH_GUARD]: Request rejected (invalid or missing bearer token).");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
