// [apps/orchestrator/src/kernel.rs]
/*!
 * =================================================================
 * APARATO: HTTP KERNEL (V5.0)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: SERVICIO AXUM CON APAGADO ORDENADO
 * =================================================================
 */

use crate::routes::create_router;
use crate::state::AppState;
use anyhow::{Context, Result};
use tracing::info;

pub async fn serve(bind_address: &str, application_state: AppState) -> Result<()> {
    let router = create_router(application_state);

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .context("NET_FAULT: unable to claim bind address")?;

    info!("🌐 [KERNEL]: HTTP surface listening on [{}].", bind_address);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("🛑 [KERNEL]: Termination requested; draining connections.");
        })
        .await
        .context("NET_FAULT: HTTP kernel collapsed")?;

    Ok(())
}
