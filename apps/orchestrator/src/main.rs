// [apps/orchestrator/src/main.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR MAIN ENTRY POINT (V5.2)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 * =================================================================
 */

use acumen_orchestrator::{build_application_state, kernel, OrchestratorDirectives};
use acumen_shared_argus::init_tracing;
use anyhow::Result;
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("acumen_orchestrator");

    info!("💠 [SHELL]: Orchestrator ignition sequence starting...");

    let directives = OrchestratorDirectives::parse();
    let application_state = build_application_state(&directives).await?;

    kernel::serve(&directives.bind_address, application_state).await?;

    info!("🏁 [SHELL]: Orchestrator sealed. Goodbye.");
    Ok(())
}
