// [apps/orchestrator/src/lib.rs]
pub mod bootstrap;
pub mod handlers;
pub mod kernel;
pub mod middleware;
pub mod routes;
pub mod state;

pub use bootstrap::{build_application_state, OrchestratorDirectives};
pub use routes::create_router;
pub use state::AppState;
