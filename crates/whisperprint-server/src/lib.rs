//! WhisperPrint HTTP server: router, shared state, registry validation.

pub mod routes;
pub mod state;
pub mod validate;

pub use routes::build_router;
pub use state::AppState;
