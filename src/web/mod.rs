//! Web server module
//!
//! JSON HTTP API over the federated search service.

mod handlers;
mod routes;
mod state;

pub use handlers::ApiError;
pub use routes::create_router;
pub use state::AppState;
