//! Search pipeline module
//!
//! Request and result models, the concurrent provider fan-out and the
//! service that merges, filters, persists and paginates what comes back.

mod models;
mod orchestrator;
mod service;

pub use models::*;
pub use orchestrator::SearchOrchestrator;
pub use service::{FederatedSearch, SearchError};
