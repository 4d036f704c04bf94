//! Registry provider module
//!
//! Defines the ProviderClient trait, the per-registry implementations and a
//! registry holding the configured ones.

mod alias;
mod loader;
mod registry;
mod traits;

// Provider implementations
pub mod epo;
pub mod google_patents;
pub mod openalex;
pub mod serpapi;
pub mod tmview;
pub mod uspto;
pub mod wipo;

#[cfg(test)]
pub(crate) mod fake;

pub use alias::{AliasExpansionDecorator, AliasSet};
pub use loader::ProviderLoader;
pub use registry::ProviderRegistry;
pub use traits::*;
