//! Canonical assets and the merge pipeline stages
//!
//! Defines the unified asset record plus the stages that turn provider
//! outcomes into a result: deduplication, post-filtering and pagination.

mod filter;
mod merger;
mod pagination;
mod types;

pub use filter::PostFilter;
pub use merger::{synthetic_id, FailedSource, MergedAssets, ResultMerger, DEFAULT_PATENT_OFFICE};
pub use pagination::{paginate, PageInfo};
pub use types::*;
