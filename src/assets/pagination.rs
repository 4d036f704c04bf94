//! Page metadata for merged results

use serde::{Deserialize, Serialize};

/// Derived page metadata
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Compute page metadata for `count` items at zero-based `page` of `size`
///
/// The metadata describes the whole merged set; callers receive every item,
/// not a slice of it.
pub fn paginate(count: usize, page: u32, size: u32) -> PageInfo {
    let size = size.max(1) as usize;
    let total_pages = count.div_ceil(size) as u32;

    PageInfo {
        total_pages,
        has_next: (page as u64) + 1 < total_pages as u64,
        has_previous: page > 0,
    }
}
