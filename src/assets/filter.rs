//! Client-side filters re-applied after merging

use super::types::CanonicalAsset;
use crate::search::SearchRequest;
use chrono::NaiveDate;

/// Filters that not every provider can push down to its registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    /// Lowercased assignee substring
    assignee: Option<String>,
    /// Lowercased inventor substring
    inventor: Option<String>,
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
}

impl PostFilter {
    /// Build the filter set carried by a request
    pub fn from_request(request: &SearchRequest) -> Self {
        Self {
            assignee: lowered(request.assignee.as_deref()),
            inventor: lowered(request.inventor.as_deref()),
            from_date: request.from_date,
            to_date: request.to_date,
        }
    }

    /// Whether any filter is active
    pub fn is_empty(&self) -> bool {
        self.assignee.is_none()
            && self.inventor.is_none()
            && self.from_date.is_none()
            && self.to_date.is_none()
    }

    /// Check a single asset against every active filter
    pub fn matches(&self, asset: &CanonicalAsset) -> bool {
        if let Some(ref needle) = self.assignee {
            if !contains_lowered(asset.assignee.as_deref(), needle) {
                return false;
            }
        }

        if let Some(ref needle) = self.inventor {
            if !contains_lowered(asset.inventor.as_deref(), needle) {
                return false;
            }
        }

        if self.from_date.is_some() || self.to_date.is_some() {
            let Some(published) = asset.publication_date else {
                return false;
            };
            if self.from_date.is_some_and(|from| published < from) {
                return false;
            }
            if self.to_date.is_some_and(|to| published > to) {
                return false;
            }
        }

        true
    }

    /// Keep only the assets that pass every filter
    pub fn apply(&self, assets: Vec<CanonicalAsset>) -> Vec<CanonicalAsset> {
        if self.is_empty() {
            return assets;
        }
        assets.into_iter().filter(|a| self.matches(a)).collect()
    }
}

fn lowered(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

fn contains_lowered(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(needle))
        .unwrap_or(false)
}
