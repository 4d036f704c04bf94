//! Search request and result data models

use crate::assets::{AssetType, CanonicalAsset, FailedSource, PageInfo};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default number of results per page
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// A logical search to run against the registries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchRequest {
    /// Free-text query
    pub query: Option<String>,
    pub title: Option<String>,
    pub inventor: Option<String>,
    pub assignee: Option<String>,
    /// Country or region code
    pub jurisdiction: Option<String>,
    pub asset_type: Option<AssetType>,
    pub patent_office: Option<String>,
    pub keywords: Option<String>,
    pub classification: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    /// Explicit source routing (e.g. `["TMVIEW"]`)
    pub data_sources: Vec<String>,
    /// Caller's hint of the search kind; entity-only gateways read it
    pub search_type: Option<String>,
    /// Zero-based page index
    pub page: u32,
    pub size: u32,
    pub sort_by: String,
    pub sort_direction: SortDirection,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: None,
            title: None,
            inventor: None,
            assignee: None,
            jurisdiction: None,
            asset_type: None,
            patent_office: None,
            keywords: None,
            classification: None,
            from_date: None,
            to_date: None,
            data_sources: vec![],
            search_type: None,
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort_by: "applicationDate".to_string(),
            sort_direction: SortDirection::Desc,
        }
    }
}

impl SearchRequest {
    /// Create a keyword request
    pub fn simple(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Default::default()
        }
    }

    /// Set the assignee filter
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Set the inventor filter
    pub fn with_inventor(mut self, inventor: impl Into<String>) -> Self {
        self.inventor = Some(inventor.into());
        self
    }

    /// Set the asset type
    pub fn with_asset_type(mut self, asset_type: AssetType) -> Self {
        self.asset_type = Some(asset_type);
        self
    }

    /// Set page and size
    pub fn with_page(mut self, page: u32, size: u32) -> Self {
        self.page = page;
        self.size = size;
        self
    }

    /// Clamp page size into `1..=max_size`, substituting the default for zero
    pub fn normalized(mut self, default_size: u32, max_size: u32) -> Self {
        if self.size == 0 {
            self.size = default_size.max(1);
        }
        self.size = self.size.min(max_size.max(1));
        self
    }

    /// Zero-based index of the first record on the requested page
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }

    /// One-based page number
    pub fn page_number(&self) -> u64 {
        u64::from(self.page) + 1
    }

    /// Free-text query, if non-blank
    pub fn query_text(&self) -> Option<&str> {
        non_blank(self.query.as_deref())
    }

    /// Which registry family the request targets
    pub fn route(&self) -> AssetRoute {
        let is_tmview = |s: &str| s.trim().eq_ignore_ascii_case("TMVIEW");

        if self.asset_type == Some(AssetType::Trademark)
            || self.data_sources.iter().any(|ds| is_tmview(ds))
            || self.patent_office.as_deref().is_some_and(is_tmview)
        {
            AssetRoute::Trademarks
        } else {
            AssetRoute::Patents
        }
    }

    /// The entity-name filter in effect, assignee taking precedence
    pub fn entity_filter(&self) -> Option<(EntityField, &str)> {
        if let Some(assignee) = non_blank(self.assignee.as_deref()) {
            return Some((EntityField::Assignee, assignee));
        }
        non_blank(self.inventor.as_deref()).map(|inventor| (EntityField::Inventor, inventor))
    }

    /// Copy of this request with the given entity field set to `value`
    pub fn with_entity(&self, field: EntityField, value: &str) -> Self {
        let mut request = self.clone();
        match field {
            EntityField::Assignee => request.assignee = Some(value.to_string()),
            EntityField::Inventor => request.inventor = Some(value.to_string()),
        }
        request
    }

    /// Copy of this request as a plain keyword search for `value`
    ///
    /// Both entity fields are cleared so no name filter survives the retry.
    pub fn keyword_fallback(&self, value: &str) -> Self {
        let mut request = self.clone();
        request.assignee = None;
        request.inventor = None;
        request.query = Some(value.to_string());
        request.search_type = Some("KEYWORD".to_string());
        request
    }

    /// Classify the request for history records
    pub fn search_type(&self) -> SearchType {
        if non_blank(self.inventor.as_deref()).is_some() {
            return SearchType::Inventor;
        }
        if non_blank(self.assignee.as_deref()).is_some() {
            return SearchType::Assignee;
        }
        if non_blank(self.classification.as_deref()).is_some() {
            return SearchType::Classification;
        }
        if self.filter_group_count() > 2 {
            return SearchType::Advanced;
        }
        SearchType::Keyword
    }

    /// The text that best describes what was searched for
    pub fn display_query(&self) -> String {
        [&self.query, &self.inventor, &self.assignee]
            .into_iter()
            .find_map(|v| non_blank(v.as_deref()))
            .unwrap_or_default()
            .to_string()
    }

    fn filter_group_count(&self) -> usize {
        let text_filters = [&self.query, &self.title, &self.inventor, &self.assignee]
            .into_iter()
            .filter(|v| non_blank(v.as_deref()).is_some())
            .count();

        text_filters
            + usize::from(self.jurisdiction.is_some())
            + usize::from(self.asset_type.is_some())
            + usize::from(self.from_date.is_some() || self.to_date.is_some())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Registry family a request is routed to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AssetRoute {
    Patents,
    Trademarks,
}

/// Structured entity-name field of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityField {
    Assignee,
    Inventor,
}

/// Kind of search, as recorded in history
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchType {
    Keyword,
    Inventor,
    Assignee,
    Classification,
    Advanced,
}

/// Merged, deduplicated and filtered search result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub assets: Vec<CanonicalAsset>,
    pub total_elements: usize,
    pub total_pages: u32,
    pub current_page: u32,
    pub page_size: u32,
    pub has_next: bool,
    pub has_previous: bool,
    pub search_query: Option<String>,
    /// Comma-joined labels of the providers that were dispatched
    pub data_source: String,
    #[serde(default)]
    pub failed_sources: Vec<FailedSource>,
}

impl SearchResult {
    /// Assemble a result from its parts
    pub fn new(
        request: &SearchRequest,
        assets: Vec<CanonicalAsset>,
        page_info: PageInfo,
        data_source: String,
        failed_sources: Vec<FailedSource>,
    ) -> Self {
        Self {
            total_elements: assets.len(),
            assets,
            total_pages: page_info.total_pages,
            current_page: request.page,
            page_size: request.size,
            has_next: page_info.has_next,
            has_previous: page_info.has_previous,
            search_query: request.query.clone(),
            data_source,
            failed_sources,
        }
    }
}
