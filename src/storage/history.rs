//! Search history records

use super::StorageError;
use crate::search::{SearchRequest, SearchResult, SearchType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One completed search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    pub id: Uuid,
    /// First non-blank of query, inventor and assignee
    pub search_query: String,
    /// The request, as JSON
    pub serialized_filters: String,
    pub results_count: usize,
    pub data_source: String,
    pub search_type: SearchType,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEvent {
    /// Describe a finished search
    pub fn from_search(request: &SearchRequest, result: &SearchResult) -> Result<Self, StorageError> {
        Ok(Self {
            id: Uuid::new_v4(),
            search_query: request.display_query(),
            serialized_filters: serde_json::to_string(request)?,
            results_count: result.total_elements,
            data_source: normalize_source_label(&result.data_source),
            search_type: request.search_type(),
            timestamp: Utc::now(),
        })
    }
}

/// Reduce a comma-joined provenance label to the single source it is filed under
pub fn normalize_source_label(label: &str) -> String {
    let first = label.split(',').next().unwrap_or_default().trim();
    let upper = first.to_uppercase();

    if upper.starts_with("TMVIEW") {
        "TMVIEW".to_string()
    } else if upper.starts_with("USPTO") {
        "USPTO".to_string()
    } else {
        first.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::PageInfo;

    #[test]
    fn test_normalize_source_label() {
        assert_eq!(normalize_source_label("USPTO, EPO, GOOGLE_PATENT"), "USPTO");
        assert_eq!(normalize_source_label("TMVIEW_SELENIUM"), "TMVIEW");
        assert_eq!(normalize_source_label("uspto-bulk"), "USPTO");
        assert_eq!(normalize_source_label(" EPO , USPTO"), "EPO");
        assert_eq!(normalize_source_label(""), "");
    }

    #[test]
    fn test_event_from_search() {
        let request = SearchRequest::default().with_assignee("Acme");
        let result = SearchResult::new(
            &request,
            vec![],
            PageInfo::default(),
            "EPO, USPTO".to_string(),
            vec![],
        );

        let event = HistoryEvent::from_search(&request, &result).unwrap();

        assert_eq!(event.search_query, "Acme");
        assert_eq!(event.data_source, "EPO");
        assert_eq!(event.search_type, SearchType::Assignee);
        assert_eq!(event.results_count, 0);

        let filters: SearchRequest = serde_json::from_str(&event.serialized_filters).unwrap();
        assert_eq!(filters, request);
    }
}
