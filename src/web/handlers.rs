//! HTTP request handlers

use super::state::AppState;
use crate::assets::CanonicalAsset;
use crate::providers::{Coverage, ProviderAbout};
use crate::search::{SearchError, SearchRequest, SearchResult};
use crate::storage::HistoryEvent;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Default number of history events returned
const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 500;

/// Error returned by the JSON API
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("{0} not found")]
    NotFound(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Search(SearchError::UnknownSource(_)) => StatusCode::BAD_REQUEST,
            ApiError::Search(SearchError::NoEligibleProviders(_))
            | ApiError::Search(SearchError::SourceUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Search(SearchError::Persistence(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Federated search handler
pub async fn search_all(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResult>, ApiError> {
    let result = state.search.search_all(request.clone()).await?;
    state.search.record_history(&request, &result).await;
    Ok(Json(result))
}

/// Single-source search handler
pub async fn search_source(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResult>, ApiError> {
    let result = state.search.search_source(request.clone(), &source).await?;
    state.search.record_history(&request, &result).await;
    Ok(Json(result))
}

/// Asset details handler
pub async fn asset_details(
    State(state): State<AppState>,
    Path((source, external_id)): Path<(String, String)>,
) -> Result<Json<CanonicalAsset>, ApiError> {
    state
        .search
        .asset_details(&external_id, &source)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("{} asset {}", source, external_id)))
}

/// Registered source description
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub name: String,
    pub coverage: Coverage,
    pub rate_limit_per_minute: u32,
    pub about: ProviderAbout,
}

/// Sources listing handler
pub async fn sources(State(state): State<AppState>) -> Json<Vec<SourceInfo>> {
    let sources = state
        .search
        .registry()
        .all()
        .iter()
        .map(|provider| SourceInfo {
            name: provider.name().to_string(),
            coverage: provider.coverage(),
            rate_limit_per_minute: provider.rate_limit_per_minute(),
            about: provider.about(),
        })
        .collect();

    Json(sources)
}

/// Query parameters for history
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// Search history handler
pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryEvent>>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    Ok(Json(state.search.recent_history(limit).await?))
}

/// Health check handler
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "instance": state.instance_name(),
        "sources": state.search.available_sources(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::assets::CanonicalAsset;
    use crate::config::Settings;
    use crate::providers::fake::FakeProvider;
    use crate::providers::{ProviderClient, ProviderFailure, ProviderRegistry};
    use crate::web::{create_router, AppState};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let providers: Vec<Arc<dyn ProviderClient>> = vec![
            Arc::new(
                FakeProvider::returning(
                    "USPTO",
                    vec![CanonicalAsset::new("US123", "USPTO", "USPTO").with_title("Widget")],
                )
                .with_details(CanonicalAsset::new("US9", "USPTO", "USPTO").with_title("Nine")),
            ),
            Arc::new(FakeProvider::failing("EPO", ProviderFailure::Timeout)),
        ];

        let mut registry = ProviderRegistry::new();
        for provider in providers {
            registry.register(provider);
        }

        create_router(AppState::new(Settings::default(), registry))
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sources"], serde_json::json!(["USPTO", "EPO"]));
    }

    #[tokio::test]
    async fn test_search_all_records_history() {
        let app = app();

        let (status, body) = call(&app, post_json("/api/search/all", r#"{"query":"widget"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalElements"], 1);
        assert_eq!(body["assets"][0]["externalId"], "US123");
        assert_eq!(body["dataSource"], "USPTO, EPO");
        assert_eq!(body["failedSources"][0]["source"], "EPO");

        let (status, body) = call(&app, get("/api/search/history?limit=5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["searchQuery"], "widget");
        assert_eq!(body[0]["dataSource"], "USPTO");
    }

    #[tokio::test]
    async fn test_unknown_source_is_bad_request() {
        let (status, body) =
            call(&app(), post_json("/api/search/source/KIPO", r#"{"query":"x"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("KIPO"));
    }

    #[tokio::test]
    async fn test_no_trademark_providers_is_unavailable() {
        let (status, body) = call(
            &app(),
            post_json("/api/search/all", r#"{"query":"x","assetType":"TRADEMARK"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_asset_details() {
        let app = app();

        let (status, body) = call(&app, get("/api/search/details/USPTO/US9")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Nine");

        let (status, _) = call(&app, get("/api/search/details/USPTO/US404")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sources() {
        let (status, body) = call(&app(), get("/api/search/sources")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "USPTO");
        assert_eq!(body[0]["coverage"], "patents");
        assert_eq!(body[0]["rateLimitPerMinute"], 60);
    }
}
