//! Google Patents public dataset provider
//!
//! Runs parameterized SQL against the public patents warehouse through the
//! synchronous `jobs.query` REST endpoint. Repeated columns are flattened to
//! scalar strings in SQL so that every result row is a flat record.

use super::traits::*;
use crate::assets::{parse_registry_date, AssetType, CanonicalAsset};
use crate::config::ProviderConfig;
use crate::network::HttpClient;
use crate::search::{SearchRequest, SortDirection};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

const PUBLICATIONS_TABLE: &str = "`patents-public-data.patents.publications`";

const SELECT_COLUMNS: &str = r#"SELECT
  publication_number,
  (SELECT t.text FROM UNNEST(title_localized) AS t ORDER BY t.language = 'en' DESC LIMIT 1) AS title,
  (SELECT a.text FROM UNNEST(abstract_localized) AS a ORDER BY a.language = 'en' DESC LIMIT 1) AS abstract,
  application_number,
  filing_date,
  publication_date,
  priority_date,
  ARRAY_TO_STRING(ARRAY(SELECT x.name FROM UNNEST(assignee_harmonized) AS x LIMIT 3), '; ') AS assignees,
  ARRAY_TO_STRING(ARRAY(SELECT x.name FROM UNNEST(inventor_harmonized) AS x LIMIT 3), '; ') AS inventors,
  ARRAY_TO_STRING(ARRAY(SELECT c.code FROM UNNEST(cpc) AS c LIMIT 5), ', ') AS cpc_codes,
  ARRAY_TO_STRING(ARRAY(SELECT c.code FROM UNNEST(ipc) AS c LIMIT 5), ', ') AS ipc_codes,
  family_id,
  country_code"#;

/// Named query parameter
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParameter {
    pub name: &'static str,
    pub kind: &'static str,
    pub value: String,
}

impl QueryParameter {
    fn string(name: &'static str, value: String) -> Self {
        Self {
            name,
            kind: "STRING",
            value,
        }
    }

    fn int64(name: &'static str, value: String) -> Self {
        Self {
            name,
            kind: "INT64",
            value,
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "parameterType": { "type": self.kind },
            "parameterValue": { "value": self.value },
        })
    }
}

/// SQL text plus its named parameters
#[derive(Debug, Clone)]
pub struct WarehouseQuery {
    pub sql: String,
    pub parameters: Vec<QueryParameter>,
}

/// Google Patents warehouse client
pub struct GooglePatents {
    client: HttpClient,
    base_url: String,
    project_id: Option<String>,
    access_token: Option<String>,
    timeout: Duration,
}

impl GooglePatents {
    pub fn new(client: HttpClient, config: &ProviderConfig) -> Self {
        Self {
            timeout: client.timeout_for(config.timeout),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            project_id: config.project_id.clone().filter(|p| !p.is_empty()),
            access_token: config.access_token.clone().filter(|t| !t.is_empty()),
            client,
        }
    }

    /// Run a query and return its rows as column-name maps
    async fn run_query(&self, query: WarehouseQuery) -> Result<Vec<HashMap<String, String>>> {
        let (Some(project), Some(token)) = (&self.project_id, &self.access_token) else {
            return Err(ProviderFailure::Auth("warehouse project or token not configured".into()).into());
        };

        debug!("Warehouse SQL: {}", query.sql);

        let body = json!({
            "query": query.sql,
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "timeoutMs": self.timeout.as_millis() as u64,
            "queryParameters": query.parameters.iter().map(QueryParameter::to_json).collect::<Vec<_>>(),
        });

        let request = ProviderRequest::post(format!("{}/projects/{}/queries", self.base_url, project))
            .bearer(token)
            .json(body);

        let response = self
            .client
            .execute_with_timeout(request, self.timeout)
            .await?
            .ensure_success()?;

        let json: Value = response.json()?;
        if json.get("jobComplete").and_then(|c| c.as_bool()) == Some(false) {
            return Err(ProviderFailure::Timeout.into());
        }

        parse_rows(&json)
    }

    async fn run_search(&self, request: &SearchRequest) -> Result<Vec<CanonicalAsset>> {
        let rows = self.run_query(build_search_query(request)).await?;
        debug!("Warehouse search returned {} rows", rows.len());
        Ok(rows.iter().map(|row| self.row_to_asset(row)).collect())
    }

    fn row_to_asset(&self, row: &HashMap<String, String>) -> CanonicalAsset {
        let field = |name: &str| {
            row.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let publication_number = field("publication_number").unwrap_or_default();
        let mut asset = CanonicalAsset::new(publication_number.clone(), "GOOGLE_PATENT", self.name())
            .with_type(AssetType::Patent)
            .with_title(field("title").unwrap_or_default());

        asset.publication_number = field("publication_number");
        asset.description = field("abstract");
        asset.application_number = field("application_number");
        asset.jurisdiction = Some(field("country_code").unwrap_or_else(|| "INTERNATIONAL".to_string()));
        asset.application_date = field("filing_date").and_then(|d| parse_registry_date(&d));
        asset.publication_date = field("publication_date").and_then(|d| parse_registry_date(&d));
        asset.priority_date = field("priority_date").and_then(|d| parse_registry_date(&d));
        asset.assignee = field("assignees");
        asset.inventor = field("inventors");
        asset.cpc_classification = field("cpc_codes");
        asset.ipc_classification = field("ipc_codes");
        asset.keywords = field("family_id").map(|id| format!("Family ID: {}", id));
        asset.status = Some("Published".to_string());
        asset.legal_status = Some("Active".to_string());
        if !publication_number.is_empty() {
            asset.url = Some(format!("https://patents.google.com/patent/{}", publication_number.replace('-', "")));
        }

        asset
    }
}

/// Build the parameterized search SQL for a request
pub fn build_search_query(request: &SearchRequest) -> WarehouseQuery {
    let mut sql = format!("{}\nFROM {}\nWHERE 1=1", SELECT_COLUMNS, PUBLICATIONS_TABLE);
    let mut parameters = Vec::new();

    let like = |v: &str| format!("%{}%", v.to_lowercase());
    let non_blank = |v: &Option<String>| v.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);

    if let Some(keyword) = non_blank(&request.query) {
        sql.push_str(
            "\n  AND (EXISTS(SELECT 1 FROM UNNEST(title_localized) AS t WHERE LOWER(t.text) LIKE @keyword)\
             \n    OR EXISTS(SELECT 1 FROM UNNEST(abstract_localized) AS a WHERE LOWER(a.text) LIKE @keyword))",
        );
        parameters.push(QueryParameter::string("keyword", like(&keyword)));
    }

    if let Some(inventor) = non_blank(&request.inventor) {
        sql.push_str("\n  AND EXISTS(SELECT 1 FROM UNNEST(inventor_harmonized) AS inv WHERE LOWER(inv.name) LIKE @inventor)");
        parameters.push(QueryParameter::string("inventor", like(&inventor)));
    }

    if let Some(assignee) = non_blank(&request.assignee) {
        sql.push_str("\n  AND EXISTS(SELECT 1 FROM UNNEST(assignee_harmonized) AS asg WHERE LOWER(asg.name) LIKE @assignee)");
        parameters.push(QueryParameter::string("assignee", like(&assignee)));
    }

    if let Some(jurisdiction) = non_blank(&request.jurisdiction) {
        sql.push_str("\n  AND UPPER(country_code) = @jurisdiction");
        parameters.push(QueryParameter::string("jurisdiction", jurisdiction.to_uppercase()));
    }

    if let Some(from) = request.from_date {
        sql.push_str("\n  AND publication_date >= @from_date");
        parameters.push(QueryParameter::int64("from_date", from.format("%Y%m%d").to_string()));
    }

    if let Some(to) = request.to_date {
        sql.push_str("\n  AND publication_date <= @to_date");
        parameters.push(QueryParameter::int64("to_date", to.format("%Y%m%d").to_string()));
    }

    if let Some(column) = sort_column(&request.sort_by) {
        let direction = match request.sort_direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        sql.push_str(&format!("\nORDER BY {} {}", column, direction));
    }

    let size = request.size.max(1);
    let offset = u64::from(request.page) * u64::from(size);
    sql.push_str(&format!("\nLIMIT {} OFFSET {}", size, offset));

    WarehouseQuery { sql, parameters }
}

/// Column for a request sort key; unknown keys are not sorted on
fn sort_column(sort_by: &str) -> Option<&'static str> {
    match sort_by {
        "applicationDate" => Some("filing_date"),
        "publicationDate" => Some("publication_date"),
        "priorityDate" => Some("priority_date"),
        _ => None,
    }
}

/// Zip `rows[].f[].v` with the schema field names
fn parse_rows(json: &Value) -> Result<Vec<HashMap<String, String>>> {
    let names: Vec<&str> = json
        .get("schema")
        .and_then(|s| s.get("fields"))
        .and_then(|f| f.as_array())
        .map(|fields| {
            fields
                .iter()
                .map(|f| f.get("name").and_then(|n| n.as_str()).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default();

    let Some(rows) = json.get("rows").and_then(|r| r.as_array()) else {
        return Ok(vec![]);
    };

    if names.is_empty() {
        return Err(ProviderFailure::Parse("rows without a schema".into()).into());
    }

    Ok(rows
        .iter()
        .filter_map(|row| row.get("f").and_then(|f| f.as_array()))
        .map(|cells| {
            names
                .iter()
                .zip(cells)
                .filter_map(|(name, cell)| {
                    let value = match cell.get("v")? {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        _ => return None,
                    };
                    Some((name.to_string(), value))
                })
                .collect()
        })
        .collect())
}

#[async_trait]
impl ProviderClient for GooglePatents {
    fn name(&self) -> &str {
        "GOOGLE_PATENT"
    }

    fn about(&self) -> ProviderAbout {
        ProviderAbout::new()
            .website("https://patents.google.com")
            .official_api(true)
            .credentials_required(true)
            .results_format("SQL rows")
    }

    fn rate_limit_per_minute(&self) -> u32 {
        100
    }

    async fn search(&self, request: &SearchRequest) -> ProviderOutcome {
        let start = Instant::now();
        outcome_from(self.name(), start, self.run_search(request).await)
    }

    async fn get_details(&self, external_id: &str) -> Option<CanonicalAsset> {
        let query = WarehouseQuery {
            sql: format!(
                "{}\nFROM {}\nWHERE publication_number = @pub_number\nLIMIT 1",
                SELECT_COLUMNS, PUBLICATIONS_TABLE
            ),
            parameters: vec![QueryParameter::string("pub_number", external_id.to_string())],
        };

        match self.run_query(query).await {
            Ok(rows) => rows.first().map(|row| self.row_to_asset(row)),
            Err(e) => {
                warn!("Warehouse details for {} failed: {:#}", external_id, e);
                None
            }
        }
    }

    async fn is_available(&self) -> bool {
        self.project_id.is_some() && self.access_token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GooglePatents {
        let config = ProviderConfig {
            base_url: Some(server.uri()),
            project_id: Some("my-project".into()),
            access_token: Some("tok".into()),
            ..ProviderConfig::of("google_patents")
        };
        GooglePatents::new(HttpClient::new().unwrap(), &config)
    }

    fn query_response() -> Value {
        let fields = [
            "publication_number",
            "title",
            "abstract",
            "application_number",
            "filing_date",
            "publication_date",
            "priority_date",
            "assignees",
            "inventors",
            "cpc_codes",
            "ipc_codes",
            "family_id",
            "country_code",
        ];
        json!({
            "kind": "bigquery#queryResponse",
            "jobComplete": true,
            "totalRows": "1",
            "schema": { "fields": fields.iter().map(|n| json!({"name": n, "type": "STRING"})).collect::<Vec<_>>() },
            "rows": [{
                "f": [
                    {"v": "US-9876543-B2"},
                    {"v": "Wireless charging coil"},
                    {"v": "A coil for charging."},
                    {"v": "US-201514000000-A"},
                    {"v": "20150301"},
                    {"v": "20180123"},
                    {"v": "0"},
                    {"v": "ACME CORP; GLOBEX INC"},
                    {"v": "ROE JANE"},
                    {"v": "H02J50/10, H01F38/14"},
                    {"v": ""},
                    {"v": "55512345"},
                    {"v": "US"}
                ]
            }]
        })
    }

    #[test]
    fn test_build_search_query() {
        let mut request = SearchRequest::simple("Battery").with_assignee("Acme").with_page(2, 10);
        request.from_date = NaiveDate::from_ymd_opt(2020, 1, 31);

        let query = build_search_query(&request);

        assert!(query.sql.contains("LIKE @keyword"));
        assert!(query.sql.contains("LIKE @assignee"));
        assert!(!query.sql.contains("@inventor"));
        assert!(query.sql.contains("publication_date >= @from_date"));
        assert!(query.sql.contains("ORDER BY filing_date DESC"));
        assert!(query.sql.ends_with("LIMIT 10 OFFSET 20"));
        assert_eq!(
            query.parameters,
            vec![
                QueryParameter::string("keyword", "%battery%".into()),
                QueryParameter::string("assignee", "%acme%".into()),
                QueryParameter::int64("from_date", "20200131".into()),
            ]
        );
    }

    #[test]
    fn test_far_page_offset_does_not_overflow() {
        let request = SearchRequest::simple("x").with_page(300_000_000, 20);
        assert!(build_search_query(&request)
            .sql
            .ends_with("LIMIT 20 OFFSET 6000000000"));

        let zero_size = SearchRequest::simple("x").with_page(u32::MAX, 0);
        assert!(build_search_query(&zero_size)
            .sql
            .ends_with(&format!("LIMIT 1 OFFSET {}", u32::MAX)));
    }

    #[test]
    fn test_unknown_sort_key_is_not_interpolated() {
        let mut request = SearchRequest::simple("x");
        request.sort_by = "title; DROP TABLE".into();
        assert!(!build_search_query(&request).sql.contains("ORDER BY"));
    }

    #[tokio::test]
    async fn test_search_maps_rows() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/projects/my-project/queries"))
            .and(header("Authorization", "Bearer tok"))
            .and(body_partial_json(json!({"useLegacySql": false, "parameterMode": "NAMED"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(query_response()))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = provider(&server).search(&SearchRequest::simple("charging")).await;

        assert!(outcome.is_success());
        let asset = &outcome.assets[0];
        assert_eq!(asset.external_id.as_deref(), Some("US-9876543-B2"));
        assert_eq!(asset.patent_office.as_deref(), Some("GOOGLE_PATENT"));
        assert_eq!(asset.assignee.as_deref(), Some("ACME CORP; GLOBEX INC"));
        assert_eq!(asset.publication_date, NaiveDate::from_ymd_opt(2018, 1, 23));
        assert_eq!(asset.priority_date, None);
        assert_eq!(asset.ipc_classification, None);
        assert_eq!(asset.keywords.as_deref(), Some("Family ID: 55512345"));
        assert_eq!(asset.legal_status.as_deref(), Some("Active"));
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let provider = GooglePatents::new(HttpClient::new().unwrap(), &ProviderConfig::of("google_patents"));
        assert!(!provider.is_available().await);

        let outcome = provider.search(&SearchRequest::simple("x")).await;
        assert!(matches!(outcome.failure, Some(ProviderFailure::Auth(_))));
    }

    #[tokio::test]
    async fn test_incomplete_job_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobComplete": false})))
            .mount(&server)
            .await;

        let outcome = provider(&server).search(&SearchRequest::simple("x")).await;
        assert_eq!(outcome.failure, Some(ProviderFailure::Timeout));
    }
}
