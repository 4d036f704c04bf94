//! EPO Open Patent Services provider
//!
//! Searches with a CQL query, then fetches the bibliographic record of every
//! hit. OPS answers in XML and authenticates with an OAuth client-credentials
//! token that this provider obtains and refreshes on its own.

use super::traits::*;
use crate::assets::{parse_registry_date, AssetType, CanonicalAsset};
use crate::config::ProviderConfig;
use crate::network::HttpClient;
use crate::search::SearchRequest;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "https://ops.epo.org/3.2";

/// Lifetime assumed when the token response carries no `expires_in`
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(15 * 60);

/// Refresh this long before the registry would reject the token
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const MAX_CLASSIFICATIONS: usize = 5;

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// European Patent Office OPS client
pub struct Epo {
    client: HttpClient,
    base_url: String,
    consumer_key: Option<String>,
    consumer_secret: Option<String>,
    timeout: Duration,
    token: Mutex<Option<AccessToken>>,
}

impl Epo {
    pub fn new(client: HttpClient, config: &ProviderConfig) -> Self {
        Self {
            timeout: client.timeout_for(config.timeout),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            consumer_key: config.consumer_key.clone().filter(|k| !k.is_empty()),
            consumer_secret: config.consumer_secret.clone().filter(|s| !s.is_empty()),
            client,
            token: Mutex::new(None),
        }
    }

    /// Return a valid bearer token, requesting a new one when the cached one expired
    async fn ensure_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let (Some(key), Some(secret)) = (&self.consumer_key, &self.consumer_secret) else {
            return Err(ProviderFailure::Auth("consumer credentials not configured".into()).into());
        };

        let mut form = HashMap::new();
        form.insert("grant_type".to_string(), "client_credentials".to_string());

        let request = ProviderRequest::post(format!("{}/auth/accesstoken", self.base_url))
            .header("Accept", "application/json")
            .basic_auth(key, secret)
            .form(form);

        let response = self.client.execute_with_timeout(request, self.timeout).await?;
        if !response.is_success() {
            return Err(ProviderFailure::Auth(format!(
                "token endpoint returned HTTP {}",
                response.status
            ))
            .into());
        }

        let json: Value = response.json()?;
        let value = json
            .get("access_token")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderFailure::Auth("token response without access_token".into()))?
            .to_string();

        // OPS sends expires_in as a string
        let lifetime = json
            .get("expires_in")
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);

        info!("EPO access token refreshed, valid for {}s", lifetime.as_secs());

        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });

        Ok(value)
    }

    fn ops_request(&self, url: String, token: &str) -> ProviderRequest {
        ProviderRequest::get(url)
            .header("Accept", "application/xml")
            .bearer(token)
    }

    async fn run_search(&self, request: &SearchRequest) -> Result<Vec<CanonicalAsset>> {
        let token = self.ensure_token().await?;
        let cql = build_query(request);
        let range = ops_range(request);
        debug!("EPO query '{}' range {}", cql, range);

        let search = self
            .ops_request(
                format!("{}/rest-services/published-data/search", self.base_url),
                &token,
            )
            .param("q", cql)
            .header("X-OPS-Range", range);

        let response = self.client.execute_with_timeout(search, self.timeout).await?;

        // OPS reports an empty hit list as 404
        if response.status == 404 {
            return Ok(vec![]);
        }

        let response = response.ensure_success()?;
        let mut ids = parse_search_ids(&response.text)?;
        ids.truncate(request.size as usize);

        let fetches = ids.iter().map(|id| self.fetch_biblio(id, &token));
        let mut assets = Vec::with_capacity(ids.len());

        for (id, result) in ids.iter().zip(join_all(fetches).await) {
            match result {
                Ok(Some(asset)) => assets.push(asset),
                Ok(None) => debug!("EPO biblio for {} was empty", id),
                Err(e) => warn!("EPO biblio for {} failed: {:#}", id, e),
            }
        }

        Ok(assets)
    }

    /// Fetch and map the bibliographic record of one publication
    async fn fetch_biblio(&self, id: &str, token: &str) -> Result<Option<CanonicalAsset>> {
        let url = format!(
            "{}/rest-services/published-data/publication/epodoc/{}/biblio",
            self.base_url,
            urlencoding::encode(id)
        );

        let response = self
            .client
            .execute_with_timeout(self.ops_request(url, token), self.timeout)
            .await?
            .ensure_success()?;

        Ok(parse_biblio(&response.text)?.map(|draft| draft.into_asset(self.name())))
    }
}

/// One-based inclusive `X-OPS-Range` for the requested page
fn ops_range(request: &SearchRequest) -> String {
    let first = request.offset().saturating_add(1);
    let last = request.offset().saturating_add(u64::from(request.size.max(1)));
    format!("{}-{}", first, last)
}

/// Build the CQL expression for a request
pub fn build_query(request: &SearchRequest) -> String {
    let clauses = [
        ("ta", &request.query),
        ("pa", &request.assignee),
        ("in", &request.inventor),
    ];

    let query = clauses
        .iter()
        .filter_map(|(field, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{}={}*", field, v))
        })
        .collect::<Vec<_>>()
        .join(" and ");

    if query.is_empty() {
        "ta=patent".to_string()
    } else {
        query
    }
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn attribute(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

fn ends_with(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a == b)
}

fn within(path: &[String], name: &str) -> bool {
    path.iter().any(|p| p == name)
}

fn xml_error(e: quick_xml::Error) -> anyhow::Error {
    ProviderFailure::Parse(format!("invalid XML: {}", e)).into()
}

/// Extract the epodoc identifiers listed in a search response
pub fn parse_search_ids(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut ids = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut country: Option<String> = None;
    let mut number: Option<String> = None;
    let mut buffer = Vec::new();

    loop {
        match reader.read_event_into(&mut buffer).map_err(xml_error)? {
            Event::Start(ref e) => {
                let name = local_name(e);
                if name == "publication-reference" {
                    country = None;
                    number = None;
                }
                path.push(name);
            }
            Event::Text(ref e) => {
                if within(&path, "publication-reference") {
                    let text = e.unescape().map_err(xml_error)?.trim().to_string();
                    if ends_with(&path, &["document-id", "country"]) && country.is_none() {
                        country = Some(text);
                    } else if ends_with(&path, &["document-id", "doc-number"]) && number.is_none() {
                        number = Some(text);
                    }
                }
            }
            Event::End(_) => {
                if path.pop().as_deref() == Some("publication-reference") {
                    if let Some(number) = number.take() {
                        ids.push(epodoc_id(country.take().as_deref(), &number));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buffer.clear();
    }

    Ok(ids)
}

/// Country-prefixed document number, without doubling an existing prefix
fn epodoc_id(country: Option<&str>, number: &str) -> String {
    match country {
        Some(cc) if !number.starts_with(cc) => format!("{}{}", cc, number),
        _ => number.to_string(),
    }
}

/// Fields collected from an `exchange-document`
#[derive(Debug, Default)]
struct BiblioDraft {
    country: Option<String>,
    doc_number: Option<String>,
    publication_date: Option<String>,
    application_number: Option<String>,
    application_date: Option<String>,
    priority_date: Option<String>,
    titles: Vec<(Option<String>, String)>,
    /// (data-format, name)
    applicants: Vec<(Option<String>, String)>,
    inventors: Vec<(Option<String>, String)>,
    ipc: Vec<String>,
    abstract_paragraphs: Vec<String>,
}

/// Element attributes in scope for a text node
struct TextContext<'a> {
    party_format: Option<&'a str>,
    title_lang: Option<&'a str>,
    in_abstract: bool,
}

impl BiblioDraft {
    /// Route a text node to the field its element path denotes
    fn record(&mut self, path: &[String], text: String, context: TextContext) {
        let first = |slot: &mut Option<String>, text: String| {
            if slot.is_none() {
                *slot = Some(text);
            }
        };

        if within(path, "publication-reference") {
            if ends_with(path, &["document-id", "country"]) {
                first(&mut self.country, text);
            } else if ends_with(path, &["document-id", "doc-number"]) {
                first(&mut self.doc_number, text);
            } else if ends_with(path, &["document-id", "date"]) {
                first(&mut self.publication_date, text);
            }
        } else if within(path, "application-reference") {
            if ends_with(path, &["document-id", "doc-number"]) {
                first(&mut self.application_number, text);
            } else if ends_with(path, &["document-id", "date"]) {
                first(&mut self.application_date, text);
            }
        } else if within(path, "priority-claim") {
            if ends_with(path, &["document-id", "date"]) {
                first(&mut self.priority_date, text);
            }
        } else if ends_with(path, &["applicant", "applicant-name", "name"]) {
            self.applicants.push((context.party_format.map(str::to_string), text));
        } else if ends_with(path, &["inventor", "inventor-name", "name"]) {
            self.inventors.push((context.party_format.map(str::to_string), text));
        } else if ends_with(path, &["invention-title"]) {
            self.titles.push((context.title_lang.map(str::to_string), text));
        } else if ends_with(path, &["classification-ipcr", "text"]) {
            self.ipc.push(text);
        } else if context.in_abstract && ends_with(path, &["p"]) {
            self.abstract_paragraphs.push(text);
        }
    }

    fn into_asset(self, source: &str) -> CanonicalAsset {
        let id = self
            .doc_number
            .as_deref()
            .map(|n| epodoc_id(self.country.as_deref(), n))
            .unwrap_or_default();

        let title = self
            .titles
            .iter()
            .find(|(lang, _)| lang.as_deref().is_some_and(|l| l.eq_ignore_ascii_case("en")))
            .or_else(|| self.titles.first())
            .map(|(_, t)| t.clone())
            .unwrap_or_default();

        let mut asset = CanonicalAsset::new(id.clone(), "EPO", source)
            .with_type(AssetType::Patent)
            .with_title(title);

        asset.publication_number = (!id.is_empty()).then(|| id.clone());
        asset.jurisdiction = self.country.clone();
        asset.application_number = self.application_number;
        asset.publication_date = self.publication_date.as_deref().and_then(parse_registry_date);
        asset.application_date = self.application_date.as_deref().and_then(parse_registry_date);
        asset.priority_date = self.priority_date.as_deref().and_then(parse_registry_date);
        asset.assignee = preferred_names(&self.applicants);
        asset.inventor = preferred_names(&self.inventors);
        asset.ipc_classification = (!self.ipc.is_empty()).then(|| {
            self.ipc
                .iter()
                .take(MAX_CLASSIFICATIONS)
                .map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "))
                .collect::<Vec<_>>()
                .join(", ")
        });
        asset.description =
            (!self.abstract_paragraphs.is_empty()).then(|| self.abstract_paragraphs.join(" "));
        asset.status = Some("Published".to_string());
        if !id.is_empty() {
            asset.url = Some(format!(
                "https://worldwide.espacenet.com/patent/search?q=pn%3D{}",
                id
            ));
        }

        asset
    }
}

/// Party names in epodoc format when present, otherwise all names
fn preferred_names(parties: &[(Option<String>, String)]) -> Option<String> {
    let epodoc: Vec<&str> = parties
        .iter()
        .filter(|(format, _)| format.as_deref() == Some("epodoc"))
        .map(|(_, name)| name.as_str())
        .collect();

    let names = if epodoc.is_empty() {
        parties.iter().map(|(_, name)| name.as_str()).collect()
    } else {
        epodoc
    };

    (!names.is_empty()).then(|| names.join(", "))
}

/// Parse the first `exchange-document` of a biblio response
fn parse_biblio(xml: &str) -> Result<Option<BiblioDraft>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut draft: Option<BiblioDraft> = None;
    let mut path: Vec<String> = Vec::new();
    let mut party_format: Option<String> = None;
    let mut title_lang: Option<String> = None;
    let mut in_first_abstract = false;
    let mut seen_abstract = false;
    let mut buffer = Vec::new();

    loop {
        match reader.read_event_into(&mut buffer).map_err(xml_error)? {
            Event::Start(ref e) => {
                let name = local_name(e);
                match name.as_str() {
                    "exchange-document" if draft.is_none() => {
                        draft = Some(BiblioDraft::default());
                    }
                    "applicant" | "inventor" => party_format = attribute(e, "data-format"),
                    "invention-title" => title_lang = attribute(e, "lang"),
                    "abstract" if !seen_abstract => {
                        seen_abstract = true;
                        in_first_abstract = true;
                    }
                    _ => {}
                }
                path.push(name);
            }
            Event::Text(ref e) => {
                if let Some(doc) = draft.as_mut() {
                    let text = e.unescape().map_err(xml_error)?.trim().to_string();
                    if !text.is_empty() {
                        let context = TextContext {
                            party_format: party_format.as_deref(),
                            title_lang: title_lang.as_deref(),
                            in_abstract: in_first_abstract,
                        };
                        doc.record(&path, text, context);
                    }
                }
            }
            Event::End(_) => match path.pop().as_deref() {
                Some("exchange-document") if draft.is_some() => break,
                Some("abstract") => in_first_abstract = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buffer.clear();
    }

    Ok(draft)
}

#[async_trait]
impl ProviderClient for Epo {
    fn name(&self) -> &str {
        "EPO"
    }

    fn about(&self) -> ProviderAbout {
        ProviderAbout::new()
            .website("https://ops.epo.org")
            .official_api(true)
            .credentials_required(true)
            .results_format("XML")
    }

    fn rate_limit_per_minute(&self) -> u32 {
        30
    }

    async fn search(&self, request: &SearchRequest) -> ProviderOutcome {
        let start = Instant::now();
        outcome_from(self.name(), start, self.run_search(request).await)
    }

    async fn get_details(&self, external_id: &str) -> Option<CanonicalAsset> {
        let result: Result<Option<CanonicalAsset>> = async {
            let token = self.ensure_token().await?;
            self.fetch_biblio(external_id, &token).await
        }
        .await;

        result.unwrap_or_else(|e| {
            warn!("EPO details for {} failed: {:#}", external_id, e);
            None
        })
    }

    async fn is_available(&self) -> bool {
        if self.consumer_key.is_none() {
            return false;
        }

        match self.ensure_token().await {
            Ok(_) => true,
            Err(e) => {
                warn!("EPO authentication failed: {:#}", e);
                false
            }
        }
    }
}
