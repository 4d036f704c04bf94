//! Canonical asset definitions

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A patent or trademark record in the unified representation
///
/// Identity across all providers is the `(external_id, patent_office)` pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalAsset {
    /// Registry-assigned identifier (publication or registration number)
    pub external_id: Option<String>,
    /// Office or source that owns the identifier
    pub patent_office: Option<String>,
    /// Title or mark name
    pub title: String,
    /// Abstract or description
    pub description: Option<String>,
    /// Kind of IP right
    pub asset_type: AssetType,
    pub application_number: Option<String>,
    pub publication_number: Option<String>,
    /// Country or region code
    pub jurisdiction: Option<String>,
    /// Comma-separated inventor names
    pub inventor: Option<String>,
    /// Applicant / owner
    pub assignee: Option<String>,
    pub priority_date: Option<NaiveDate>,
    pub application_date: Option<NaiveDate>,
    pub publication_date: Option<NaiveDate>,
    pub grant_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub ipc_classification: Option<String>,
    pub cpc_classification: Option<String>,
    pub status: Option<String>,
    pub legal_status: Option<String>,
    pub keywords: Option<String>,
    /// Link to the record at the source registry
    pub url: Option<String>,
    /// Label of the provider that produced this record
    pub data_source: String,
    /// Set by the repository on upsert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CanonicalAsset {
    /// Create an asset with its identity and provenance
    pub fn new(
        external_id: impl Into<String>,
        patent_office: impl Into<String>,
        data_source: impl Into<String>,
    ) -> Self {
        let external_id = external_id.into();
        Self {
            external_id: (!external_id.trim().is_empty()).then_some(external_id),
            patent_office: Some(patent_office.into()),
            data_source: data_source.into(),
            ..Default::default()
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the assignee
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Set the inventor
    pub fn with_inventor(mut self, inventor: impl Into<String>) -> Self {
        self.inventor = Some(inventor.into());
        self
    }

    /// Set the publication date
    pub fn with_publication_date(mut self, date: NaiveDate) -> Self {
        self.publication_date = Some(date);
        self
    }

    /// Set the asset type
    pub fn with_type(mut self, asset_type: AssetType) -> Self {
        self.asset_type = asset_type;
        self
    }

    /// Whether the asset carries a stable identifier and may be persisted
    pub fn is_persistable(&self) -> bool {
        self.external_id
            .as_deref()
            .map(|id| !id.trim().is_empty())
            .unwrap_or(false)
    }

    /// Copy the mutable bibliographic fields of a fresher record into this one
    pub fn refresh_from(&mut self, other: &CanonicalAsset) {
        self.title = other.title.clone();
        self.description = other.description.clone();
        self.status = other.status.clone();
        self.inventor = other.inventor.clone();
        self.assignee = other.assignee.clone();
        self.keywords = other.keywords.clone();
        self.legal_status = other.legal_status.clone();
    }
}

/// Kind of intellectual-property right
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    #[default]
    Patent,
    Trademark,
    Design,
    UtilityModel,
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Patent => write!(f, "PATENT"),
            Self::Trademark => write!(f, "TRADEMARK"),
            Self::Design => write!(f, "DESIGN"),
            Self::UtilityModel => write!(f, "UTILITY_MODEL"),
        }
    }
}

/// Parse the date formats registries commonly emit (`YYYY-MM-DD`, `YYYYMMDD`, `DD/MM/YYYY`)
pub fn parse_registry_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "0" {
        return None;
    }

    // Strip a time component if present
    let date_part = raw.split(['T', ' ']).next().unwrap_or(raw);

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%Y%m%d"))
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%d/%m/%Y"))
        .ok()
}
