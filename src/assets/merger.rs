//! Merging of per-provider outcomes into one deduplicated asset list

use super::types::CanonicalAsset;
use crate::providers::ProviderOutcome;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, info};

/// Office label used in the composite key when a provider leaves it unset
pub const DEFAULT_PATENT_OFFICE: &str = "EPO";

/// A provider that was dispatched but failed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedSource {
    pub source: String,
    pub reason: String,
}

/// Union of all provider outcomes after deduplication
#[derive(Debug, Clone, Default)]
pub struct MergedAssets {
    /// Unique assets in order of first appearance
    pub assets: Vec<CanonicalAsset>,
    /// Labels of every provider whose outcome was merged
    pub sources: Vec<String>,
    /// Providers whose outcome carried a failure
    pub failures: Vec<FailedSource>,
}

impl MergedAssets {
    /// Comma-joined provenance label
    pub fn source_label(&self) -> String {
        self.sources.join(", ")
    }
}

/// Deduplicates assets by their `(external_id, patent_office)` identity
///
/// The first asset seen for a key wins; later duplicates are dropped without
/// any field-level reconciliation.
#[derive(Debug, Clone)]
pub struct ResultMerger {
    default_office: String,
}

impl Default for ResultMerger {
    fn default() -> Self {
        Self::new(DEFAULT_PATENT_OFFICE)
    }
}

impl ResultMerger {
    /// Create a merger with the office label to assume when none is given
    pub fn new(default_office: impl Into<String>) -> Self {
        Self {
            default_office: default_office.into(),
        }
    }

    /// Merge outcomes in the order given
    pub fn merge(&self, outcomes: Vec<ProviderOutcome>) -> MergedAssets {
        let mut merged = MergedAssets::default();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut seen_total = 0usize;

        for outcome in outcomes {
            if let Some(ref failure) = outcome.failure {
                merged.failures.push(FailedSource {
                    source: outcome.source.clone(),
                    reason: failure.to_string(),
                });
            }

            for (position, asset) in outcome.assets.into_iter().enumerate() {
                seen_total += 1;
                let key = self.composite_key(&asset, &outcome.source, position);
                if index.contains_key(&key) {
                    debug!("Dropping duplicate asset {} from {}", key, outcome.source);
                    continue;
                }
                index.insert(key, merged.assets.len());
                merged.assets.push(asset);
            }

            merged.sources.push(outcome.source);
        }

        info!(
            "Merged {} assets from {} sources into {} unique",
            seen_total,
            merged.sources.len(),
            merged.assets.len()
        );

        merged
    }

    /// Identity key of an asset, synthesizing an id when the provider gave none
    pub fn composite_key(&self, asset: &CanonicalAsset, source: &str, position: usize) -> String {
        let id = match asset.external_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => synthetic_id(source, position, asset),
        };
        let office = asset
            .patent_office
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or(&self.default_office);

        format!("{}_{}", id, office)
    }
}

/// Deterministic stand-in identifier for a record without one
///
/// Only meaningful within a single request; it is never persisted.
pub fn synthetic_id(source: &str, position: usize, asset: &CanonicalAsset) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(position.to_le_bytes());
    hasher.update(asset.title.as_bytes());
    if let Some(ref number) = asset.application_number {
        hasher.update(number.as_bytes());
    }

    let digest = format!("{:x}", hasher.finalize());
    format!("GEN-{}", &digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderFailure;
    use std::collections::HashSet;

    fn asset(id: &str, office: &str, title: &str) -> CanonicalAsset {
        CanonicalAsset::new(id, office, office).with_title(title)
    }

    #[test]
    fn test_first_seen_wins() {
        let merger = ResultMerger::default();
        let outcomes = vec![
            ProviderOutcome::success("A", vec![asset("US123", "USPTO", "From A")]),
            ProviderOutcome::success("B", vec![asset("US123", "USPTO", "From B")]),
            ProviderOutcome::failed("C", ProviderFailure::Network("refused".into())),
        ];

        let merged = merger.merge(outcomes);

        assert_eq!(merged.assets.len(), 1);
        assert_eq!(merged.assets[0].title, "From A");
        assert_eq!(merged.source_label(), "A, B, C");
        assert_eq!(merged.failures.len(), 1);
        assert_eq!(merged.failures[0].source, "C");
    }

    #[test]
    fn test_count_equals_distinct_keys() {
        let merger = ResultMerger::default();
        let outcomes = vec![
            ProviderOutcome::success(
                "USPTO",
                vec![
                    asset("1", "USPTO", "a"),
                    asset("2", "USPTO", "b"),
                    asset("1", "EPO", "c"),
                ],
            ),
            ProviderOutcome::success(
                "EPO",
                vec![asset("1", "EPO", "d"), asset("3", "EPO", "e")],
            ),
        ];

        let merged = merger.merge(outcomes);
        let keys: HashSet<_> = merged
            .assets
            .iter()
            .map(|a| (a.external_id.clone(), a.patent_office.clone()))
            .collect();

        assert_eq!(merged.assets.len(), 4);
        assert_eq!(keys.len(), merged.assets.len());
    }

    #[test]
    fn test_failed_provider_removes_nothing() {
        let merger = ResultMerger::default();
        let q = ProviderOutcome::success("Q", vec![asset("1", "USPTO", "q")]);
        let r = ProviderOutcome::success("R", vec![asset("2", "EPO", "r")]);
        let p = ProviderOutcome::failed("P", ProviderFailure::Timeout);

        let with_failure = merger.merge(vec![q.clone(), p, r.clone()]);
        let without = merger.merge(vec![q, r]);

        let ids = |m: &MergedAssets| -> HashSet<Option<String>> {
            m.assets.iter().map(|a| a.external_id.clone()).collect()
        };
        assert_eq!(ids(&with_failure), ids(&without));
    }

    #[test]
    fn test_missing_office_uses_default() {
        let merger = ResultMerger::default();
        let mut unlabelled = asset("42", "EPO", "x");
        unlabelled.patent_office = None;

        let merged = merger.merge(vec![ProviderOutcome::success(
            "EPO",
            vec![unlabelled, asset("42", "EPO", "y")],
        )]);

        assert_eq!(merged.assets.len(), 1);
        assert_eq!(merged.assets[0].title, "x");
    }

    #[test]
    fn test_records_without_id_are_kept_apart() {
        let merger = ResultMerger::default();
        let first = CanonicalAsset::new("", "TMVIEW", "TMVIEW").with_title("Mark");
        let second = CanonicalAsset::new("", "TMVIEW", "TMVIEW").with_title("Mark");

        let merged = merger.merge(vec![ProviderOutcome::success(
            "TMVIEW",
            vec![first.clone(), second],
        )]);
        assert_eq!(merged.assets.len(), 2);

        // Same input yields the same synthesized key
        assert_eq!(
            merger.composite_key(&first, "TMVIEW", 0),
            merger.composite_key(&first, "TMVIEW", 0)
        );
        assert!(merger.composite_key(&first, "TMVIEW", 0).starts_with("GEN-"));
    }
}
