//! Sector Lookup Tables
//!
//! Built once at startup and handed to [`crate::ModelSelector`]. Nothing here
//! is mutated after construction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use valuation_core::ModelKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideEntry {
    pub model: ModelKind,
    pub rationale: String,
}

/// Keyword list for one model family, checked in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordSet {
    pub model: ModelKind,
    pub label: String,
    pub keywords: Vec<String>,
}

impl KeywordSet {
    /// First keyword contained in `text` (already lowercased).
    pub fn first_match(&self, text: &str) -> Option<&str> {
        self.keywords
            .iter()
            .map(String::as_str)
            .find(|kw| text.contains(kw))
    }
}

/// Override table plus keyword sets.
///
/// Override keys are lowercase and either a sector/industry name
/// (`"banks"`) or market-qualified (`"hk:real estate"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorTables {
    overrides: HashMap<String, OverrideEntry>,
    /// Checked in order; the first set with a hit wins
    keyword_sets: Vec<KeywordSet>,
}

pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl SectorTables {
    pub fn new(overrides: HashMap<String, OverrideEntry>, keyword_sets: Vec<KeywordSet>) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|(k, v)| (normalize_key(&k), v))
            .collect();
        let keyword_sets = keyword_sets
            .into_iter()
            .map(|set| KeywordSet {
                keywords: set.keywords.iter().map(|k| normalize_key(k)).collect(),
                ..set
            })
            .collect();
        Self { overrides, keyword_sets }
    }

    /// Load tables from JSON (same shape as the serialized struct).
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let parsed: SectorTables = serde_json::from_str(raw)?;
        Ok(Self::new(parsed.overrides, parsed.keyword_sets))
    }

    pub fn with_override(mut self, key: &str, model: ModelKind, rationale: &str) -> Self {
        self.overrides.insert(
            normalize_key(key),
            OverrideEntry {
                model,
                rationale: rationale.to_string(),
            },
        );
        self
    }

    pub fn lookup(&self, key: &str) -> Option<&OverrideEntry> {
        self.overrides.get(&normalize_key(key))
    }

    pub fn keyword_sets(&self) -> &[KeywordSet] {
        &self.keyword_sets
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }
}

impl Default for SectorTables {
    fn default() -> Self {
        let entries: [(&str, ModelKind, &str); 16] = [
            ("banks", ModelKind::Ddm, "Bank earnings are distributed as dividends; leverage is the product, so free cash flow is not meaningful"),
            ("financials", ModelKind::Ddm, "Financial companies are valued on distributable earnings"),
            ("financial services", ModelKind::Ddm, "Financial companies are valued on distributable earnings"),
            ("insurance", ModelKind::Ddm, "Insurers return float earnings through dividends"),
            ("real estate", ModelKind::Asset, "Property companies are valued on net asset value"),
            ("reit", ModelKind::Asset, "REITs are valued on net asset value"),
            ("utilities", ModelKind::Asset, "Regulated utilities earn on their asset base"),
            ("technology", ModelKind::Dcf, "Technology companies are valued on future free cash flow"),
            ("information technology", ModelKind::Dcf, "Technology companies are valued on future free cash flow"),
            ("communication services", ModelKind::Dcf, "Cash-generative media and telecom businesses"),
            ("healthcare", ModelKind::Dcf, "Healthcare businesses are valued on future free cash flow"),
            ("consumer discretionary", ModelKind::Dcf, "Consumer businesses are valued on future free cash flow"),
            ("consumer staples", ModelKind::Dcf, "Stable consumer cash flows suit a DCF"),
            ("cn:financials", ModelKind::Ddm, "A-share financials pay regulated dividends"),
            ("hk:real estate", ModelKind::Asset, "Hong Kong developers trade against net asset value"),
            ("hk:property", ModelKind::Asset, "Hong Kong developers trade against net asset value"),
        ];
        let overrides = entries
            .iter()
            .map(|(key, model, rationale)| {
                (
                    key.to_string(),
                    OverrideEntry {
                        model: *model,
                        rationale: rationale.to_string(),
                    },
                )
            })
            .collect();

        let keyword_sets = vec![
            KeywordSet {
                model: ModelKind::Ddm,
                label: "banking/financial".to_string(),
                keywords: words(&[
                    "bank", "financial", "insurance", "insurer", "capital markets",
                    "asset management", "brokerage", "credit services", "mortgage finance",
                ]),
            },
            KeywordSet {
                model: ModelKind::Asset,
                label: "asset-heavy/utility/REIT".to_string(),
                keywords: words(&[
                    "reit", "real estate", "property", "utility", "utilities", "pipeline",
                    "shipping", "mining", "steel", "infrastructure", "holding company",
                ]),
            },
            KeywordSet {
                model: ModelKind::Dcf,
                label: "cash-flow-generating".to_string(),
                keywords: words(&[
                    "software", "technology", "internet", "semiconductor", "health",
                    "pharmaceutical", "biotech", "consumer", "retail", "media", "services",
                    "industrial", "manufacturing", "telecom",
                ]),
            },
        ];

        Self::new(overrides, keyword_sets)
    }
}
