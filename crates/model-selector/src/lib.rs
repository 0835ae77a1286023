//! Valuation Model Selection
//!
//! Maps a sector/industry signal to a model family (DCF, dividend discount or
//! asset based). Lookups go override table first, then keyword sets, then the
//! DCF default. Output depends only on the input and the injected tables.

pub mod tables;

use serde::{Deserialize, Serialize};
use valuation_core::{ModelKind, Outcome, SectorSignal};

pub use tables::{KeywordSet, OverrideEntry, SectorTables};

pub const TABLE_CONFIDENCE: f64 = 0.9;
pub const KEYWORD_CONFIDENCE: f64 = 0.7;
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Which rule produced a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchSource {
    Override { key: String },
    Keyword { set: String, keyword: String },
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecommendation {
    pub model: ModelKind,
    pub rationale: String,
    pub confidence: f64,
    pub source: MatchSource,
}

impl ModelRecommendation {
    fn default_dcf(reason: &str) -> Self {
        Self {
            model: ModelKind::Dcf,
            rationale: reason.to_string(),
            confidence: DEFAULT_CONFIDENCE,
            source: MatchSource::Default,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    tables: SectorTables,
}

impl ModelSelector {
    pub fn new(tables: SectorTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &SectorTables {
        &self.tables
    }

    /// Override keys to try, most specific first.
    fn override_keys(signal: &SectorSignal) -> Vec<String> {
        let mut keys = Vec::with_capacity(3);
        if let Some(market) = signal.market.as_deref().filter(|m| !m.trim().is_empty()) {
            keys.push(format!("{}:{}", market.trim(), signal.sector_name.trim()));
        }
        for name in [&signal.sector_name, &signal.industry_name] {
            if !name.trim().is_empty() {
                keys.push(name.trim().to_string());
            }
        }
        keys
    }

    /// Classify, reporting explicitly when no usable signal was present.
    pub fn classify(&self, signal: &SectorSignal) -> Outcome<ModelRecommendation> {
        if signal.is_blank() {
            let reason = "No sector or industry signal; defaulting to DCF";
            tracing::debug!("{}", reason);
            return Outcome::Fallback(ModelRecommendation::default_dcf(reason), reason.to_string());
        }

        for key in Self::override_keys(signal) {
            if let Some(entry) = self.tables.lookup(&key) {
                return Outcome::Ok(ModelRecommendation {
                    model: entry.model,
                    rationale: entry.rationale.clone(),
                    confidence: TABLE_CONFIDENCE,
                    source: MatchSource::Override { key: tables::normalize_key(&key) },
                });
            }
        }

        let text = format!("{} {}", signal.sector_name, signal.industry_name).to_lowercase();
        for set in self.tables.keyword_sets() {
            if let Some(keyword) = set.first_match(&text) {
                return Outcome::Ok(ModelRecommendation {
                    model: set.model,
                    rationale: format!(
                        "Matched {} keyword '{}' in '{} / {}'",
                        set.label, keyword, signal.sector_name, signal.industry_name
                    ),
                    confidence: KEYWORD_CONFIDENCE,
                    source: MatchSource::Keyword {
                        set: set.label.clone(),
                        keyword: keyword.to_string(),
                    },
                });
            }
        }

        Outcome::Ok(ModelRecommendation::default_dcf(&format!(
            "No rule matched '{} / {}'; defaulting to DCF",
            signal.sector_name, signal.industry_name
        )))
    }

    /// `(model, rationale, confidence)` for a sector signal.
    pub fn recommend_model(&self, signal: &SectorSignal) -> ModelRecommendation {
        self.classify(signal).into_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(sector: &str, industry: &str) -> SectorSignal {
        SectorSignal {
            sector_name: sector.to_string(),
            industry_name: industry.to_string(),
            beta: 1.0,
            dividend_yield: 2.0,
            book_value: 20.0,
            price_to_book: 1.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_table_match_wins() {
        let selector = ModelSelector::default();
        let rec = selector.recommend_model(&signal("Banks", "Regional Banks"));
        assert_eq!(rec.model, ModelKind::Ddm);
        assert_eq!(rec.confidence, TABLE_CONFIDENCE);
        assert_eq!(rec.source, MatchSource::Override { key: "banks".to_string() });
    }

    #[test]
    fn test_market_specific_override_first() {
        let selector = ModelSelector::default();
        let mut s = signal("Property", "Developers");
        s.market = Some("HK".to_string());
        let rec = selector.recommend_model(&s);
        assert_eq!(rec.source, MatchSource::Override { key: "hk:property".to_string() });
        assert_eq!(rec.model, ModelKind::Asset);
    }

    #[test]
    fn test_keyword_match() {
        let selector = ModelSelector::default();
        let rec = selector.recommend_model(&signal("Consumer Cyclical", "Internet Retail"));
        assert_eq!(rec.model, ModelKind::Dcf);
        assert_eq!(rec.confidence, KEYWORD_CONFIDENCE);

        let rec = selector.recommend_model(&signal("Materials", "Steel"));
        assert_eq!(rec.model, ModelKind::Asset);

        let rec = selector.recommend_model(&signal("Diversified", "Mortgage Finance"));
        assert_eq!(rec.model, ModelKind::Ddm);
    }

    #[test]
    fn test_financial_keywords_checked_before_cash_flow() {
        let selector = ModelSelector::default();
        let rec = selector.recommend_model(&signal("Financial Technology", "Payments"));
        assert_eq!(rec.model, ModelKind::Ddm);
    }

    #[test]
    fn test_default_is_dcf_with_lowest_confidence() {
        let selector = ModelSelector::default();
        let rec = selector.recommend_model(&signal("Aerospace", "Defense"));
        assert_eq!(rec.model, ModelKind::Dcf);
        assert_eq!(rec.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(rec.source, MatchSource::Default);
        assert!(DEFAULT_CONFIDENCE < KEYWORD_CONFIDENCE && KEYWORD_CONFIDENCE < TABLE_CONFIDENCE);
    }

    #[test]
    fn test_blank_signal_is_explicit_fallback() {
        let selector = ModelSelector::default();
        let outcome = selector.classify(&signal("  ", ""));
        assert!(outcome.is_fallback());
        assert_eq!(outcome.value().model, ModelKind::Dcf);
    }

    #[test]
    fn test_deterministic() {
        let selector = ModelSelector::default();
        let s = signal("Energy", "Oil & Gas Midstream Pipeline");
        let first = selector.recommend_model(&s);
        for _ in 0..10 {
            assert_eq!(selector.recommend_model(&s), first);
        }
    }

    #[test]
    fn test_injected_tables() {
        let tables = SectorTables::default().with_override("aerospace", ModelKind::Asset, "fleet");
        let selector = ModelSelector::new(tables);
        assert_eq!(selector.recommend_model(&signal("Aerospace", "Defense")).model, ModelKind::Asset);
    }
}
