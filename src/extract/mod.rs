pub mod llm;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::parser::amount::AmountValue;

pub use llm::LlmExtractor;

/// Best-effort structured guess for one fragment. Any field may be missing or wrong.
///
/// Decodes only from a JSON object. Where a reply carries both a canonical key and its
/// shorthand (`startup_name` and `company`), the canonical key wins.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct RawExtraction {
    pub startup_name: Option<String>,
    pub amount_raised: Option<AmountValue>,
    pub funding_stage: Option<String>,
    pub lead_investor: Option<Investors>,
    pub other_investors: Option<Investors>,
    pub subsector: Option<String>,
    pub region: Option<String>,
    pub confidence_score: Option<f64>,
}

/// Reply keys as the model writes them, shorthands included.
#[derive(Deserialize)]
struct ReplyFields {
    #[serde(default, deserialize_with = "loose_text")]
    startup_name: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    company: Option<String>,
    #[serde(default, deserialize_with = "loose_amount")]
    amount_raised: Option<AmountValue>,
    #[serde(default, deserialize_with = "loose_text")]
    funding_stage: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    stage: Option<String>,
    #[serde(default, deserialize_with = "loose_investors")]
    lead_investor: Option<Investors>,
    #[serde(default, deserialize_with = "loose_investors")]
    lead_investors: Option<Investors>,
    #[serde(default, deserialize_with = "loose_investors")]
    other_investors: Option<Investors>,
    #[serde(default, deserialize_with = "loose_investors")]
    investors: Option<Investors>,
    #[serde(default, deserialize_with = "loose_text")]
    subsector: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    sector: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    region: Option<String>,
    #[serde(default, deserialize_with = "loose_number")]
    confidence_score: Option<f64>,
}

impl TryFrom<Map<String, Value>> for RawExtraction {
    type Error = serde_json::Error;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let f: ReplyFields = serde_json::from_value(Value::Object(map))?;
        Ok(Self {
            startup_name: f.startup_name.or(f.company),
            amount_raised: f.amount_raised,
            funding_stage: f.funding_stage.or(f.stage),
            lead_investor: f.lead_investor.or(f.lead_investors),
            other_investors: f.other_investors.or(f.investors),
            subsector: f.subsector.or(f.sector),
            region: f.region,
            confidence_score: f.confidence_score,
        })
    }
}

/// An investor field the model filled with either a name or a list of names.
#[derive(Debug, Clone, PartialEq)]
pub enum Investors {
    One(String),
    Many(Vec<Option<String>>),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extraction request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("extraction service returned HTTP {0}")]
    Status(u16),
    #[error("extraction reply had no content")]
    EmptyReply,
    #[error("extraction reply is not a deal object: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

/// The external text-understanding service, one fragment per call.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, fragment: &str) -> Result<RawExtraction, ExtractError>;
}

/// Cheap pre-filter: only fragments that talk about money reach the extractor.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// An empty keyword list admits everything.
    pub fn matches(&self, fragment: &str) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let lower = fragment.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

// ── Lenient field decoding ──

fn value_text(v: Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn loose_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(value_text(Value::deserialize(d)?))
}

fn loose_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn loose_amount<'de, D: Deserializer<'de>>(d: D) -> Result<Option<AmountValue>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64().map(AmountValue::Number),
        Value::String(s) => Some(AmountValue::Text(s)),
        _ => None,
    })
}

fn loose_investors<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Investors>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => Some(Investors::Many(items.into_iter().map(value_text).collect())),
        other => value_text(other).map(Investors::One),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> RawExtraction {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn canonical_shape() {
        let raw = parse(
            r#"{"startup_name": "AIR", "amount_raised": "$23m", "funding_stage": "Series A",
                "lead_investor": "Entrée Capital", "other_investors": [], "subsector": "Mobility"}"#,
        );
        assert_eq!(raw.startup_name.as_deref(), Some("AIR"));
        assert_eq!(raw.amount_raised, Some(AmountValue::Text("$23m".into())));
        assert_eq!(raw.lead_investor, Some(Investors::One("Entrée Capital".into())));
        assert_eq!(raw.other_investors, Some(Investors::Many(vec![])));
        assert_eq!(raw.subsector.as_deref(), Some("Mobility"));
        assert_eq!(raw.confidence_score, None);
    }

    #[test]
    fn aliases_and_loose_types() {
        let raw = parse(
            r#"{"company": "Volt", "amount_raised": 12.5, "stage": "Seed",
                "lead_investors": ["A", null, "B"], "investors": "C",
                "sector": "Energy", "confidence_score": "0.7"}"#,
        );
        assert_eq!(raw.startup_name.as_deref(), Some("Volt"));
        assert_eq!(raw.amount_raised, Some(AmountValue::Number(12.5)));
        assert_eq!(raw.funding_stage.as_deref(), Some("Seed"));
        assert_eq!(
            raw.lead_investor,
            Some(Investors::Many(vec![Some("A".into()), None, Some("B".into())]))
        );
        assert_eq!(raw.other_investors, Some(Investors::One("C".into())));
        assert_eq!(raw.confidence_score, Some(0.7));
    }

    #[test]
    fn canonical_key_wins_over_shorthand() {
        let raw = parse(
            r#"{"startup_name": "GridCo", "company": "Grid Company Inc", "stage": "Seed",
                "funding_stage": "Series A", "lead_investor": "A", "lead_investors": ["B"],
                "other_investors": [], "investors": "C", "subsector": "Energy", "sector": "Climate"}"#,
        );
        assert_eq!(raw.startup_name.as_deref(), Some("GridCo"));
        assert_eq!(raw.funding_stage.as_deref(), Some("Series A"));
        assert_eq!(raw.lead_investor, Some(Investors::One("A".into())));
        assert_eq!(raw.other_investors, Some(Investors::Many(vec![])));
        assert_eq!(raw.subsector.as_deref(), Some("Energy"));
    }

    #[test]
    fn null_canonical_key_falls_back_to_shorthand() {
        let raw = parse(r#"{"startup_name": null, "company": "Volt"}"#);
        assert_eq!(raw.startup_name.as_deref(), Some("Volt"));
    }

    #[test]
    fn nulls_and_missing_fields() {
        let raw = parse(r#"{"startup_name": null, "amount_raised": null, "region": {"x": 1}}"#);
        assert_eq!(raw, RawExtraction::default());
    }

    #[test]
    fn non_object_is_an_error() {
        assert!(serde_json::from_str::<RawExtraction>("[1, 2]").is_err());
        assert!(serde_json::from_str::<RawExtraction>("not json").is_err());
    }

    #[test]
    fn keyword_filter() {
        let f = KeywordFilter::new(&["raised".into(), "Funding".into()]);
        assert!(f.matches("🌱 Acme RAISED $5m"));
        assert!(f.matches("⚡ Volt closed a funding round"));
        assert!(!f.matches("🚪 Acme was acquired by Beta"));
        assert!(KeywordFilter::new(&[]).matches("anything"));
    }
}
