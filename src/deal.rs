use chrono::NaiveDate;
use serde::Serialize;

use crate::clean::CleanedDeal;
use crate::validate::DealValidator;

/// A stored funding announcement. Amounts are in millions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedDeal {
    pub company: String,
    pub amount: f64,
    pub stage: String,
    pub lead_investor: String,
    pub other_investors: Vec<String>,
    pub sector: String,
    pub region: Option<String>,
    pub date: Option<NaiveDate>,
    pub source_url: String,
    pub source: String,
    pub confidence_score: f64,
    pub is_target_deal: bool,
}

/// Where a batch of deals came from.
#[derive(Debug, Clone)]
pub struct DealOrigin {
    pub source_url: String,
    pub source: String,
    pub date: Option<NaiveDate>,
}

/// Two records with equal keys are the same deal for storage purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DealKey {
    company: String,
    amount_bits: u64,
    stage: String,
}

impl NormalizedDeal {
    pub fn from_cleaned(cleaned: CleanedDeal, origin: &DealOrigin, validator: &DealValidator) -> Self {
        let stage = cleaned.stage.unwrap_or_default();
        let sector = cleaned.sector.unwrap_or_default();
        let is_target_deal = validator.is_target(&sector, &stage, cleaned.amount);
        Self {
            company: cleaned.company,
            amount: cleaned.amount,
            stage,
            lead_investor: cleaned.lead_investor.unwrap_or_default(),
            other_investors: cleaned.other_investors,
            sector,
            region: cleaned.region,
            date: origin.date,
            source_url: origin.source_url.clone(),
            source: origin.source.clone(),
            confidence_score: cleaned.confidence_score,
            is_target_deal,
        }
    }

    pub fn dedup_key(&self) -> DealKey {
        // -0.0 and 0.0 must collide
        let amount = if self.amount == 0.0 { 0.0 } else { self.amount };
        DealKey {
            company: self.company.trim().to_lowercase(),
            amount_bits: amount.to_bits(),
            stage: self.stage.trim().to_lowercase(),
        }
    }

    /// One-line description, e.g. `Acme: $5.0M Seed led by Foo (Carbon Capture)`.
    pub fn summary(&self) -> String {
        let stage = if self.stage.is_empty() { "round" } else { &self.stage };
        let mut s = format!("{}: ${:.1}M {}", self.company, self.amount, stage);
        if !self.lead_investor.is_empty() {
            s.push_str(&format!(" led by {}", self.lead_investor));
        }
        if !self.sector.is_empty() {
            s.push_str(&format!(" ({})", self.sector));
        }
        s
    }
}
