use std::fmt;

use serde::{Deserialize, Serialize};

use crate::deal::NormalizedDeal;

/// Investment profile a deal is measured against. Amounts are in millions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Criteria {
    pub target_sectors: Vec<String>,
    pub target_stages: Vec<String>,
    pub min_amount: f64,
    pub max_amount: f64,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            target_sectors: vec!["Grid Modernization".into(), "Carbon Capture".into()],
            target_stages: vec!["Seed".into(), "Series A".into()],
            min_amount: 0.5,
            max_amount: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    MissingCompany,
    MissingLeadInvestor,
    SectorNotTargeted(String),
    StageNotTargeted(String),
    AmountOutOfRange(f64),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingCompany => write!(f, "missing company"),
            Violation::MissingLeadInvestor => write!(f, "missing lead investor"),
            Violation::SectorNotTargeted(s) => write!(f, "sector {:?} not targeted", s),
            Violation::StageNotTargeted(s) => write!(f, "stage {:?} not targeted", s),
            Violation::AmountOutOfRange(a) => write!(f, "amount {}m out of range", a),
        }
    }
}

/// Classifies deals against [`Criteria`]. Never touches the deal itself.
#[derive(Debug, Clone)]
pub struct DealValidator {
    criteria: Criteria,
}

impl DealValidator {
    pub fn new(criteria: Criteria) -> Self {
        Self { criteria }
    }

    pub fn sector_targeted(&self, sector: &str) -> bool {
        listed(&self.criteria.target_sectors, sector)
    }

    pub fn stage_targeted(&self, stage: &str) -> bool {
        listed(&self.criteria.target_stages, stage)
    }

    /// The stored `is_target_deal` flag: targeted sector and stage with a disclosed amount.
    pub fn is_target(&self, sector: &str, stage: &str, amount: f64) -> bool {
        self.sector_targeted(sector) && self.stage_targeted(stage) && amount > 0.0
    }

    /// Every criterion the deal fails, in a fixed order.
    pub fn violations(&self, deal: &NormalizedDeal) -> Vec<Violation> {
        let mut out = Vec::new();
        if deal.company.trim().is_empty() {
            out.push(Violation::MissingCompany);
        }
        if !self.sector_targeted(&deal.sector) {
            out.push(Violation::SectorNotTargeted(deal.sector.clone()));
        }
        if !self.stage_targeted(&deal.stage) {
            out.push(Violation::StageNotTargeted(deal.stage.clone()));
        }
        if !(self.criteria.min_amount..=self.criteria.max_amount).contains(&deal.amount) {
            out.push(Violation::AmountOutOfRange(deal.amount));
        }
        if deal.lead_investor.trim().is_empty() {
            out.push(Violation::MissingLeadInvestor);
        }
        out
    }

    pub fn validate(&self, deal: &NormalizedDeal) -> bool {
        self.violations(deal).is_empty()
    }

    /// Gate applied before storage when only criteria-passing deals are kept.
    pub fn meets_criteria(&self, deal: &NormalizedDeal) -> bool {
        self.validate(deal)
    }
}

fn listed(allowed: &[String], value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && allowed.iter().any(|a| a.trim().eq_ignore_ascii_case(value))
}
