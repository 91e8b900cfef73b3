use crate::extract::{Investors, RawExtraction};
use crate::parser::amount::parse_amount;

/// A raw extraction with canonical types and no placeholder values left in it.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedDeal {
    pub company: String,
    pub amount: f64,
    pub stage: Option<String>,
    pub lead_investor: Option<String>,
    pub other_investors: Vec<String>,
    pub sector: Option<String>,
    pub region: Option<String>,
    pub confidence_score: f64,
}

/// Normalizes one extraction. `None` when no company survives cleaning.
pub fn clean_extraction(raw: RawExtraction) -> Option<CleanedDeal> {
    let company = present(raw.startup_name)?;

    let (lead_investor, mut others) = match raw.lead_investor {
        Some(Investors::One(name)) => (present(Some(name)), Vec::new()),
        Some(Investors::Many(names)) => {
            let mut names = names.into_iter().filter_map(present);
            let head = names.next();
            (head, names.collect())
        }
        None => (None, Vec::new()),
    };
    others.extend(investor_names(raw.other_investors));

    let confidence_score = raw
        .confidence_score
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(0.0);

    Some(CleanedDeal {
        company,
        amount: parse_amount(raw.amount_raised.as_ref()),
        stage: present(raw.funding_stage),
        lead_investor,
        other_investors: others,
        sector: present(raw.subsector),
        region: present(raw.region),
        confidence_score,
    })
}

fn investor_names(field: Option<Investors>) -> Vec<String> {
    match field {
        Some(Investors::One(name)) => present(Some(name)).into_iter().collect(),
        Some(Investors::Many(names)) => names.into_iter().filter_map(present).collect(),
        None => Vec::new(),
    }
}

/// Trimmed text, or `None` for blanks and `"null"` placeholders.
fn present(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") || trimmed.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::amount::AmountValue;

    fn raw() -> RawExtraction {
        RawExtraction {
            startup_name: Some("Acme".into()),
            amount_raised: Some(AmountValue::Text("$12.5m".into())),
            funding_stage: Some("Seed".into()),
            lead_investor: Some(Investors::One("Foo Capital".into())),
            other_investors: Some(Investors::Many(vec![Some("Bar".into())])),
            subsector: Some("Carbon Capture".into()),
            region: None,
            confidence_score: Some(0.9),
        }
    }

    #[test]
    fn plain_record() {
        let c = clean_extraction(raw()).unwrap();
        assert_eq!(c.company, "Acme");
        assert_eq!(c.amount, 12.5);
        assert_eq!(c.lead_investor.as_deref(), Some("Foo Capital"));
        assert_eq!(c.other_investors, vec!["Bar"]);
        assert_eq!(c.confidence_score, 0.9);
    }

    #[test]
    fn lead_list_tail_goes_first_in_others() {
        let r = RawExtraction {
            lead_investor: Some(Investors::Many(vec![
                Some("A".into()),
                Some("B".into()),
                Some("C".into()),
            ])),
            other_investors: Some(Investors::Many(vec![Some("D".into())])),
            ..raw()
        };
        let c = clean_extraction(r).unwrap();
        assert_eq!(c.lead_investor.as_deref(), Some("A"));
        assert_eq!(c.other_investors, vec!["B", "C", "D"]);
    }

    #[test]
    fn null_placeholders_are_pruned() {
        let r = RawExtraction {
            funding_stage: Some(" NULL ".into()),
            subsector: Some("".into()),
            lead_investor: Some(Investors::Many(vec![Some("null".into())])),
            other_investors: Some(Investors::Many(vec![None, Some("null".into()), Some("E".into())])),
            ..raw()
        };
        let c = clean_extraction(r).unwrap();
        assert_eq!(c.stage, None);
        assert_eq!(c.sector, None);
        assert_eq!(c.lead_investor, None);
        assert_eq!(c.other_investors, vec!["E"]);
    }

    #[test]
    fn company_is_required() {
        assert!(clean_extraction(RawExtraction { startup_name: None, ..raw() }).is_none());
        assert!(clean_extraction(RawExtraction { startup_name: Some("null".into()), ..raw() }).is_none());
        assert!(clean_extraction(RawExtraction::default()).is_none());
    }

    #[test]
    fn undisclosed_amount_and_bad_confidence() {
        let r = RawExtraction {
            amount_raised: Some(AmountValue::Text("Undisclosed".into())),
            confidence_score: Some(3.0),
            ..raw()
        };
        let c = clean_extraction(r).unwrap();
        assert_eq!(c.amount, 0.0);
        assert_eq!(c.confidence_score, 1.0);
        let c = clean_extraction(RawExtraction { confidence_score: None, ..raw() }).unwrap();
        assert_eq!(c.confidence_score, 0.0);
    }
}
