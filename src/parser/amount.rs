use std::sync::LazyLock;

use regex::Regex;

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?|\.\d+").unwrap());
static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(billion|bn|b|million|mm|mn|m|thousand|k)\b").unwrap()
});

// Upper bound of a range such as `1.5-2bn` or `500 to 750k`; the unit sits after it.
static RANGE_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:-|\x{2013}|\x{2014}|to)\s*(?:\d+(?:\.\d+)?|\.\d+)").unwrap()
});

/// Plain figures at or above this with no unit are whole currency units, not millions.
const RAW_UNITS_THRESHOLD: f64 = 10_000.0;

/// An amount as the extraction service hands it back: a bare number or free text.
#[derive(Debug, Clone, PartialEq)]
pub enum AmountValue {
    Number(f64),
    Text(String),
}

/// Canonical amount in millions. Absent, undisclosed or unreadable amounts are `0.0`.
pub fn parse_amount(raw: Option<&AmountValue>) -> f64 {
    match raw {
        None => 0.0,
        Some(AmountValue::Number(n)) if n.is_finite() && *n >= 0.0 => *n,
        Some(AmountValue::Number(_)) => 0.0,
        Some(AmountValue::Text(s)) => parse_amount_text(s),
    }
}

/// Parse strings like `$12.5m`, `€2 billion`, `£750k` or `USD 3,000,000` into millions.
pub fn parse_amount_text(raw: &str) -> f64 {
    let lower = raw.trim().to_lowercase();
    if lower.contains("undisclosed") {
        return 0.0;
    }

    let cleaned: String = lower
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | ','))
        .collect();

    let Some(number) = NUMBER_RE.find(&cleaned) else {
        return 0.0;
    };
    let Ok(value) = number.as_str().parse::<f64>() else {
        return 0.0;
    };

    let rest = &cleaned[number.end()..];
    let unit = UNIT_RE.captures(rest).or_else(|| {
        let upper = RANGE_END_RE.find(rest)?;
        UNIT_RE.captures(&rest[upper.end()..])
    });
    let unit = unit.map(|c| c[1].to_string());

    let millions = match unit.as_deref() {
        Some("billion" | "bn" | "b") => value * 1000.0,
        Some("million" | "mm" | "mn" | "m") => value,
        Some("thousand" | "k") => value / 1000.0,
        _ if value >= RAW_UNITS_THRESHOLD => value / 1_000_000.0,
        _ => value,
    };

    if millions.is_finite() && millions >= 0.0 {
        millions
    } else {
        0.0
    }
}
