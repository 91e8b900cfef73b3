use std::fmt;
use std::sync::LazyLock;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use scraper::{ElementRef, Html, Selector};

static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").unwrap());
static PUBLISHED_META_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="article:published_time"]"#).unwrap());
static TIME_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("time[datetime]").unwrap());

/// A fetched article, alive only until its deal block has been located.
#[derive(Debug, Clone)]
pub struct RawArticle {
    pub url: String,
    pub html: String,
    pub fetched_at: DateTime<Utc>,
}

/// The itemized-deals part of one article.
#[derive(Debug, Clone, PartialEq)]
pub struct DealBlock {
    pub url: String,
    pub text: String,
    pub published: Option<NaiveDate>,
    pub fetched_at: DateTime<Utc>,
}

impl DealBlock {
    /// Publication date when the article states one, otherwise the day it was fetched.
    pub fn date(&self) -> NaiveDate {
        self.published.unwrap_or_else(|| self.fetched_at.date_naive())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    Fetch(String),
    NoStartHeading,
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFound::Fetch(e) => write!(f, "fetch failed: {}", e),
            NotFound::NoStartHeading => write!(f, "no deals heading"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockLookup {
    Found(DealBlock),
    NotFound(NotFound),
}

/// Heading phrases and container that bound a deal block.
#[derive(Debug, Clone)]
pub struct BlockRules {
    start_phrase: String,
    stop_phrases: Vec<String>,
    content: Option<Selector>,
}

impl BlockRules {
    pub fn new(start_phrase: &str, stop_phrases: &[String], content_selector: Option<&str>) -> Result<Self> {
        let content = content_selector
            .filter(|s| !s.trim().is_empty())
            .map(|s| Selector::parse(s).map_err(|e| anyhow!("invalid content selector {:?}: {:?}", s, e)))
            .transpose()?;
        Ok(Self {
            start_phrase: start_phrase.trim().to_lowercase(),
            stop_phrases: stop_phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            content,
        })
    }

    fn is_start(&self, heading_text: &str) -> bool {
        !self.start_phrase.is_empty() && heading_text.to_lowercase().contains(&self.start_phrase)
    }

    fn is_stop(&self, heading_text: &str) -> bool {
        let lower = heading_text.to_lowercase();
        self.stop_phrases.iter().any(|p| lower.contains(p))
    }
}

/// Cut the deal block out of an article: everything after the start heading up to
/// the first sibling heading that names a stop phrase.
pub fn find_deal_block(article: &RawArticle, rules: &BlockRules) -> BlockLookup {
    let doc = Html::parse_document(&article.html);

    // Fall back to the whole page when the theme's content container is missing
    let root = rules
        .content
        .as_ref()
        .and_then(|sel| doc.select(sel).next())
        .unwrap_or_else(|| doc.root_element());

    let Some(start) = root
        .select(&HEADING_SEL)
        .find(|h| rules.is_start(&element_text(h)))
    else {
        return BlockLookup::NotFound(NotFound::NoStartHeading);
    };

    let mut parts = Vec::new();
    for sibling in start.next_siblings().filter_map(ElementRef::wrap) {
        let text = element_text(&sibling);
        if is_heading(&sibling) && rules.is_stop(&text) {
            break;
        }
        if !text.is_empty() {
            parts.push(text);
        }
    }

    BlockLookup::Found(DealBlock {
        url: article.url.clone(),
        text: parts.join("\n"),
        published: published_date(&doc),
        fetched_at: article.fetched_at,
    })
}

fn element_text(el: &ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_heading(el: &ElementRef) -> bool {
    matches!(el.value().name(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

fn published_date(doc: &Html) -> Option<NaiveDate> {
    let meta = doc
        .select(&PUBLISHED_META_SEL)
        .find_map(|m| m.value().attr("content"));
    let time = || doc.select(&TIME_SEL).find_map(|t| t.value().attr("datetime"));
    meta.and_then(parse_date).or_else(|| time().and_then(parse_date))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| s.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}
