#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use deal_scraper::corpus::{CorpusSource, FetchError};
use deal_scraper::extract::{ExtractError, Extractor, Investors, RawExtraction};
use deal_scraper::parser::amount::AmountValue;
use deal_scraper::parser::block::RawArticle;
use deal_scraper::settings::Settings;

/// Newsletter issue with a deals section followed by a news section.
pub fn issue_html(published: &str, deals: &[&str]) -> String {
    let items: String = deals.iter().map(|d| format!("<p>{}</p>\n", d)).collect();
    format!(
        r#"<html><head><meta property="article:published_time" content="{published}"></head>
<body><div class="gh-content prose">
<p>Welcome back.</p>
<h2>💸 Deals of the Week</h2>
{items}<h2>📰 In the News</h2>
<p>🌍 Someone raised $999m but this is news.</p>
</div></body></html>"#
    )
}

/// In-memory corpus: listing pages of URLs and the html behind each URL.
pub struct FakeCorpus {
    pub pages: Vec<Vec<String>>,
    pub articles: HashMap<String, Result<String, u16>>,
    pub listings: AtomicUsize,
    pub fetches: AtomicUsize,
}

impl FakeCorpus {
    pub fn new(pages: Vec<Vec<&str>>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|p| p.into_iter().map(String::from).collect())
                .collect(),
            articles: HashMap::new(),
            listings: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn article(mut self, url: &str, html: String) -> Self {
        self.articles.insert(url.to_string(), Ok(html));
        self
    }

    pub fn broken(mut self, url: &str, status: u16) -> Self {
        self.articles.insert(url.to_string(), Err(status));
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CorpusSource for FakeCorpus {
    async fn list_page(&self, page: usize) -> Result<Vec<String>, FetchError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.get(page - 1).cloned().unwrap_or_default())
    }

    async fn fetch_document(&self, url: &str) -> Result<RawArticle, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.articles.get(url) {
            Some(Ok(html)) => Ok(RawArticle {
                url: url.to_string(),
                html: html.clone(),
                fetched_at: Utc::now(),
            }),
            Some(Err(status)) => Err(FetchError::Status { url: url.to_string(), status: *status }),
            None => Err(FetchError::Status { url: url.to_string(), status: 404 }),
        }
    }
}

/// Answers by looking up the first known company name mentioned in the fragment.
/// Unknown fragments yield an empty object; a `None` reply simulates a failed call.
pub struct FakeExtractor {
    replies: Vec<(String, Option<RawExtraction>)>,
    pub calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self { replies: Vec::new(), calls: AtomicUsize::new(0) }
    }

    pub fn deal(mut self, company: &str, amount: &str, stage: &str, lead: &str, sector: &str) -> Self {
        let raw = RawExtraction {
            startup_name: Some(company.to_string()),
            amount_raised: Some(AmountValue::Text(amount.to_string())),
            funding_stage: Some(stage.to_string()),
            lead_investor: Some(Investors::One(lead.to_string())),
            other_investors: Some(Investors::Many(vec![])),
            subsector: Some(sector.to_string()),
            region: None,
            confidence_score: Some(0.8),
        };
        self.replies.push((company.to_string(), Some(raw)));
        self
    }

    pub fn failing(mut self, company: &str) -> Self {
        self.replies.push((company.to_string(), None));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(&self, fragment: &str) -> Result<RawExtraction, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.iter().find(|(name, _)| fragment.contains(name.as_str())) {
            Some((_, Some(raw))) => Ok(raw.clone()),
            Some((_, None)) => Err(ExtractError::EmptyReply),
            None => Ok(RawExtraction::default()),
        }
    }
}

/// Settings with no delays, pointing state files into `dir`.
pub fn test_settings(dir: &std::path::Path) -> Settings {
    let mut s = Settings::default();
    s.paths.data_dir = dir.to_path_buf();
    s.corpus.page_delay_ms = 0;
    s.extraction.delay_ms = 0;
    s
}
