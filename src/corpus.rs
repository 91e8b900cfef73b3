use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::parser::block::RawArticle;
use crate::settings::{ArticleSettings, CorpusKind, CorpusSettings, Settings};
use crate::sitemap::SitemapSource;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("unreadable listing: {0}")]
    Malformed(String),
}

/// A paged corpus of newsletter articles.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    /// Article URLs on listing page `page` (1-based), in listing order.
    async fn list_page(&self, page: usize) -> Result<Vec<String>, FetchError>;

    async fn fetch_document(&self, url: &str) -> Result<RawArticle, FetchError>;
}

/// Shared HTTP plumbing for corpus sources: browser-like user agent, per-request timeouts.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    list_timeout: Duration,
    article_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(corpus: &CorpusSettings, article: &ArticleSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(corpus.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            list_timeout: Duration::from_secs(corpus.list_timeout_secs),
            article_timeout: Duration::from_secs(article.timeout_secs),
        })
    }

    async fn get_text(&self, url: &str, query: &[(&str, String)], timeout: Duration) -> Result<String, FetchError> {
        let resp = self.client.get(url).query(query).timeout(timeout).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp.text().await?)
    }

    pub async fn listing(&self, url: &str, query: &[(&str, String)]) -> Result<String, FetchError> {
        debug!("Listing {}", url);
        self.get_text(url, query, self.list_timeout).await
    }

    pub async fn article(&self, url: &str) -> Result<RawArticle, FetchError> {
        let html = self.get_text(url, &[], self.article_timeout).await?;
        Ok(RawArticle {
            url: url.to_string(),
            html,
            fetched_at: Utc::now(),
        })
    }
}

/// The listing source selected by `corpus.kind`.
pub fn open_source(settings: &Settings) -> Result<Box<dyn CorpusSource>> {
    let http = HttpFetcher::new(&settings.corpus, &settings.article)?;
    Ok(match settings.corpus.kind {
        CorpusKind::GhostApi => Box::new(GhostApiSource::new(http, &settings.corpus)?),
        CorpusKind::Sitemap => Box::new(SitemapSource::new(http, &settings.corpus)?),
    })
}

// ── Ghost content API ──

#[derive(Deserialize)]
struct GhostPage {
    #[serde(default)]
    posts: Vec<GhostPost>,
}

#[derive(Deserialize)]
struct GhostPost {
    url: Option<String>,
}

/// Newsletter posts listed through a Ghost content API endpoint.
pub struct GhostApiSource {
    http: HttpFetcher,
    api_url: String,
    api_key: String,
    filter: String,
    page_size: usize,
}

impl GhostApiSource {
    pub fn new(http: HttpFetcher, corpus: &CorpusSettings) -> Result<Self> {
        if corpus.api_key.trim().is_empty() {
            bail!("corpus.api_key is empty; set it in deals.toml or DEALS_CORPUS__API_KEY, or use the sitemap corpus");
        }
        Ok(Self {
            http,
            api_url: corpus.api_url.clone(),
            api_key: corpus.api_key.clone(),
            filter: corpus.filter.clone(),
            page_size: corpus.page_size,
        })
    }
}

#[async_trait]
impl CorpusSource for GhostApiSource {
    async fn list_page(&self, page: usize) -> Result<Vec<String>, FetchError> {
        let query = [
            ("key", self.api_key.clone()),
            ("filter", self.filter.clone()),
            ("limit", self.page_size.to_string()),
            ("fields", "url".to_string()),
            ("page", page.to_string()),
        ];
        let body = self.http.listing(&self.api_url, &query).await?;
        let parsed: GhostPage =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;
        Ok(parsed.posts.into_iter().filter_map(|p| p.url).collect())
    }

    async fn fetch_document(&self, url: &str) -> Result<RawArticle, FetchError> {
        self.http.article(url).await
    }
}
