use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::events::Event;
use regex::Regex;
use tracing::debug;

use crate::corpus::{CorpusSource, FetchError, HttpFetcher};
use crate::parser::block::RawArticle;
use crate::settings::CorpusSettings;

/// Articles listed in a paged posts sitemap (`posts.xml`, `posts-2.xml`, ...).
pub struct SitemapSource {
    http: HttpFetcher,
    sitemap_url: String,
    article_re: Regex,
}

impl SitemapSource {
    pub fn new(http: HttpFetcher, corpus: &CorpusSettings) -> Result<Self> {
        let article_re = Regex::new(&corpus.url_pattern)
            .with_context(|| format!("Invalid corpus.url_pattern {:?}", corpus.url_pattern))?;
        Ok(Self {
            http,
            sitemap_url: corpus.sitemap_url.clone(),
            article_re,
        })
    }

    /// Listing URL for `page`; pages after the first get a `-N` suffix before `.xml`.
    pub fn page_url(&self, page: usize) -> String {
        if page <= 1 {
            return self.sitemap_url.clone();
        }
        match self.sitemap_url.strip_suffix(".xml") {
            Some(stem) => format!("{}-{}.xml", stem, page),
            None => format!("{}-{}", self.sitemap_url, page),
        }
    }
}

#[async_trait]
impl CorpusSource for SitemapSource {
    async fn list_page(&self, page: usize) -> Result<Vec<String>, FetchError> {
        let xml = self.http.listing(&self.page_url(page), &[]).await?;
        let all = parse_urlset(&xml).map_err(|e| FetchError::Malformed(e.to_string()))?;
        let total = all.len();
        let articles: Vec<String> = all
            .into_iter()
            .filter(|u| self.article_re.is_match(u))
            .collect();
        debug!("Sitemap page {}: {} of {} URLs are articles", page, articles.len(), total);
        Ok(articles)
    }

    async fn fetch_document(&self, url: &str) -> Result<RawArticle, FetchError> {
        self.http.article(url).await
    }
}

/// Every `<url><loc>` in a urlset document.
pub fn parse_urlset(xml: &str) -> Result<Vec<String>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut urls = Vec::new();
    let mut in_url = false;
    let mut in_loc = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"url" => in_url = true,
                b"loc" if in_url => in_loc = true,
                _ => {}
            },
            Event::Text(e) if in_loc => {
                let loc = e.unescape()?;
                let loc = loc.trim();
                if !loc.is_empty() {
                    urls.push(loc.to_string());
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"loc" => in_loc = false,
                b"url" => in_url = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ArticleSettings;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://www.ctvc.co/deals-of-the-week-1/</loc><lastmod>2024-01-05</lastmod></url>
  <url>
    <loc>
      https://www.ctvc.co/another-issue/
    </loc>
  </url>
  <url><loc>https://www.ctvc.co/tag/newsletter/</loc></url>
</urlset>"#;

    fn source(url: &str) -> SitemapSource {
        let corpus = CorpusSettings {
            sitemap_url: url.to_string(),
            ..CorpusSettings::default()
        };
        let http = HttpFetcher::new(&corpus, &ArticleSettings::default()).unwrap();
        SitemapSource::new(http, &corpus).unwrap()
    }

    #[test]
    fn parses_locs() {
        let urls = parse_urlset(URLSET).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://www.ctvc.co/deals-of-the-week-1/",
                "https://www.ctvc.co/another-issue/",
                "https://www.ctvc.co/tag/newsletter/",
            ]
        );
    }

    #[test]
    fn broken_xml_is_an_error() {
        assert!(parse_urlset("<urlset><url><loc>x</url></urlset>").is_err());
    }

    #[test]
    fn page_urls() {
        let s = source("https://www.ctvc.co/sitemap-posts.xml");
        assert_eq!(s.page_url(1), "https://www.ctvc.co/sitemap-posts.xml");
        assert_eq!(s.page_url(3), "https://www.ctvc.co/sitemap-posts-3.xml");
        let s = source("https://example.com/posts");
        assert_eq!(s.page_url(2), "https://example.com/posts-2");
    }

    #[test]
    fn default_pattern_drops_tag_pages() {
        let s = source("https://www.ctvc.co/sitemap-posts.xml");
        let kept: Vec<_> = parse_urlset(URLSET)
            .unwrap()
            .into_iter()
            .filter(|u| s.article_re.is_match(u))
            .collect();
        assert_eq!(kept.len(), 2);
    }
}
