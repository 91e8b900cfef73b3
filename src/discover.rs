use std::collections::HashSet;

use tracing::{info, warn};

use crate::corpus::CorpusSource;
use crate::pace::Pacer;

/// Walks a corpus listing page by page and collects article URLs.
pub struct ArticleDiscoverer<'a, S: CorpusSource + ?Sized> {
    source: &'a S,
    page_delay_ms: u64,
}

impl<'a, S: CorpusSource + ?Sized> ArticleDiscoverer<'a, S> {
    pub fn new(source: &'a S, page_delay_ms: u64) -> Self {
        Self { source, page_delay_ms }
    }

    /// Up to `page_budget` pages of URLs, deduplicated in discovery order.
    /// A failing page ends discovery; whatever was collected so far is returned.
    pub async fn discover(&self, page_budget: usize) -> Vec<String> {
        let mut pacer = Pacer::from_millis(self.page_delay_ms);
        let mut seen = HashSet::new();
        let mut urls = Vec::new();

        for page in 1..=page_budget {
            pacer.wait().await;
            let listed = match self.source.list_page(page).await {
                Ok(listed) => listed,
                Err(e) => {
                    warn!("Listing page {} failed, stopping discovery: {}", page, e);
                    break;
                }
            };
            let before = urls.len();
            for url in listed {
                if seen.insert(url.clone()) {
                    urls.push(url);
                }
            }
            let added = urls.len() - before;
            info!("Page {}: {} new article URLs", page, added);
            if added == 0 {
                break;
            }
        }

        info!("Discovered {} article URLs", urls.len());
        urls
    }
}
