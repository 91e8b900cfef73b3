use anyhow::Result;
use tracing::{debug, warn};

use crate::corpus::CorpusSource;
use crate::parser::block::{find_deal_block, BlockLookup, BlockRules, NotFound, RawArticle};
use crate::settings::ArticleSettings;

/// Fetches an article and cuts out its weekly deals section.
#[derive(Debug, Clone)]
pub struct DealBlockLocator {
    rules: BlockRules,
}

impl DealBlockLocator {
    pub fn new(article: &ArticleSettings) -> Result<Self> {
        let rules = BlockRules::new(
            &article.start_phrase,
            &article.stop_phrases,
            article.content_selector.as_deref(),
        )?;
        Ok(Self { rules })
    }

    /// Never fails: fetch problems come back as `NotFound`.
    pub async fn locate<S: CorpusSource + ?Sized>(&self, source: &S, url: &str) -> BlockLookup {
        let article = match source.fetch_document(url).await {
            Ok(article) => article,
            Err(e) => {
                warn!("Skipping {}: {}", url, e);
                return BlockLookup::NotFound(NotFound::Fetch(e.to_string()));
            }
        };
        self.locate_in(&article)
    }

    pub fn locate_in(&self, article: &RawArticle) -> BlockLookup {
        let lookup = find_deal_block(article, &self.rules);
        if let BlockLookup::NotFound(reason) = &lookup {
            debug!("No deals block in {}: {}", article.url, reason);
        }
        lookup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::FetchError;
    use async_trait::async_trait;
    use chrono::Utc;

    struct OnePage;

    #[async_trait]
    impl CorpusSource for OnePage {
        async fn list_page(&self, _page: usize) -> Result<Vec<String>, FetchError> {
            Ok(vec![])
        }

        async fn fetch_document(&self, url: &str) -> Result<RawArticle, FetchError> {
            if url.ends_with("/missing") {
                return Err(FetchError::Status { url: url.to_string(), status: 404 });
            }
            Ok(RawArticle {
                url: url.to_string(),
                html: r#"<html><body><div class="post-content prose">
                    <h2>💰 Deals of the Week</h2>
                    <p>🌱 Acme raised $5m Seed.</p>
                    <h2>In the News</h2><p>ignored</p>
                </div></body></html>"#
                    .to_string(),
                fetched_at: Utc::now(),
            })
        }
    }

    #[tokio::test]
    async fn finds_block_in_fetched_article() {
        let locator = DealBlockLocator::new(&ArticleSettings::default()).unwrap();
        match locator.locate(&OnePage, "https://n.example/issue-1").await {
            BlockLookup::Found(block) => {
                assert_eq!(block.text, "🌱 Acme raised $5m Seed.");
                assert_eq!(block.url, "https://n.example/issue-1");
            }
            other => panic!("expected a block, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn fetch_error_is_not_found() {
        let locator = DealBlockLocator::new(&ArticleSettings::default()).unwrap();
        let lookup = locator.locate(&OnePage, "https://n.example/missing").await;
        assert!(matches!(lookup, BlockLookup::NotFound(NotFound::Fetch(_))));
    }
}
