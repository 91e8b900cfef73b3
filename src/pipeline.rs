use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::clean::clean_extraction;
use crate::corpus::CorpusSource;
use crate::db::FundingStore;
use crate::deal::{DealOrigin, NormalizedDeal};
use crate::discover::ArticleDiscoverer;
use crate::extract::{Extractor, KeywordFilter};
use crate::ledger::UrlLedger;
use crate::locate::DealBlockLocator;
use crate::pace::Pacer;
use crate::parser::block::BlockLookup;
use crate::parser::fragments;
use crate::settings::{AcceptPolicy, Settings};
use crate::validate::DealValidator;

/// Budgets and policies for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub pages_to_load: usize,
    pub target_deal_count: usize,
    pub page_delay_ms: u64,
    pub extract_delay_ms: u64,
    pub accept: AcceptPolicy,
    pub source_label: String,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            pages_to_load: settings.run.pages_to_load,
            target_deal_count: settings.run.target_deal_count,
            page_delay_ms: settings.corpus.page_delay_ms,
            extract_delay_ms: settings.extraction.delay_ms,
            accept: settings.run.accept,
            source_label: settings.run.source_label.clone(),
        }
    }
}

/// Counts for every way a URL or fragment can leave the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub urls_discovered: usize,
    pub urls_skipped: usize,
    pub urls_processed: usize,
    pub blocks_not_found: usize,
    pub fragments: usize,
    pub filtered_out: usize,
    pub extract_calls: usize,
    pub extract_failed: usize,
    pub no_company: usize,
    pub rejected: usize,
    pub accepted: usize,
    pub stored_new: usize,
    pub budget_reached: bool,
}

impl RunReport {
    pub fn print(&self) {
        println!(
            "URLs: {} discovered, {} already processed, {} processed ({} without a deals block)",
            self.urls_discovered, self.urls_skipped, self.urls_processed, self.blocks_not_found
        );
        println!(
            "Fragments: {} found, {} filtered out, {} extracted ({} failed, {} without company, {} rejected)",
            self.fragments, self.filtered_out, self.extract_calls, self.extract_failed, self.no_company, self.rejected
        );
        println!(
            "Deals: {} accepted, {} new in store{}",
            self.accepted,
            self.stored_new,
            if self.budget_reached { " (deal budget reached)" } else { "" }
        );
    }
}

/// Discover → locate → split → extract → clean → validate → store, one article at a time.
pub struct Pipeline<'a, S: CorpusSource + ?Sized, E: Extractor + ?Sized> {
    source: &'a S,
    extractor: &'a E,
    locator: DealBlockLocator,
    validator: DealValidator,
    filter: KeywordFilter,
    config: PipelineConfig,
    progress: bool,
}

impl<'a, S: CorpusSource + ?Sized, E: Extractor + ?Sized> Pipeline<'a, S, E> {
    pub fn new(settings: &Settings, source: &'a S, extractor: &'a E) -> Result<Self> {
        Ok(Self {
            source,
            extractor,
            locator: DealBlockLocator::new(&settings.article)?,
            validator: DealValidator::new(settings.criteria.clone()),
            filter: KeywordFilter::new(&settings.extraction.keywords),
            config: PipelineConfig::from_settings(settings),
            progress: false,
        })
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub async fn run(&self, ledger: &mut UrlLedger, store: &mut FundingStore) -> Result<RunReport> {
        let cfg = &self.config;
        let mut report = RunReport::default();
        let mut pacer = Pacer::from_millis(cfg.extract_delay_ms);

        let urls = ArticleDiscoverer::new(self.source, cfg.page_delay_ms)
            .discover(cfg.pages_to_load)
            .await;
        report.urls_discovered = urls.len();

        let pb = if self.progress {
            let pb = ProgressBar::new(urls.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                    .progress_chars("#>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        for url in urls {
            if report.accepted >= cfg.target_deal_count {
                report.budget_reached = true;
                break;
            }
            if ledger.contains(&url) {
                debug!("Already processed: {}", url);
                report.urls_skipped += 1;
                pb.inc(1);
                continue;
            }
            pb.set_message(format!("{} deals", report.accepted));

            let mut batch = Vec::new();
            match self.locator.locate(self.source, &url).await {
                BlockLookup::Found(block) => {
                    let origin = DealOrigin {
                        source_url: url.clone(),
                        source: cfg.source_label.clone(),
                        date: Some(block.date()),
                    };
                    let frags = fragments::split(&block.text);
                    info!("{}: {} deal fragments", url, frags.len());
                    report.fragments += frags.len();

                    for frag in frags {
                        if report.accepted >= cfg.target_deal_count {
                            break;
                        }
                        if let Some(deal) = self.process_fragment(&frag.text, &origin, &mut pacer, &mut report).await {
                            report.accepted += 1;
                            batch.push(deal);
                        }
                    }
                }
                BlockLookup::NotFound(reason) => {
                    debug!("{}: {}", url, reason);
                    report.blocks_not_found += 1;
                }
            }

            // Deals land in the store before their URL is marked done
            if !batch.is_empty() {
                let saved = store
                    .save(&batch)
                    .with_context(|| format!("Failed to store deals from {}", url))?;
                report.stored_new += saved.net_new();
            }
            ledger
                .add(&url)
                .with_context(|| format!("Failed to record {} as processed", url))?;
            report.urls_processed += 1;
            pb.inc(1);
        }

        if report.accepted >= cfg.target_deal_count {
            report.budget_reached = true;
        }
        pb.finish_and_clear();
        info!(
            "Run finished: {} accepted, {} URLs processed, {} skipped",
            report.accepted, report.urls_processed, report.urls_skipped
        );
        Ok(report)
    }

    async fn process_fragment(
        &self,
        text: &str,
        origin: &DealOrigin,
        pacer: &mut Pacer,
        report: &mut RunReport,
    ) -> Option<NormalizedDeal> {
        if !self.filter.matches(text) {
            debug!("No funding keyword: {}", text);
            report.filtered_out += 1;
            return None;
        }

        pacer.wait().await;
        report.extract_calls += 1;
        let raw = match self.extractor.extract(text).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Extraction failed for {:?}: {}", text, e);
                report.extract_failed += 1;
                return None;
            }
        };

        let Some(cleaned) = clean_extraction(raw) else {
            debug!("No company in {:?}", text);
            report.no_company += 1;
            return None;
        };

        let deal = NormalizedDeal::from_cleaned(cleaned, origin, &self.validator);
        if self.config.accept == AcceptPolicy::Criteria && !self.validator.meets_criteria(&deal) {
            let reasons: Vec<String> = self.validator.violations(&deal).iter().map(|v| v.to_string()).collect();
            debug!("Rejected {}: {}", deal.company, reasons.join(", "));
            report.rejected += 1;
            return None;
        }
        debug!("Accepted {}", deal.summary());
        Some(deal)
    }
}

/// Deletes the store (with its SQLite side files) and the ledger.
pub fn reset_state(store_path: &Path, ledger_path: &Path) -> Result<Vec<PathBuf>> {
    let mut removed = FundingStore::remove_store_files(store_path)?;
    if UrlLedger::remove(ledger_path).with_context(|| format!("Failed to delete {}", ledger_path.display()))? {
        removed.push(ledger_path.to_path_buf());
    }
    Ok(removed)
}
