use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use deal_scraper::corpus::{self, HttpFetcher};
use deal_scraper::db::FundingStore;
use deal_scraper::discover::ArticleDiscoverer;
use deal_scraper::extract::LlmExtractor;
use deal_scraper::ledger::UrlLedger;
use deal_scraper::locate::DealBlockLocator;
use deal_scraper::parser::block::BlockLookup;
use deal_scraper::parser::fragments;
use deal_scraper::pipeline::{reset_state, Pipeline};
use deal_scraper::settings::{AcceptPolicy, CorpusKind, Settings};

#[derive(Parser)]
#[command(name = "deal_scraper", about = "Funding deal extraction from newsletter archives")]
struct Cli {
    /// Settings file (default: ./deals.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover articles, extract their deals and store them
    Run {
        /// Listing pages to walk
        #[arg(short, long)]
        pages: Option<usize>,
        /// Stop after this many accepted deals
        #[arg(short = 'n', long)]
        target: Option<usize>,
        /// Which deals to keep
        #[arg(long, value_enum)]
        accept: Option<AcceptPolicy>,
        /// Where to list articles from
        #[arg(long, value_enum)]
        corpus: Option<CorpusKind>,
    },
    /// List article URLs without processing them
    Discover {
        #[arg(short, long)]
        pages: Option<usize>,
        #[arg(long, value_enum)]
        corpus: Option<CorpusKind>,
    },
    /// Show the deals block and fragments of one article
    Locate { url: String },
    /// Stored deals table
    List {
        /// Only deals flagged as targets
        #[arg(short, long)]
        target_only: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Store and ledger statistics
    Stats,
    /// Delete the deal store and the processed-URL ledger
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Run { pages, target, accept, corpus: kind } => {
            if let Some(p) = pages {
                settings.run.pages_to_load = p;
            }
            if let Some(n) = target {
                settings.run.target_deal_count = n;
            }
            if let Some(a) = accept {
                settings.run.accept = a;
            }
            if let Some(k) = kind {
                settings.corpus.kind = k;
            }

            let api_key = settings
                .api_key()
                .context("No extraction API key: set OPENROUTER_API_KEY or extraction.api_key")?;
            let source = corpus::open_source(&settings)?;
            let extractor = LlmExtractor::new(&settings.extraction, api_key)?;
            let mut ledger = UrlLedger::open(&settings.paths.ledger_path())?;
            let mut store = FundingStore::open(&settings.paths.store_path())?;

            println!(
                "Pipeline: up to {} pages, stopping at {} deals ({} already processed URLs)",
                settings.run.pages_to_load,
                settings.run.target_deal_count,
                ledger.len()
            );
            let pipeline = Pipeline::new(&settings, source.as_ref(), &extractor)?.with_progress(true);
            let report = pipeline.run(&mut ledger, &mut store).await?;
            report.print();
            println!("Store now holds {} deals ({})", store.count()?, store.path().display());
            Ok(())
        }
        Commands::Discover { pages, corpus: kind } => {
            if let Some(k) = kind {
                settings.corpus.kind = k;
            }
            let source = corpus::open_source(&settings)?;
            let ledger = UrlLedger::open(&settings.paths.ledger_path())?;
            let urls = ArticleDiscoverer::new(source.as_ref(), settings.corpus.page_delay_ms)
                .discover(pages.unwrap_or(settings.run.pages_to_load))
                .await;
            for url in &urls {
                let mark = if ledger.contains(url) { "done" } else { "new " };
                println!("[{}] {}", mark, url);
            }
            let fresh = urls.iter().filter(|u| !ledger.contains(u)).count();
            println!("\n{} URLs, {} not yet processed", urls.len(), fresh);
            Ok(())
        }
        Commands::Locate { url } => {
            let http = HttpFetcher::new(&settings.corpus, &settings.article)?;
            let locator = DealBlockLocator::new(&settings.article)?;
            let article = http.article(&url).await.with_context(|| format!("Failed to fetch {}", url))?;
            match locator.locate_in(&article) {
                BlockLookup::Found(block) => {
                    println!("Published: {}", block.date());
                    println!("{}\n", block.text);
                    let frags = fragments::split(&block.text);
                    println!("--- {} fragments ---", frags.len());
                    for (i, f) in frags.iter().enumerate() {
                        println!("{:>3}. {}", i + 1, f.text);
                    }
                }
                BlockLookup::NotFound(reason) => println!("No deals block: {}", reason),
            }
            Ok(())
        }
        Commands::List { target_only, json, limit } => {
            let store = FundingStore::open(&settings.paths.store_path())?;
            let rows = store.list(target_only, Some(limit))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }
            if rows.is_empty() {
                println!("No deals stored. Run 'run' first.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<22} | {:>8} | {:<10} | {:<22} | {:<20} | {:<10} | {:>3}",
                "#", "Company", "Amount", "Stage", "Lead", "Sector", "Date", "Tgt"
            );
            println!("{}", "-".repeat(118));
            for (i, d) in rows.iter().enumerate() {
                let amount = if d.amount > 0.0 { format!("${:.1}M", d.amount) } else { "-".into() };
                let date = d.date.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
                println!(
                    "{:>3} | {:<22} | {:>8} | {:<10} | {:<22} | {:<20} | {:<10} | {:>3}",
                    i + 1,
                    truncate(&d.company, 22),
                    amount,
                    truncate(&d.stage, 10),
                    truncate(&d.lead_investor, 22),
                    truncate(&d.sector, 20),
                    date,
                    if d.is_target_deal { "*" } else { "" }
                );
            }
            println!("\n{} deals", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let store = FundingStore::open(&settings.paths.store_path())?;
            let ledger = UrlLedger::open(&settings.paths.ledger_path())?;
            let s = store.summary()?;
            println!("Deals:          {}", s.total);
            println!("Target deals:   {}", s.target);
            println!("Total raised:   ${:.1}M", s.total_amount);
            println!("Avg confidence: {:.2}", s.avg_confidence);
            println!("Processed URLs: {}", ledger.len());
            if let Some(ts) = &s.last_updated {
                println!(
                    "Last updated:   {} (+{} deals)",
                    ts,
                    s.new_deals_added.unwrap_or(0)
                );
            }
            if !s.by_sector.is_empty() {
                println!("\n--- By sector ---");
                for (sector, n) in &s.by_sector {
                    println!("  {:<24} {}", if sector.is_empty() { "(unknown)" } else { sector }, n);
                }
            }
            if !s.by_stage.is_empty() {
                println!("\n--- By stage ---");
                for (stage, n) in &s.by_stage {
                    println!("  {:<24} {}", if stage.is_empty() { "(unknown)" } else { stage }, n);
                }
            }
            Ok(())
        }
        Commands::Reset { yes } => {
            if !yes {
                println!("This deletes the deal store and the processed-URL ledger. Re-run with --yes.");
                return Ok(());
            }
            let removed = reset_state(&settings.paths.store_path(), &settings.paths.ledger_path())?;
            if removed.is_empty() {
                println!("Nothing to delete.");
            }
            for p in removed {
                println!("Deleted {}", p.display());
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
