use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::validate::Criteria;

/// Base name of the optional settings file looked up in the working directory.
pub const SETTINGS_FILE: &str = "deals";
pub const ENV_PREFIX: &str = "DEALS";
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub corpus: CorpusSettings,
    pub article: ArticleSettings,
    pub extraction: ExtractionSettings,
    pub criteria: Criteria,
    pub run: RunSettings,
}

impl Settings {
    /// Defaults, then `deals.toml` (or `file`), then `DEALS_*` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&Settings::default())?;
        let builder = Config::builder().add_source(defaults);
        let builder = match file {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name(SETTINGS_FILE).required(false)),
        };
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")
    }

    /// Extraction key from settings, else from `OPENROUTER_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.extraction
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub data_dir: PathBuf,
    pub store_file: String,
    pub ledger_file: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            store_file: "deals.sqlite".into(),
            ledger_file: "processed_urls.log".into(),
        }
    }
}

impl PathSettings {
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_file)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(&self.ledger_file)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CorpusKind {
    GhostApi,
    Sitemap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    pub kind: CorpusKind,
    /// Ghost content API posts endpoint.
    pub api_url: String,
    pub api_key: String,
    pub filter: String,
    pub page_size: usize,
    pub sitemap_url: String,
    /// Only sitemap URLs matching this pattern are articles.
    pub url_pattern: String,
    pub page_delay_ms: u64,
    pub list_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            kind: CorpusKind::Sitemap,
            api_url: "https://www.ctvc.co/ghost/api/content/posts/".into(),
            api_key: String::new(),
            filter: "tag:newsletter".into(),
            page_size: 6,
            sitemap_url: "https://www.ctvc.co/sitemap-posts.xml".into(),
            url_pattern: r"^https://www\.ctvc\.co/[a-z0-9][a-z0-9-]*/?$".into(),
            page_delay_ms: 500,
            list_timeout_secs: 15,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleSettings {
    pub start_phrase: String,
    pub stop_phrases: Vec<String>,
    pub content_selector: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ArticleSettings {
    fn default() -> Self {
        Self {
            start_phrase: "deals of the week".into(),
            stop_phrases: ["in the news", "exits", "new funds", "pop-up", "opportunities & events", "jobs"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            content_selector: Some(r#"div[class*="content"][class*="prose"]"#.into()),
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// OpenAI-compatible API root; `/chat/completions` is appended.
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Minimum gap between two extraction calls.
    pub delay_ms: u64,
    pub keywords: Vec<String>,
    /// Sectors the model may choose from when inferring a subsector.
    pub sector_vocabulary: Vec<String>,
    pub referer: Option<String>,
    pub app_title: Option<String>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".into(),
            api_key: None,
            model: "meta-llama/llama-3-8b-instruct".into(),
            temperature: 0.1,
            timeout_secs: 60,
            delay_ms: 1500,
            keywords: vec!["raised".into(), "funding".into()],
            sector_vocabulary: [
                "Energy",
                "Mobility",
                "Food & Agriculture",
                "Industrials",
                "Carbon",
                "Built Environment",
                "Climate Adaptation",
                "Grid Modernization",
                "Carbon Capture",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            referer: None,
            app_title: Some("deal_scraper".into()),
        }
    }
}

/// Which cleaned records count toward the deal budget and get stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AcceptPolicy {
    /// Every record with a company name; `is_target_deal` tags the interesting ones.
    AnyCompany,
    /// Only records that pass every investment criterion.
    Criteria,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub pages_to_load: usize,
    pub target_deal_count: usize,
    pub accept: AcceptPolicy,
    /// Value written to each record's `source` column.
    pub source_label: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            pages_to_load: 3,
            target_deal_count: 15,
            accept: AcceptPolicy::AnyCompany,
            source_label: "CTVC".into(),
        }
    }
}
