use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{ExtractError, Extractor, RawExtraction};
use crate::settings::ExtractionSettings;

/// Chat-completions client that turns one deal fragment into a [`RawExtraction`].
pub struct LlmExtractor {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    system_prompt: String,
    referer: Option<String>,
    app_title: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

impl LlmExtractor {
    pub fn new(settings: &ExtractionSettings, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build extraction client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key,
            model: settings.model.clone(),
            temperature: settings.temperature,
            system_prompt: system_prompt(&settings.sector_vocabulary),
            referer: settings.referer.clone(),
            app_title: settings.app_title.clone(),
        })
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&self, fragment: &str) -> Result<RawExtraction, ExtractError> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": format!("Text: \"{}\"", fragment) }
            ]
        });

        let mut req = self.client.post(&self.endpoint).bearer_auth(&self.api_key).json(&body);
        if let Some(referer) = &self.referer {
            req = req.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.app_title {
            req = req.header("X-Title", title);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ExtractError::Status(status.as_u16()));
        }
        let chat: ChatResponse = resp.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ExtractError::EmptyReply)?;
        debug!("Extraction reply: {}", content);
        parse_reply(&content)
    }
}

/// Reads the deal object out of a reply, tolerating code fences and chatter around it.
pub fn parse_reply(content: &str) -> Result<RawExtraction, ExtractError> {
    let text = content.trim();
    let text = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    };
    Ok(serde_json::from_str(text)?)
}

fn system_prompt(sectors: &[String]) -> String {
    let example = json!({
        "startup_name": "AIR",
        "amount_raised": "$23m",
        "funding_stage": "Series A",
        "lead_investor": "Entrée Capital",
        "other_investors": [],
        "subsector": "Mobility",
        "region": null,
        "confidence_score": 0.9
    });
    format!(
        "You extract venture funding announcements from newsletter snippets. \
Reply with a single JSON object with the keys startup_name, amount_raised, funding_stage, \
lead_investor, other_investors, subsector, region and confidence_score.\n\
- lead_investor is the firm that led the round; put every other participant in other_investors.\n\
- amount_raised keeps the text as written, e.g. \"$12.5m\" or \"undisclosed\".\n\
- subsector must be one of: {}. Infer it from what the company does.\n\
- confidence_score is a number between 0 and 1.\n\
- Use null for anything the text does not say.\n\n\
Example text: \"✈️ AIR, a Haifa-based eVTOL developer, raised $23m in Series A funding from Entrée Capital.\"\n\
Example reply: {}",
        sectors.join(", "),
        example
    )
}
