use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;

use super::{FireContext, Provider, Section};
use crate::config::JokeConfig;

pub struct JokeProvider {
    client: Client,
    url: String,
}

#[derive(Deserialize)]
struct JokeResponse {
    content: String,
}

impl JokeProvider {
    pub fn new(config: &JokeConfig) -> Result<Self> {
        Ok(Self {
            client: super::http_client(config.timeout_secs)?,
            url: config.url.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Provider for JokeProvider {
    fn name(&self) -> &str {
        "joke"
    }

    fn section(&self) -> Section {
        Section::Supplement
    }

    async fn fetch(&self, _ctx: &FireContext) -> Result<String> {
        tracing::info!("Requesting joke data");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to call {}", self.url))?;

        let status = response.status();
        tracing::info!("Joke data received with status code: {status}");
        if !status.is_success() {
            anyhow::bail!("Joke service error ({status})");
        }

        let body: JokeResponse = response.json().await.context("Failed to parse joke")?;
        let joke = body.content.trim();
        if joke.is_empty() {
            anyhow::bail!("Joke service returned an empty joke");
        }
        Ok(format!("*{joke}*"))
    }
}
