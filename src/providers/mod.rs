pub mod birthdays;
pub mod haiku;
pub mod holidays;
pub mod joke;
pub mod weather;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate};

/// Where a fact lands in the composed message. Variant order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    Weather,
    Birthdays,
    Holidays,
    Supplement,
}

/// One named, optional piece of content for the outgoing message.
#[derive(Debug, Clone)]
pub struct Fact {
    pub source_name: String,
    pub section: Section,
    pub content: Option<String>,
    /// Absent critical facts are replaced by a failure line instead of being dropped.
    pub is_critical: bool,
}

/// The instant a firing happens, in the schedule's offset.
#[derive(Debug, Clone, Copy)]
pub struct FireContext {
    pub now: DateTime<FixedOffset>,
}

impl FireContext {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self { now }
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    fn section(&self) -> Section;
    fn is_critical(&self) -> bool {
        false
    }
    async fn fetch(&self, ctx: &FireContext) -> Result<String>;
}

/// Run every provider in order. Failures are logged and become absent facts.
pub async fn collect(providers: &[Box<dyn Provider>], ctx: &FireContext) -> Vec<Fact> {
    let mut facts = Vec::with_capacity(providers.len());
    for provider in providers {
        let content = match provider.fetch(ctx).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!("Provider {} failed: {e:#}", provider.name());
                None
            }
        };
        facts.push(Fact {
            source_name: provider.name().to_string(),
            section: provider.section(),
            content,
            is_critical: provider.is_critical(),
        });
    }
    facts
}

/// Build a `reqwest::Client` with a request timeout.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}
