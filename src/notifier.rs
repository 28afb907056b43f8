use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};

use crate::card::WeatherCard;
use crate::channels::{Channel, OutboundMessage};
use crate::compose::{compose, failure_line};
use crate::config::Config;
use crate::providers::birthdays::{self, BirthdaysProvider};
use crate::providers::haiku::HaikuProvider;
use crate::providers::holidays::HolidaysProvider;
use crate::providers::joke::JokeProvider;
use crate::providers::weather::WeatherProvider;
use crate::providers::{self, Fact, FireContext, Provider, Section};

/// One firing of the pipeline: facts, message, card, delivery.
pub struct Notifier {
    providers: Vec<Box<dyn Provider>>,
    channel: Box<dyn Channel>,
    card: Option<WeatherCard>,
    offset: FixedOffset,
}

impl Notifier {
    pub fn new(
        providers: Vec<Box<dyn Provider>>,
        channel: Box<dyn Channel>,
        card: Option<WeatherCard>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            providers,
            channel,
            card,
            offset,
        }
    }

    pub fn from_config(cfg: &Config, channel: Box<dyn Channel>, offset: FixedOffset) -> Result<Self> {
        let card = match WeatherCard::from_config(&cfg.card) {
            Ok(card) => card,
            Err(e) => {
                tracing::warn!("Weather card disabled: {e:#}");
                None
            }
        };
        Ok(Self::new(build_providers(cfg)?, channel, card, offset))
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Fetch every fact once and assemble the outgoing message.
    pub async fn build(&self, now: DateTime<Utc>) -> OutboundMessage {
        let ctx = FireContext::new(now.with_timezone(&self.offset));
        let facts = providers::collect(&self.providers, &ctx).await;
        let mut msg = OutboundMessage::text(compose(&facts));
        msg.image = self.render_card(&facts);
        msg
    }

    /// Build and deliver. Delivery errors are returned for the caller to log.
    pub async fn fire(&self, now: DateTime<Utc>) -> Result<()> {
        let msg = self.build(now).await;
        self.channel.send(&msg).await
    }

    fn render_card(&self, facts: &[Fact]) -> Option<Vec<u8>> {
        let card = self.card.as_ref()?;
        let weather = facts.iter().find(|f| f.section == Section::Weather)?;
        let text = match weather.content.as_deref() {
            Some(content) if !content.trim().is_empty() => content.to_string(),
            _ => failure_line(weather),
        };
        match card.render(&text) {
            Ok(png) => Some(png),
            Err(e) => {
                tracing::warn!("Sending without weather card: {e:#}");
                None
            }
        }
    }
}

/// Providers in display order, honoring feature toggles.
pub fn build_providers(cfg: &Config) -> Result<Vec<Box<dyn Provider>>> {
    let mut providers: Vec<Box<dyn Provider>> = vec![Box::new(WeatherProvider::new(&cfg.weather)?)];

    if cfg.birthdays.enabled {
        if cfg.birthdays.is_configured() {
            let store = birthdays::open_store(&cfg.birthdays)?;
            providers.push(Box::new(BirthdaysProvider::new(store)));
        } else {
            tracing::warn!("Birthdays disabled: no database configured");
        }
    }
    if cfg.holidays.enabled {
        providers.push(Box::new(HolidaysProvider::new(&cfg.holidays)?));
    }
    if cfg.haiku.enabled {
        let llm = crate::llm::create_client(&cfg.haiku)?;
        providers.push(Box::new(HaikuProvider::new(llm, cfg.haiku.prompt.clone())));
    }
    if cfg.joke.enabled {
        providers.push(Box::new(JokeProvider::new(&cfg.joke)?));
    }
    Ok(providers)
}
