use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;

use super::{FireContext, Provider, Section};
use crate::config::WeatherConfig;

/// Shown in place of the forecast when every attempt failed.
pub const DEGRADED_TEXT: &str = "Ошибка при получении погоды.";

pub struct WeatherProvider {
    client: Client,
    base_url: String,
    api_key: String,
    city: String,
    lang: String,
    max_attempts: u32,
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    name: String,
    weather: Vec<Condition>,
    main: Readings,
    wind: Wind,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct Readings {
    temp: f64,
    feels_like: f64,
    humidity: f64,
    /// hPa
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: f64,
}

impl WeatherProvider {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        Ok(Self {
            client: super::http_client(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            city: config.city.clone(),
            lang: config.lang.clone(),
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
        })
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn request(&self) -> Result<CurrentWeather> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", self.city.as_str()),
                ("appid", self.api_key.as_str()),
                ("lang", self.lang.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to call {url}"))?;

        let status = response.status();
        tracing::info!("Weather data received with status code: {status}");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Weather API error ({status}): {body}");
        }

        response
            .json()
            .await
            .context("Failed to parse weather response")
    }
}

#[async_trait::async_trait]
impl Provider for WeatherProvider {
    fn name(&self) -> &str {
        "weather"
    }

    fn section(&self) -> Section {
        Section::Weather
    }

    fn is_critical(&self) -> bool {
        true
    }

    async fn fetch(&self, _ctx: &FireContext) -> Result<String> {
        for attempt in 1..=self.max_attempts {
            tracing::info!(
                "Requesting weather for {} (attempt {attempt}/{})",
                self.city,
                self.max_attempts
            );
            match self.request().await.and_then(|data| format_weather(&data)) {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!(
                        "Weather attempt {attempt}/{} failed: {e:#}",
                        self.max_attempts
                    );
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        tracing::error!("Weather unavailable after {} attempts", self.max_attempts);
        Ok(DEGRADED_TEXT.to_string())
    }
}

fn format_weather(data: &CurrentWeather) -> Result<String> {
    let condition = data
        .weather
        .first()
        .ok_or_else(|| anyhow::anyhow!("Weather response has no conditions"))?;
    let main = &data.main;

    Ok(format!(
        "Сейчас в городе {}:\n\n\
         {} {}\n\n\
         🌡️ Температура воздуха — {:.2}°C\n\
         👀 Чувствуется как — {:.1}°C\n\
         💦 Влажность — {}%\n\
         💨 Ветер — {} м/с\n\
         📍 Атмосферное давление — {:.0} мм рт.ст.",
        data.name,
        icon_for(&condition.icon),
        condition.description,
        main.temp,
        main.feels_like,
        main.humidity,
        data.wind.speed,
        main.pressure * 0.75,
    ))
}

/// OpenWeatherMap icon code to emoji.
fn icon_for(code: &str) -> &'static str {
    match code {
        "01d" => "☀️",
        "01n" => "🌙",
        "02d" => "🌤️",
        "02n" => "☁️",
        "03d" | "03n" => "☁️",
        "04d" | "04n" => "☁️",
        "09d" | "09n" => "🌧️",
        "10d" => "🌦️",
        "10n" => "🌧️",
        "11d" | "11n" => "⛈️",
        "13d" | "13n" => "❄️",
        "50d" | "50n" => "🌫️",
        _ => "?",
    }
}
