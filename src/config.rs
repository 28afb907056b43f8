use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub birthdays: BirthdaysConfig,
    #[serde(default)]
    pub holidays: HolidaysConfig,
    #[serde(default)]
    pub joke: JokeConfig,
    #[serde(default)]
    pub haiku: HaikuConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub card: CardConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "default_telegram_url")]
    pub base_url: String,
    #[serde(default = "default_telegram_timeout")]
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            base_url: default_telegram_url(),
            timeout_secs: default_telegram_timeout(),
        }
    }
}

fn default_telegram_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_telegram_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_city")]
    pub city: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default = "default_weather_url")]
    pub base_url: String,
    /// Total number of attempts before falling back to the degraded text.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_weather_timeout")]
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            city: default_city(),
            lang: default_lang(),
            base_url: default_weather_url(),
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay(),
            timeout_secs: default_weather_timeout(),
        }
    }
}

fn default_city() -> String {
    "Moscow".to_string()
}

fn default_lang() -> String {
    "ru".to_string()
}

fn default_weather_url() -> String {
    "http://api.openweathermap.org".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_weather_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BirthdayBackend {
    #[default]
    Postgres,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BirthdaysConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub backend: BirthdayBackend,
    pub host: Option<String>,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Database file for the sqlite backend.
    pub path: Option<PathBuf>,
}

impl Default for BirthdaysConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: BirthdayBackend::default(),
            host: None,
            port: default_pg_port(),
            database: None,
            user: None,
            password: None,
            path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_pg_port() -> u16 {
    5432
}

impl BirthdaysConfig {
    /// Whether the selected backend has enough settings to connect.
    pub fn is_configured(&self) -> bool {
        match self.backend {
            BirthdayBackend::Postgres => self.host.is_some() && self.database.is_some(),
            BirthdayBackend::Sqlite => self.path.is_some(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HolidaysConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_holidays_url")]
    pub url: String,
    #[serde(default = "default_holidays_limit")]
    pub limit: usize,
    #[serde(default = "default_page_timeout")]
    pub timeout_secs: u64,
}

impl Default for HolidaysConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_holidays_url(),
            limit: default_holidays_limit(),
            timeout_secs: default_page_timeout(),
        }
    }
}

fn default_holidays_url() -> String {
    "https://my-calend.ru/holidays".to_string()
}

fn default_holidays_limit() -> usize {
    5
}

fn default_page_timeout() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct JokeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_joke_url")]
    pub url: String,
    #[serde(default = "default_page_timeout")]
    pub timeout_secs: u64,
}

impl Default for JokeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_joke_url(),
            timeout_secs: default_page_timeout(),
        }
    }
}

fn default_joke_url() -> String {
    "https://jokesrv.fermyon.app/".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HaikuConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_llm_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

impl Default for HaikuConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_llm_url(),
            model: default_model(),
            api_key: String::new(),
            max_tokens: default_max_tokens(),
            prompt: default_prompt(),
        }
    }
}

fn default_llm_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    256
}

fn default_prompt() -> String {
    "Напиши смешное хокку про IT. Ответь только текстом хокку.".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_hour")]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    /// Fixed offset from UTC the target time is expressed in.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            hour: default_hour(),
            minute: 0,
            utc_offset_hours: default_utc_offset(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_hour() -> u32 {
    8
}

fn default_utc_offset() -> i32 {
    3
}

fn default_poll_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardConfig {
    #[serde(default)]
    pub enabled: bool,
    pub font_path: Option<PathBuf>,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    pub save_path: Option<PathBuf>,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            font_path: None,
            font_size: default_font_size(),
            save_path: None,
        }
    }
}

fn default_font_size() -> f32 {
    18.0
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    pub file: Option<PathBuf>,
}

/// Toggles passed on the command line; `true` switches a feature on.
#[derive(Debug, Default)]
pub struct Overrides {
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub holidays: bool,
    pub joke: bool,
    pub haiku: bool,
}

impl Config {
    /// Apply environment variables named after the original deployment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OW_API") {
            self.weather.api_key = v;
        }
        if let Some(v) = get("TG_BOT_API") {
            self.telegram.bot_token = v;
        }
        if let Some(v) = get("CHAT_ID") {
            self.telegram.chat_id = v;
        }
        if let Some(v) = get("GIGA_AUTH_DATA") {
            self.haiku.api_key = v;
        }
        if let Some(v) = get("HOLIDAYS_URL") {
            self.holidays.url = v;
        }

        let pg_host = get("PG_HOST");
        if pg_host.is_some() {
            self.birthdays.backend = BirthdayBackend::Postgres;
            self.birthdays.host = pg_host;
        }
        if let Some(v) = get("PG_DB") {
            self.birthdays.database = Some(v);
        }
        if let Some(v) = get("PG_USER") {
            self.birthdays.user = Some(v);
        }
        if let Some(v) = get("PG_PASS") {
            self.birthdays.password = Some(v);
        }
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(hour) = overrides.hour {
            self.schedule.hour = hour;
        }
        if let Some(minute) = overrides.minute {
            self.schedule.minute = minute;
        }
        self.holidays.enabled |= overrides.holidays;
        self.joke.enabled |= overrides.joke;
        self.haiku.enabled |= overrides.haiku;
    }

    /// Reject settings the bot cannot start without.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("Telegram bot token is missing. Set TG_BOT_API or [telegram] bot_token.");
        }
        if self.telegram.chat_id.trim().is_empty() {
            anyhow::bail!("Telegram chat id is missing. Set CHAT_ID or [telegram] chat_id.");
        }
        if self.weather.api_key.trim().is_empty() {
            anyhow::bail!("OpenWeatherMap API key is missing. Set OW_API or [weather] api_key.");
        }
        if self.schedule.hour > 23 {
            anyhow::bail!("Invalid schedule hour {}: expected 0-23", self.schedule.hour);
        }
        if self.schedule.minute > 59 {
            anyhow::bail!("Invalid schedule minute {}: expected 0-59", self.schedule.minute);
        }
        if self.schedule.utc_offset_hours.abs() > 14 {
            anyhow::bail!(
                "Invalid UTC offset {}: expected -14..=14",
                self.schedule.utc_offset_hours
            );
        }
        if self.haiku.enabled && self.haiku.api_key.trim().is_empty() {
            anyhow::bail!("Haiku is enabled but no API key is set. Set GIGA_AUTH_DATA or [haiku] api_key.");
        }
        Ok(())
    }
}

/// Load `.env`, the TOML file (if present) and environment overrides.
pub fn load(path: &str) -> Result<Config> {
    dotenvy::dotenv().ok();
    let path = expand_tilde(path);
    let mut config = load_file(&path)?;
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

fn load_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".daybreak")
}

pub async fn init_config_dir() -> Result<PathBuf> {
    let base = default_base_dir();
    tokio::fs::create_dir_all(&base).await?;

    let config_path = base.join("config.toml");
    if !config_path.exists() {
        tokio::fs::write(&config_path, SAMPLE_CONFIG).await?;
    }
    Ok(config_path)
}

const SAMPLE_CONFIG: &str = r#"# Secrets may also come from the environment (or a .env file):
# OW_API, TG_BOT_API, CHAT_ID, PG_HOST, PG_DB, PG_USER, PG_PASS, GIGA_AUTH_DATA

[telegram]
# bot_token = "123456:ABC..."
# chat_id = "-1001234567890"

[weather]
city = "Moscow"
lang = "ru"
max_attempts = 3
retry_delay_secs = 5

[birthdays]
enabled = true
backend = "postgres"
# host = "localhost"
# database = "bot"
# user = "bot"
# password = "secret"

# backend = "sqlite"
# path = "birthdays.db"

[holidays]
enabled = false
limit = 5

[joke]
enabled = false

[haiku]
enabled = false
# base_url = "https://api.openai.com/v1"
# model = "gpt-4o-mini"

[schedule]
hour = 8
minute = 0
utc_offset_hours = 3

[card]
enabled = false
# font_path = "Symbola.ttf"
# save_path = "weather.png"

[logging]
file = "logs/debug.log"
"#;

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
