use anyhow::{Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Placeholder credentials used when neither the config file nor the
/// environment provides them. The bot starts, but LINE rejects every call.
pub const PLACEHOLDER_ACCESS_TOKEN: &str = "your_channel_access_token";
pub const PLACEHOLDER_CHANNEL_SECRET: &str = "your_channel_secret";

/// Which identifier an inbound message adds to the recipient registry.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AddressingMode {
    /// Register group and room IDs; direct user messages register nothing.
    #[default]
    Chat,
    /// Register the sender's user ID for every source type.
    User,
}

impl std::fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressingMode::Chat => write!(f, "chat"),
            AddressingMode::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for AddressingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(AddressingMode::Chat),
            "user" => Ok(AddressingMode::User),
            other => anyhow::bail!("Unknown addressing mode: {} (expected chat or user)", other),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub line: LineConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LineConfig {
    #[serde(default = "default_access_token")]
    pub channel_access_token: String,
    #[serde(default = "default_channel_secret")]
    pub channel_secret: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BroadcastConfig {
    /// IANA zone the trigger times are written in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Daily trigger times, `HH:MM`.
    #[serde(default = "default_times")]
    pub times: Vec<String>,
    /// Six-field cron expression (UTC) for polling the trigger times.
    #[serde(default = "default_poll_cron")]
    pub poll_cron: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RegistryConfig {
    #[serde(default)]
    pub addressing: AddressingMode,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_access_token() -> String {
    PLACEHOLDER_ACCESS_TOKEN.to_string()
}

fn default_channel_secret() -> String {
    PLACEHOLDER_CHANNEL_SECRET.to_string()
}

fn default_api_base_url() -> String {
    "https://api.line.me".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_timezone() -> String {
    "Asia/Taipei".to_string()
}

fn default_times() -> Vec<String> {
    vec!["12:00".to_string(), "18:00".to_string()]
}

fn default_poll_cron() -> String {
    "0 * * * * *".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_access_token: default_access_token(),
            channel_secret: default_channel_secret(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            times: default_times(),
            poll_cron: default_poll_cron(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BroadcastConfig {
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid broadcast timezone '{}': {}", self.timezone, e))
    }

    pub fn trigger_times(&self) -> Result<Vec<NaiveTime>> {
        self.times
            .iter()
            .map(|t| {
                NaiveTime::parse_from_str(t.trim(), "%H:%M")
                    .with_context(|| format!("Invalid broadcast time '{}' (expected HH:MM)", t))
            })
            .collect()
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Read the TOML file at `path` (defaults when it does not exist), then
    /// apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Config::default()
        };

        let config = config.with_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML")
    }

    /// Apply `LINE_CHANNEL_ACCESS_TOKEN`, `LINE_CHANNEL_SECRET`, `PORT` and
    /// `BOT_ADDRESSING` from `lookup` on top of the file values.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("LINE_CHANNEL_ACCESS_TOKEN") {
            self.line.channel_access_token = token;
        }
        if let Some(secret) = lookup("LINE_CHANNEL_SECRET") {
            self.line.channel_secret = secret;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT value: {}", port))?;
        }
        if let Some(mode) = lookup("BOT_ADDRESSING") {
            self.registry.addressing = mode.parse()?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.broadcast.timezone()?;
        let times = self.broadcast.trigger_times()?;
        if times.is_empty() {
            anyhow::bail!("At least one broadcast time must be configured");
        }
        if self.broadcast.poll_cron.split_whitespace().count() != 6 {
            anyhow::bail!(
                "broadcast.poll_cron must have six fields (sec min hour day month weekday): {}",
                self.broadcast.poll_cron
            );
        }
        if self.http.timeout_secs == 0 {
            anyhow::bail!("http.timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// True while either credential is still the non-functional placeholder.
    pub fn uses_placeholder_credentials(&self) -> bool {
        self.line.channel_access_token == PLACEHOLDER_ACCESS_TOKEN
            || self.line.channel_secret == PLACEHOLDER_CHANNEL_SECRET
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
