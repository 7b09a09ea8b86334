use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::API_BASE;

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// Upstream API access. Both keys are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Application API token, sent as `api_token` on every request.
    pub api_token: String,
    /// Numeric identifier of the monitored campaign.
    pub campaign_id: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// Notification sinks. A missing or empty key disables that sink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Chat incoming-webhook URL.
    #[serde(default)]
    pub chat_webhook_url: Option<String>,
    /// Automation service key (the `<key>` in `/trigger/<event>/with/key/<key>`).
    #[serde(default)]
    pub automation_key: Option<String>,
}

impl NotifyConfig {
    pub fn chat_webhook_url(&self) -> Option<&str> {
        non_empty(&self.chat_webhook_url)
    }

    pub fn automation_key(&self) -> Option<&str> {
        non_empty(&self.automation_key)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Sleep between poll cycles, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Location of the persisted watermark/marker/credential records.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_state_path() -> PathBuf {
    PathBuf::from("data.json")
}

fn default_base_url() -> String {
    API_BASE.to_string()
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            state_path: default_state_path(),
        }
    }
}

impl SettingsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Parse and validate a TOML document.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.api.api_token.trim().is_empty() {
            bail!("api.api_token must not be empty");
        }
        if self.api.campaign_id == 0 {
            bail!("api.campaign_id must be set");
        }
        if self.settings.poll_interval_secs == 0 {
            bail!("settings.poll_interval_secs must be positive");
        }
        Ok(())
    }
}
