//! Bot configuration.
//!
//! Config file lives at `~/.config/tmi-bot/bot.toml` unless `--config`
//! points elsewhere. Command-line values win over the file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tmi_adapter::ClientConfig;

/// Bot settings as read from the config file.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Twitch login name.
    pub username: Option<String>,
    /// OAuth token, including the `oauth:` prefix.
    pub token: Option<String>,
    /// Channels to join on start, with or without a leading `#`.
    pub channels: Vec<String>,
    /// Connection settings passed to the adapter.
    pub client: ClientConfig,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub username: Option<String>,
    pub token: Option<String>,
    pub channels: Vec<String>,
    pub tls: bool,
}

pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tmi-bot")
        .join("bot.toml")
}

impl Config {
    /// Load from `path` (or the default location). A missing file gives
    /// defaults; an unreadable or invalid one is logged and ignored.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_path);
        if !path.exists() {
            tracing::debug!("No config file at {}", path.display());
            return Self::default();
        }
        match std::fs::read_to_string(&path) {
            Ok(s) => match Self::parse(&s) {
                Ok(c) => return c,
                Err(e) => tracing::warn!("Bad config file {}: {e}", path.display()),
            },
            Err(e) => tracing::warn!("Can't read {}: {e}", path.display()),
        }
        Self::default()
    }

    pub fn parse(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if overrides.username.is_some() {
            self.username = overrides.username;
        }
        if overrides.token.is_some() {
            self.token = overrides.token;
        }
        if !overrides.channels.is_empty() {
            self.channels = overrides.channels;
        }
        if overrides.tls {
            self.client.tls = true;
        }
    }

    /// Channel names without the `#` the adapter adds itself.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels
            .iter()
            .map(|c| c.trim().trim_start_matches('#').to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }
}
