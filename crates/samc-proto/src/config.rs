use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub mpd: MpdConfig,
    #[serde(default)]
    pub acme: AcmeConfig,
    #[serde(default)]
    pub info: InfoConfig,
}

/// Connection target of the player daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MpdConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcmeConfig {
    /// Where the window host's file tree is mounted.
    #[serde(default = "default_mount")]
    pub mount: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoConfig {
    /// Helper run as `<command> <library uri>`; its stdout fills the info window.
    #[serde(default = "default_info_command")]
    pub command: String,
}

impl Default for MpdConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
        }
    }
}

impl Default for AcmeConfig {
    fn default() -> Self {
        Self {
            mount: default_mount(),
        }
    }
}

impl Default for InfoConfig {
    fn default() -> Self {
        Self {
            command: default_info_command(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6600
}

fn default_mount() -> PathBuf {
    PathBuf::from(platform::DEFAULT_ACME_MOUNT)
}

fn default_info_command() -> String {
    "songinfo".to_string()
}

impl MpdConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Overlay `MPD_HOST` / `MPD_PORT`. `MPD_HOST` may carry a password as
    /// `password@host`.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MPD_HOST").filter(|h| !h.is_empty()) {
            match host.split_once('@') {
                Some((password, host)) => {
                    self.password = Some(password.to_string()).filter(|p| !p.is_empty());
                    self.host = host.to_string();
                }
                None => self.host = host,
            }
        }
        if let Some(port) = lookup("MPD_PORT").filter(|p| !p.is_empty()) {
            self.port = port
                .parse()
                .with_context(|| format!("MPD_PORT is not a valid port: {:?}", port))?;
        }
        Ok(())
    }
}

impl Config {
    /// Load the default config file (writing one with defaults on first run),
    /// then apply the environment.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            let config = Self::default();
            config.save()?;
            info!("wrote default config to {:?}", config_path);
            config
        };
        config.mpd.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load an explicit config file and apply the environment.
    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::load_from(path)?;
        config.mpd.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
