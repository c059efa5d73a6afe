//! Service configuration, loaded from `config.yaml` with environment
//! overrides for secrets.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `youtube.api_key` so the key can stay
/// out of the config file.
const API_KEY_ENV: &str = "YOUTUBE_API_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// SQLite database file. Defaults to `sermon_archive.db` under the
    /// platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    pub youtube: YouTubeConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    /// TTL for the live-stream lookup cache, in seconds.
    #[serde(default = "default_live_cache_seconds")]
    pub live_cache_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YouTubeConfig {
    /// Channel handle ("@tabernacle…"), channel id ("UC…") or legacy
    /// username.
    pub channel: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Local hour (0-23) of the daily catalog sync.
    #[serde(default = "default_sync_hour")]
    pub hour: u32,
    /// Run the speaker auto-assignment sweep after each sync.
    #[serde(default = "default_true")]
    pub auto_assign: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { hour: default_sync_hour(), auto_assign: true }
    }
}

fn default_sync_hour() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_live_cache_seconds() -> u64 {
    45
}

impl Config {
    /// Load and validate the configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.youtube.api_key = Some(key.trim().to_string());
            }
        }

        if config.youtube.channel.trim().is_empty() {
            anyhow::bail!("youtube.channel must not be empty");
        }
        if config.sync.hour > 23 {
            anyhow::bail!("sync.hour must be between 0 and 23");
        }

        Ok(config)
    }

    /// The configured database path, or the platform default.
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sermon-archive")
                .join("sermon_archive.db")
        })
    }

    pub fn api_key(&self) -> Result<&str> {
        self.youtube
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("no YouTube API key: set youtube.api_key or {}", API_KEY_ENV)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let (_dir, path) = write_config("youtube:\n  channel: \"@tabernacle\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.sync.hour, 1);
        assert!(config.sync.auto_assign);
        assert_eq!(config.live_cache_seconds, 45);
        assert!(config.database_path().ends_with("sermon_archive.db"));
    }

    #[test]
    fn full_config_parses() {
        let (_dir, path) = write_config(
            "database_path: /tmp/archive.db\n\
             youtube:\n  channel: UCabc123\n  api_key: key-from-file\n\
             sync:\n  hour: 4\n  auto_assign: false\n\
             live_cache_seconds: 30\n",
        );
        let config = Config::load(&path).unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/archive.db"));
        assert_eq!(config.sync.hour, 4);
        assert!(!config.sync.auto_assign);
        assert_eq!(config.live_cache_seconds, 30);
        assert_eq!(config.api_key().unwrap(), "key-from-file");
    }

    #[test]
    fn rejects_blank_channel_and_bad_hour() {
        let (_dir, path) = write_config("youtube:\n  channel: \"\"\n");
        assert!(Config::load(&path).is_err());

        let (_dir, path) = write_config("youtube:\n  channel: UCx\nsync:\n  hour: 24\n");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn missing_api_key_is_an_error_at_use_time() {
        let (_dir, path) = write_config("youtube:\n  channel: UCx\n");
        let config = Config::load(&path).unwrap();
        // only fails when the key is actually needed
        assert!(config.api_key().is_err());
    }
}
