//! Configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file
//! (explicit path or the XDG config location), then `LODESTONE_*`
//! environment variables with `__` separating nested keys.

use crate::logging::LoggingConfig;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime settings for the directory client and provider resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the directory server.
    #[serde(default = "default_directory_url")]
    pub directory_url: String,

    /// RPC endpoint of the local content-network node. `None` runs without
    /// the provider capability; every record resolves to "unknown".
    #[serde(default)]
    pub ipfs_api_url: Option<String>,

    /// Deadline for one provider-discovery query, in milliseconds.
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_directory_url() -> String {
    "https://directory.lodestone.net".to_string()
}

fn default_provider_timeout_ms() -> u64 {
    10_000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            directory_url: default_directory_url(),
            ipfs_api_url: None,
            provider_timeout_ms: default_provider_timeout_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    pub fn provider_deadline(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load settings. An explicit file must exist; the default XDG file
    /// (`~/.config/lodestone/config.toml`) is optional.
    pub fn load(explicit_file: Option<&Path>) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();
        match explicit_file {
            Some(path) => {
                builder = builder.add_source(File::from(path.to_path_buf()));
            }
            None => {
                if let Some(path) = Self::default_config_path() {
                    builder = builder.add_source(File::from(path).required(false));
                }
            }
        }
        builder = builder.add_source(
            Environment::with_prefix("LODESTONE")
                .separator("__")
                .try_parsing(true),
        );
        builder.build()?.try_deserialize()
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "lodestone", "lodestone")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_apply_without_any_source() {
        let settings = ConfigLoader::load(None).unwrap();
        assert_eq!(settings.directory_url, default_directory_url());
        assert_eq!(settings.ipfs_api_url, None);
        assert_eq!(settings.provider_deadline(), Duration::from_millis(10_000));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "directory_url = \"http://127.0.0.1:9999\"\n\
             ipfs_api_url = \"http://127.0.0.1:5001\"\n\
             provider_timeout_ms = 2500\n\
             [logging]\n\
             level = \"debug\"\n",
        )
        .unwrap();

        let settings = ConfigLoader::load(Some(&path)).unwrap();
        assert_eq!(settings.directory_url, "http://127.0.0.1:9999");
        assert_eq!(settings.ipfs_api_url.as_deref(), Some("http://127.0.0.1:5001"));
        assert_eq!(settings.provider_timeout_ms, 2500);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(ConfigLoader::load(Some(&path)).is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[logging]\nformat = \"text\"\n").unwrap();

        // logging.format is asserted by this test only; parallel tests
        // never read it.
        std::env::set_var("LODESTONE_LOGGING__FORMAT", "json");
        let result = ConfigLoader::load(Some(&path));
        std::env::remove_var("LODESTONE_LOGGING__FORMAT");

        assert_eq!(result.unwrap().logging.format, "json");
    }
}
