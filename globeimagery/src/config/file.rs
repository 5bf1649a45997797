//! Configuration file handling for ~/.globeimagery/config.ini.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ini::Ini;
use thiserror::Error;

use crate::provider::{GoogleEarthConfig, DEFAULT_TIMEOUT_SECS};
use crate::proxy::DefaultProxy;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// A value needed to build a provider is not set
    #[error("Missing configuration: {section}.{key}")]
    MissingValue { section: String, key: String },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

/// `[provider]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    pub url: Option<String>,
    pub channel: Option<u32>,
    pub path: Option<String>,
    pub proxy: Option<String>,
}

/// `[http]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub provider: ProviderSettings,
    pub http: HttpSettings,
}

impl ConfigFile {
    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let mut ini = Ini::new();
        {
            let mut section = ini.with_section(Some("provider"));
            if let Some(url) = &self.provider.url {
                section.set("url", url);
            }
            if let Some(channel) = self.provider.channel {
                section.set("channel", channel.to_string());
            }
            if let Some(path) = &self.provider.path {
                section.set("path", path);
            }
            if let Some(proxy) = &self.provider.proxy {
                section.set("proxy", proxy);
            }
        }
        ini.with_section(Some("http"))
            .set("timeout", self.http.timeout.to_string());

        ini.write_to_file(path)
            .map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Builds provider options from the `[provider]` section.
    ///
    /// `url` and `channel` must be set. A `proxy` value becomes a
    /// [`DefaultProxy`].
    pub fn provider_config(&self) -> Result<GoogleEarthConfig, ConfigFileError> {
        let url = self
            .provider
            .url
            .clone()
            .ok_or_else(|| missing("provider", "url"))?;
        let channel = self
            .provider
            .channel
            .ok_or_else(|| missing("provider", "channel"))?;

        let mut config = GoogleEarthConfig::new(url).with_channel(channel);
        if let Some(path) = &self.provider.path {
            config = config.with_path(path.clone());
        }
        if let Some(proxy) = &self.provider.proxy {
            config = config.with_proxy(Arc::new(DefaultProxy::new(proxy.clone())));
        }
        Ok(config)
    }
}

fn missing(section: &str, key: &str) -> ConfigFileError {
    ConfigFileError::MissingValue {
        section: section.to_string(),
        key: key.to_string(),
    }
}

/// Get the path to the config directory (~/.globeimagery).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".globeimagery")
}

/// Get the path to the config file (~/.globeimagery/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::Proxy;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert!(config.provider.url.is_none());
        assert!(config.provider.channel.is_none());
        assert_eq!(config.http.timeout, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.ini");

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_config_file_path() {
        let path = config_file_path();
        assert!(path.ends_with(".globeimagery/config.ini"));
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.ini");

        let config = ConfigFile {
            provider: ProviderSettings {
                url: Some("http://example.invalid".into()),
                channel: Some(1234),
                path: Some("/maps".into()),
                proxy: Some("/proxy/".into()),
            },
            http: HttpSettings { timeout: 5 },
        };
        config.save_to(&config_path).unwrap();

        assert_eq!(ConfigFile::load_from(&config_path).unwrap(), config);
    }

    #[test]
    fn test_provider_config() {
        let config = ConfigFile {
            provider: ProviderSettings {
                url: Some("http://example.invalid".into()),
                channel: Some(1234),
                path: None,
                proxy: Some("/proxy/".into()),
            },
            ..ConfigFile::default()
        };

        let provider = config.provider_config().unwrap();
        assert_eq!(provider.url.as_deref(), Some("http://example.invalid"));
        assert_eq!(provider.channel, Some(1234));
        assert!(provider.path.is_none());
        assert_eq!(
            provider.proxy.unwrap().get_url("a b"),
            DefaultProxy::new("/proxy/").get_url("a b")
        );
    }

    #[test]
    fn test_provider_config_requires_channel() {
        let config = ConfigFile {
            provider: ProviderSettings {
                url: Some("http://example.invalid".into()),
                ..ProviderSettings::default()
            },
            ..ConfigFile::default()
        };

        let err = config.provider_config().unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::MissingValue { ref key, .. } if key == "channel"
        ));
    }
}
