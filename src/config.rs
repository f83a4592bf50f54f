use crate::credentials::Credentials;
use crate::error::{BrowserError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:5001/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    /// Credentials offered in the prompt before the user types anything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            credentials: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_api_url")]
    pub url: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            timeout_secs: None,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BrowserError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| BrowserError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        let url = std::env::var("S3_BROWSER_API_URL").unwrap_or_else(|_| default_api_url());
        let timeout_secs = match std::env::var("S3_BROWSER_TIMEOUT_SECS") {
            Ok(raw) => Some(raw.parse::<u64>().map_err(|e| {
                BrowserError::Config(format!("S3_BROWSER_TIMEOUT_SECS is not a number: {}", e))
            })?),
            Err(_) => None,
        };

        let credentials = match (
            std::env::var("S3_BROWSER_ENDPOINT"),
            std::env::var("S3_BROWSER_ACCESS_KEY"),
            std::env::var("S3_BROWSER_SECRET_KEY"),
        ) {
            (Ok(endpoint), Ok(access_key), Ok(secret_key)) => {
                Some(Credentials::new(endpoint, access_key, secret_key))
            }
            _ => None,
        };

        let config = Config {
            backend: BackendConfig { url, timeout_secs },
            credentials,
        };
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/s3-browser/config.json`, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("s3-browser").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.backend.url).map_err(|e| {
            BrowserError::Config(format!("Invalid API url {}: {}", self.backend.url, e))
        })?;
        Ok(())
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| BrowserError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BrowserError::Config(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        fs::write(path, content)
            .map_err(|e| BrowserError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
