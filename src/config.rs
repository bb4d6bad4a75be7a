//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Explicit path (`--config` or `MEMBERKIT_CONFIG`)
//! 2. Current directory: ./memberkit.toml or ./.memberkit/config.toml
//! 3. User config: ~/.memberkit/config.toml
//! 4. Built-in defaults
//!
//! `MEMBERKIT_BASE_URL` overrides the configured base URL after loading.

use crate::dispatch::Encoding;
use crate::env;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub headers: HeaderConfig,
    pub conventions: ResponseConventions,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub login_endpoint: String,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub user_agent: String,
    pub default_encoding: Encoding,
}

/// Names of the headers attached to authenticated calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub credential: String,
    pub identity: String,
}

/// Field names the backend uses in its JSON responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConventions {
    pub error_field: String,
    pub ok_field: String,
    pub identity_field: String,
    pub credential_field: String,
    pub generic_error_message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Session file; `None` means `~/.memberkit/session.json`.
    pub path: Option<PathBuf>,
    /// Keep the session in memory only.
    pub ephemeral: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://app.example.org/api/".to_string(),
            login_endpoint: env::wire::LOGIN_ENDPOINT.to_string(),
            request_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            user_agent: format!("memberkit/{}", env!("CARGO_PKG_VERSION")),
            default_encoding: Encoding::Json,
        }
    }
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            credential: env::wire::CREDENTIAL_HEADER.to_string(),
            identity: env::wire::IDENTITY_HEADER.to_string(),
        }
    }
}

impl Default for ResponseConventions {
    fn default() -> Self {
        Self {
            error_field: env::wire::ERROR_FIELD.to_string(),
            ok_field: env::wire::OK_FIELD.to_string(),
            identity_field: env::wire::IDENTITY_FIELD.to_string(),
            credential_field: env::wire::CREDENTIAL_FIELD.to_string(),
            generic_error_message: crate::error::GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Parsed base URL, always ending with `/` so endpoints join below it.
    pub fn base(&self) -> Result<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw).with_context(|| format!("invalid base URL: {}", self.base_url))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(anyhow!("unsupported base URL scheme: {}", other)),
        }
    }
}

impl StorageConfig {
    /// Resolved session file location.
    pub fn session_file(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => env::home_dir()
                .map(|home| env::user_session_file_path(&home))
                .ok_or_else(|| anyhow!("Could not determine home directory for the session file")),
        }
    }
}

impl ClientConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ClientConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Discover, load, apply environment overrides and validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(env::vars::CONFIG_PATH).ok().map(PathBuf::from))
        {
            Some(path) => {
                info!("Loading configuration from: {:?}", path);
                Self::from_toml_file(path)?
            }
            None => ConfigDiscovery::discover_config()?,
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var(env::vars::BASE_URL)
            && !base_url.trim().is_empty()
        {
            debug!("Base URL overridden by {}", env::vars::BASE_URL);
            self.api.base_url = base_url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.api.base()?;
        if self.headers.credential.trim().is_empty() || self.headers.identity.trim().is_empty() {
            return Err(anyhow!("header names must not be empty"));
        }
        if self.api.request_timeout_ms == 0 {
            return Err(anyhow!("api.request_timeout_ms must be greater than zero"));
        }
        Ok(())
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<ClientConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return ClientConfig::from_toml_file(config_path);
        }

        info!("No configuration file found, using defaults");
        Ok(ClientConfig::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        for candidate in Self::config_candidates() {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Configuration file candidates in priority order
    pub fn config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std::env::current_dir() {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = env::home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        candidates
    }
}
