//! Client configuration.
//!
//! Holds the scanner address, the login name and where the session token is
//! kept. The password is never part of the configuration.
//!
//! Configuration is stored at `~/.config/pynessus/config.json`; `NESSUS_*`
//! environment variables override individual fields.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::transport::DEFAULT_TIMEOUT_SECS;
use crate::api::HttpTransport;
use crate::auth::{Credentials, FileTokenCache, DEFAULT_TOKEN_FILE};

/// Application name used for the config directory path
const APP_NAME: &str = "pynessus";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Port the scanner's XML API listens on out of the box
pub const DEFAULT_PORT: u16 = 8834;

const ENV_SERVER: &str = "NESSUS_SERVER";
const ENV_PORT: &str = "NESSUS_PORT";
const ENV_USERNAME: &str = "NESSUS_USERNAME";
const ENV_TOKEN_FILE: &str = "NESSUS_TOKEN_FILE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub token_file: PathBuf,
    pub accept_invalid_certs: bool,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: None,
            port: DEFAULT_PORT,
            username: None,
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            accept_invalid_certs: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Config file (if any) with environment overrides applied
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_file() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Override fields from `lookup` (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(server) = lookup(ENV_SERVER) {
            self.server = Some(server);
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("{} is not a valid port: {}", ENV_PORT, port))?;
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            self.username = Some(username);
        }
        if let Some(token_file) = lookup(ENV_TOKEN_FILE) {
            self.token_file = PathBuf::from(token_file);
        }
        Ok(())
    }

    pub fn credentials(&self, password: impl Into<String>) -> Result<Credentials> {
        let server = self
            .server
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No scanner configured (set {})", ENV_SERVER))?;
        let username = self
            .username
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No username configured (set {})", ENV_USERNAME))?;
        Ok(Credentials::new(server, self.port, username, password))
    }

    pub fn token_cache(&self) -> FileTokenCache {
        FileTokenCache::new(self.token_file.clone())
    }

    pub fn transport(&self) -> Result<HttpTransport> {
        HttpTransport::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .context("Failed to create HTTP client")
    }
}
