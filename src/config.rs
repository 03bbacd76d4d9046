// src/config.rs
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{ClientError, Result};

pub const DEFAULT_API_BASE: &str = "http://localhost:8080";

/// Runtime configuration for the backend client and the two views.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base: String,
    pub history_interval: Duration,
    pub job_poll_interval: Duration,
    /// How long the simulated advertisement runs before answers appear.
    pub reveal_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            history_interval: Duration::from_millis(10_000),
            job_poll_interval: Duration::from_millis(3_000),
            reveal_delay: Duration::from_millis(3_000),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// On-disk form of the config. Every key is optional and overrides the default.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    api_base: Option<String>,
    history_interval_ms: Option<u64>,
    job_poll_interval_ms: Option<u64>,
    reveal_delay_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
}

impl ClientConfig {
    /// Load configuration: defaults, then the TOML file (explicit path or the
    /// per-user default when it exists), then environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        match path {
            Some(p) => config.apply_file(p)?,
            None => {
                if let Some(p) = default_config_path().filter(|p| p.exists()) {
                    log::debug!("Loading config from {}", p.display());
                    config.apply_file(&p)?;
                }
            }
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)?;
        self.apply_toml(&raw)
    }

    fn apply_toml(&mut self, raw: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(raw)?;

        if let Some(api_base) = file.api_base {
            self.api_base = api_base;
        }
        if let Some(ms) = file.history_interval_ms {
            self.history_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = file.job_poll_interval_ms {
            self.job_poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = file.reveal_delay_ms {
            self.reveal_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.request_timeout_ms {
            self.request_timeout = Duration::from_millis(ms);
        }
        Ok(())
    }

    /// Overrides from `EDUMINT_*` variables. The lookup is injected so tests
    /// do not have to touch the process environment.
    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_base) = lookup("EDUMINT_API_BASE") {
            self.api_base = api_base;
        }
        if let Some(d) = parse_millis(&lookup, "EDUMINT_HISTORY_INTERVAL_MS")? {
            self.history_interval = d;
        }
        if let Some(d) = parse_millis(&lookup, "EDUMINT_POLL_INTERVAL_MS")? {
            self.job_poll_interval = d;
        }
        if let Some(d) = parse_millis(&lookup, "EDUMINT_REVEAL_DELAY_MS")? {
            self.reveal_delay = d;
        }
        Ok(())
    }

    /// Replaces the base URL (e.g. from a command-line flag) and re-validates.
    pub fn with_api_base(mut self, api_base: &str) -> Result<Self> {
        self.api_base = api_base.to_string();
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        let base = self.api_base.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "api_base must be an http(s) URL, got '{}'",
                self.api_base
            )));
        }
        if self.history_interval.is_zero() || self.job_poll_interval.is_zero() {
            return Err(ClientError::Config(
                "Polling intervals must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Joins an API path onto the configured base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base.trim().trim_end_matches('/'), path)
    }
}

fn parse_millis<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| ClientError::Config(format!("{} must be a number of milliseconds, got '{}'", key, raw))),
        None => Ok(None),
    }
}

/// `$CONFIG_DIR/edumint/config.toml`, e.g. `~/.config/edumint/config.toml` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("edumint").join("config.toml"))
}
