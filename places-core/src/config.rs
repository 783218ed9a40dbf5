use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, time::Duration};

use crate::provider::Platform;

/// Environment variable whose value takes precedence over any key in the file.
pub const API_KEY_ENV: &str = "PLACES_API_KEY";

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// candidate_keys = ["AIza...", "AIza..."]
/// platform = "web"
/// proxy_base_url = "https://app.example.com/api/google"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Consumer supplied key. When present no probing happens.
    pub api_key: Option<String>,

    /// Keys probed in order by `PlacesClient::initialize`.
    pub candidate_keys: Vec<String>,

    pub platform: Platform,

    /// Same-origin proxy used on platforms that cannot reach the provider directly.
    pub proxy_base_url: Option<String>,

    pub base_url: String,

    /// Minimum spacing between reverse-geocode dispatches.
    pub geocode_delay_ms: u64,
    /// Minimum spacing for generic queued calls.
    pub request_delay_ms: u64,
    pub over_query_limit_backoff_ms: u64,
    pub cache_ttl_secs: u64,

    pub debounce_ms: u64,
    pub blur_hide_ms: u64,
    pub autocomplete_radius_m: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            candidate_keys: Vec::new(),
            platform: Platform::Native,
            proxy_base_url: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            geocode_delay_ms: 1000,
            request_delay_ms: 100,
            over_query_limit_backoff_ms: 2000,
            cache_ttl_secs: 300,
            debounce_ms: 300,
            blur_hide_ms: 150,
            autocomplete_radius_m: 50_000,
        }
    }
}

impl Config {
    /// Load config from disk, or return the defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "laundry-places", "places-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.platform == Platform::Web && self.proxy_base_url.is_none() {
            return Err(anyhow!(
                "Platform 'web' needs a proxy_base_url.\n\
                 Hint: run `places configure` and enter the same-origin proxy address."
            ));
        }
        Ok(())
    }

    pub fn set_api_key(&mut self, api_key: Option<String>) {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
    }

    /// Append a candidate key unless it is already listed.
    pub fn upsert_candidate_key(&mut self, api_key: String) {
        if !self.candidate_keys.contains(&api_key) {
            self.candidate_keys.push(api_key);
        }
    }

    /// Consumer supplied key: environment first, then the config file.
    pub fn resolved_api_key(&self) -> Option<String> {
        env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone())
    }

    pub fn is_configured(&self) -> bool {
        self.resolved_api_key().is_some() || !self.candidate_keys.is_empty()
    }

    pub fn geocode_delay(&self) -> Duration {
        Duration::from_millis(self.geocode_delay_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn over_query_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.over_query_limit_backoff_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn blur_hide(&self) -> Duration {
        Duration::from_millis(self.blur_hide_ms)
    }
}

/// First ten characters of a key, enough to tell keys apart in logs.
pub fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(10).collect();
    format!("{prefix}...")
}

/// Provider keys are 39 characters starting with `AIza`; anything else is
/// almost certainly a paste error.
pub fn validate_key_format(key: &str) -> bool {
    key.len() > 30 && key.starts_with("AIza")
}
