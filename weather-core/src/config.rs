use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::error::WeatherError;

pub const DEFAULT_WEATHER_URL: &str = "https://api.open-meteo.com/v1";
pub const DEFAULT_GEOCODING_URL: &str = "https://secure.geonames.org";

/// Weather endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    /// How long a current-weather snapshot is served from cache.
    pub cache_ttl_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_WEATHER_URL.to_string(), cache_ttl_secs: 300 }
    }
}

/// Geocoding endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub base_url: String,
    /// GeoNames account name, required by the search endpoint.
    pub username: Option<String>,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_GEOCODING_URL.to_string(), username: None }
    }
}

/// User preferences persisted across sessions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub use_metric: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self { use_metric: true }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// request_timeout_secs = 15
///
/// [geocoding]
/// username = "my-account"
///
/// [preferences]
/// use_metric = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub request_timeout_secs: u64,
    pub weather: WeatherConfig,
    pub geocoding: GeocodingConfig,
    pub preferences: Preferences,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout_secs: 15,
            weather: WeatherConfig::default(),
            geocoding: GeocodingConfig::default(),
            preferences: Preferences::default(),
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Out-of-range values saturate to the longest representable TTL.
    pub fn cache_ttl(&self) -> chrono::Duration {
        i64::try_from(self.weather.cache_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// GeoNames username, or a hint on how to set one.
    pub fn geonames_username(&self) -> Result<&str, WeatherError> {
        self.geocoding.username.as_deref().filter(|u| !u.is_empty()).ok_or_else(|| {
            WeatherError::Config(
                "No GeoNames username configured.\n\
                 Hint: run `weather configure` and enter your GeoNames account name."
                    .to_string(),
            )
        })
    }

    pub fn set_geonames_username(&mut self, username: String) {
        self.geocoding.username = Some(username);
    }

    pub fn set_use_metric(&mut self, use_metric: bool) {
        self.preferences.use_metric = use_metric;
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
