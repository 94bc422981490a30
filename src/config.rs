use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

fn default_port() -> u16 { 8080 }
fn default_catalog_path() -> String { "data/solar_panel_data.json".to_string() }
fn default_forecast_url() -> String { "https://api.open-meteo.com/v1/forecast".to_string() }
fn default_geocoding_url() -> String { "https://geocoding-api.open-meteo.com/v1/search".to_string() }
fn default_weather_timeout_secs() -> u64 { 5 }
fn default_user_agent() -> String { format!("solar-yield-estimator/{}", env!("CARGO_PKG_VERSION")) }
fn default_cache_enabled() -> bool { true }
fn default_max_entries() -> usize { 10_000 }
fn default_request_timeout_secs() -> u64 { 15 }

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Shared secret for `POST /api/admin/reload`; reload is refused while unset.
    #[serde(default)]
    pub admin_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,
    #[serde(default = "default_weather_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            catalog: CatalogConfig::default(),
            weather: WeatherConfig::default(),
            cache: CacheConfig::default(),
            request_timeout_secs: default_request_timeout_secs(),
            admin_token: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self { path: default_catalog_path() }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            forecast_url: default_forecast_url(),
            geocoding_url: default_geocoding_url(),
            timeout_secs: default_weather_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            max_entries: default_max_entries(),
        }
    }
}

impl Config {
    /// Reads `path` if it exists (defaults otherwise), then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            info!(path = %path.display(), "No config file, using defaults");
            Config::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// `ADMIN_TOKEN_SECRET`, `BACKEND_PORT` and `PANEL_DATA_PATH` win over the file.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("ADMIN_TOKEN_SECRET") {
            self.admin_token = Some(token);
        }
        if let Some(port) = lookup("BACKEND_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("BACKEND_PORT is not a port number: {port:?}"))?;
        }
        if let Some(path) = lookup("PANEL_DATA_PATH") {
            self.catalog.path = path;
        }
        // An empty secret would let an empty header through
        if self.admin_token.as_deref().is_some_and(|t| t.is_empty()) {
            self.admin_token = None;
        }
        Ok(())
    }
}
