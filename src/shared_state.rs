use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::services::estimate_cache::{EstimateCache, InMemoryStore};
use crate::services::open_meteo::{OpenMeteoClient, WeatherSource};
use crate::services::panel_catalog::PanelCatalog;

/// Everything the request handlers share.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Hot-swappable panel catalog; replaced wholesale by the admin reload
    pub catalog: Arc<PanelCatalog>,
    pub cache: Arc<EstimateCache>,
    pub weather: Arc<dyn WeatherSource>,
    pub open_meteo: OpenMeteoClient,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, catalog: PanelCatalog, open_meteo: OpenMeteoClient) -> Self {
        let cache = if config.cache.enabled {
            EstimateCache::new(Arc::new(InMemoryStore::new(config.cache.max_entries)))
        } else {
            EstimateCache::disabled()
        };

        Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            cache: Arc::new(cache),
            weather: Arc::new(open_meteo.clone()),
            open_meteo,
            started_at: Instant::now(),
        }
    }

    #[cfg(test)]
    pub fn with_weather(mut self, weather: Arc<dyn WeatherSource>) -> Self {
        self.weather = weather;
        self
    }
}
