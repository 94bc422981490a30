pub mod aggregator;
pub mod estimate_cache;
pub mod open_meteo;
pub mod panel_catalog;
pub mod solar_model;
pub mod timezone;
