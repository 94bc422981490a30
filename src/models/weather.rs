use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ─── Open-Meteo wire types ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HourlyForecastResponse {
    pub timezone: String,
    pub hourly: HourlySeries,
}

/// Parallel arrays as returned by `/v1/forecast?hourly=...`.
#[derive(Debug, Deserialize)]
pub struct HourlySeries {
    pub time: Vec<String>,
    pub temperature_2m: Vec<Option<f64>>,
    pub shortwave_radiation: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeResponse {
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GeocodeResult {
    pub name: String,
    #[serde(default)]
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timezone: String,
}
