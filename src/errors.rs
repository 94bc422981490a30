use chrono::{DateTime, FixedOffset};
use thiserror::Error;

/// Input outside the range the thermal/electrical model is valid for.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RangeError {
    #[error("ambient temperature out of range: {0} °C (expected -40..=85)")]
    Ambient(f64),

    #[error("irradiance out of range: {0} W/m² (expected 0..=1200)")]
    Irradiance(f64),
}

/// A single hour of a weather day was rejected by the model.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("hour {}: {source}", .at.to_rfc3339())]
pub struct SampleError {
    pub at: DateTime<FixedOffset>,
    #[source]
    pub source: RangeError,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("panel not found: {0}")]
    NotFound(String),

    #[error("invalid panel spec {id}: {reason}")]
    InvalidSpec { id: String, reason: String },

    #[error("failed to read panel catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse panel catalog: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the upstream Open-Meteo APIs.
#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("empty hourly data")]
    EmptyHourly,

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("cannot parse time {value:?} with tz {tz:?}")]
    TimeParse { value: String, tz: String },

    #[error("request cancelled")]
    Cancelled,
}

/// Cache backend failures. Never surfaced to callers of the estimate pipeline.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum EstimateError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown panel: {0}")]
    UnknownPanel(String),

    #[error("sample rejected: {0}")]
    Sample(#[from] SampleError),

    #[error("weather fetch failed: {0}")]
    Upstream(#[from] WeatherError),

    #[error("computation failed: {0}")]
    Computation(String),

    #[error("estimate cancelled")]
    Cancelled,
}

pub type EstimateResult<T> = Result<T, EstimateError>;
