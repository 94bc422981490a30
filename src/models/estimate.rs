use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ─── Weather input ───────────────────────────────────────────────────────────

/// One hourly weather observation in the day's local time.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlySample {
    pub local_timestamp: DateTime<FixedOffset>,
    pub ambient_temp_c: f64,
    pub irradiance_ghi_w_m2: f64,
}

/// A single calendar day of hourly samples, chronological.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherDay {
    pub timezone_id: String,
    pub hours: Vec<HourlySample>,
}

// ─── Estimate output ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HourlyEstimatePoint {
    #[serde(rename = "time")]
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: DateTime<FixedOffset>,
    #[serde(rename = "ambient")]
    pub ambient_temp_c: f64,
    pub ghi: f64,
    #[serde(rename = "energyWh")]
    pub energy_wh_base: f64,
    #[serde(rename = "energyWhLow")]
    pub energy_wh_low: f64,
    #[serde(rename = "energyWhHigh")]
    pub energy_wh_high: f64,
    #[serde(rename = "cumulativeWh")]
    pub cumulative_base: f64,
    #[serde(rename = "cumulativeLow")]
    pub cumulative_low: f64,
    #[serde(rename = "cumulativeHigh")]
    pub cumulative_high: f64,
}

/// Bounded energy estimate for one panel, one site and one local calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DayEstimate {
    #[serde(rename = "panel")]
    pub panel_id: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "timezone")]
    pub timezone_id: String,
    #[serde(rename = "date")]
    #[schema(value_type = String, format = Date)]
    pub calendar_date: NaiveDate,
    #[serde(rename = "totalWh")]
    pub total_wh_base: f64,
    #[serde(rename = "totalLowWh")]
    pub total_wh_low: f64,
    #[serde(rename = "totalHighWh")]
    pub total_wh_high: f64,
    pub points: Vec<HourlyEstimatePoint>,
}

/// Whether an estimate payload came from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_header_value(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A day estimate as handed back by the cache layer.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimatePayload {
    /// JSON bytes, exactly as stored in (or read from) the cache
    Encoded(Vec<u8>),
    /// Computed but not encodable for the cache; encoded again for the response
    Fresh(Box<DayEstimate>),
}

impl EstimatePayload {
    pub fn into_bytes(self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            EstimatePayload::Encoded(bytes) => Ok(bytes),
            EstimatePayload::Fresh(estimate) => serde_json::to_vec(&estimate),
        }
    }
}

/// Day estimate plus where it came from.
#[derive(Debug, Clone)]
pub struct EstimateOutcome {
    pub payload: EstimatePayload,
    pub status: CacheStatus,
}

// ─── REST API types ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EstimateRequest {
    pub panel: String,
    pub lat: f64,
    pub lon: f64,
    /// IANA zone id; derived from the coordinates when omitted
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub panels_loaded: usize,
    pub catalog_version: u64,
}
