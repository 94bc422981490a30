use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use utoipa::IntoParams;

use crate::controllers::api_error::ApiError;
use crate::errors::{CatalogError, EstimateError};
use crate::models::estimate::{DayEstimate, EstimateRequest, HealthStatus};
use crate::models::weather::GeocodeResult;
use crate::services::estimate_cache::EstimateQuery;
use crate::services::timezone;
use crate::shared_state::AppState;

/// Cancellation token for one request: fires when the deadline passes or the
/// handler is dropped.
struct RequestDeadline {
    token: CancellationToken,
    timer: JoinHandle<()>,
}

impl RequestDeadline {
    fn start(timeout: Duration) -> Self {
        let token = CancellationToken::new();
        let timer = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                token.cancel();
            })
        };
        Self { token, timer }
    }
}

impl Drop for RequestDeadline {
    fn drop(&mut self) {
        self.timer.abort();
        self.token.cancel();
    }
}

/// POST /api/solar/estimate
/// Estimate today's energy yield for a panel at a location
///
/// The day is the current calendar day in the requested (or derived) timezone.
/// Results are cached until local midnight; the `X-Cache` header reports HIT or MISS.
#[utoipa::path(
    post,
    path = "/api/solar/estimate",
    request_body = EstimateRequest,
    responses(
        (status = 200, description = "Hourly and total energy estimate", body = DayEstimate,
            headers(("X-Cache" = String, description = "HIT or MISS"))),
        (status = 400, description = "Malformed body, unknown panel or coordinates out of range"),
        (status = 500, description = "Weather data rejected by the model"),
        (status = 502, description = "Weather fetch failed"),
        (status = 504, description = "Request deadline exceeded")
    )
)]
pub async fn estimate(
    State(state): State<AppState>,
    body: Result<Json<EstimateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(format!("bad json: {}", e.body_text())))?;

    let spec = state.catalog.lookup(&req.panel).map_err(|e| match e {
        CatalogError::NotFound(id) => EstimateError::UnknownPanel(id),
        other => EstimateError::Validation(other.to_string()),
    })?;
    validate_coordinates(req.lat, req.lon)?;

    let zone = timezone::resolve(req.timezone.as_deref(), req.lat, req.lon);
    let now = Utc::now();
    let query = EstimateQuery {
        lat: req.lat,
        lon: req.lon,
        tz: zone.tz,
        date: timezone::local_date(&zone.tz, now),
    };
    info!(
        panel = %req.panel,
        lat = req.lat,
        lon = req.lon,
        timezone = zone.name(),
        zone_source = zone.source.as_str(),
        date = %query.date,
        "Estimate requested"
    );

    let deadline = RequestDeadline::start(Duration::from_secs(state.config.request_timeout_secs));
    let outcome = state
        .cache
        .estimate(&spec, state.weather.as_ref(), &query, now, &deadline.token)
        .await?;
    let body = outcome
        .payload
        .into_bytes()
        .map_err(|e| EstimateError::Computation(format!("serializing estimate: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (
                header::HeaderName::from_static("x-cache"),
                HeaderValue::from_static(outcome.status.as_header_value()),
            ),
        ],
        body,
    )
        .into_response())
}

fn validate_coordinates(lat: f64, lon: f64) -> Result<(), EstimateError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(EstimateError::Validation(format!(
            "lat/lon out of range: {lat}, {lon}"
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AutocompleteParams {
    /// Partial place name (at least 2 characters)
    #[serde(default)]
    pub q: String,
}

/// GET /api/location/autocomplete
/// Place-name suggestions
///
/// Returns at most 5 geocoding matches, each with coordinates and IANA timezone.
#[utoipa::path(
    get,
    path = "/api/location/autocomplete",
    params(AutocompleteParams),
    responses(
        (status = 200, description = "Matching places", body = Vec<GeocodeResult>),
        (status = 502, description = "Geocoding failed")
    )
)]
pub async fn location_autocomplete(
    State(state): State<AppState>,
    Query(params): Query<AutocompleteParams>,
) -> Result<Json<Vec<GeocodeResult>>, ApiError> {
    let deadline = RequestDeadline::start(Duration::from_secs(state.config.request_timeout_secs));
    let results = state
        .open_meteo
        .geocode(&params.q, &deadline.token)
        .await
        .map_err(ApiError::Geocoding)?;
    Ok(Json(results))
}

/// GET /api/health
/// Liveness and catalog status
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up", body = HealthStatus)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let snapshot = state.catalog.snapshot();
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        panels_loaded: snapshot.len(),
        catalog_version: snapshot.version,
    })
}
