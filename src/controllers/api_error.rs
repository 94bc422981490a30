use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::errors::{CatalogError, EstimateError, WeatherError};

/// Handler-level failure, rendered as `{"error": "..."}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Estimate(#[from] EstimateError),

    #[error("geocoding failed: {0}")]
    Geocoding(WeatherError),

    #[error("reload failed: {0}")]
    Reload(CatalogError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Estimate(e) => match e {
                EstimateError::Validation(_) | EstimateError::UnknownPanel(_) => {
                    StatusCode::BAD_REQUEST
                }
                // Bad samples come from upstream; the caller cannot fix them
                EstimateError::Sample(_) | EstimateError::Computation(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                EstimateError::Upstream(_) => StatusCode::BAD_GATEWAY,
                EstimateError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
            },
            ApiError::Geocoding(_) => StatusCode::BAD_GATEWAY,
            ApiError::Reload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
