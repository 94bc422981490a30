use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::info;

use crate::controllers::api_error::ApiError;
use crate::models::panel::PanelRecord;
use crate::services::panel_catalog;
use crate::shared_state::AppState;

const SEARCH_LIMIT: usize = 5;

/// GET /api/solar-panels/search/{panel}
/// Panel model autocomplete
///
/// Case-insensitive substring match over the loaded catalog, at most 5 ids.
#[utoipa::path(
    get,
    path = "/api/solar-panels/search/{panel}",
    params(
        ("panel" = String, Path, description = "Part of a panel model id")
    ),
    responses(
        (status = 200, description = "Matching model ids", body = Vec<String>),
        (status = 400, description = "Empty query")
    )
)]
pub async fn search_panels(
    Path(panel): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    if panel.trim().is_empty() {
        return Err(ApiError::BadRequest("query parameter 'panel' is required".to_string()));
    }
    Ok(Json(state.catalog.search(&panel, SEARCH_LIMIT)))
}

/// GET /api/solar-panels/{panel}
/// Datasheet values for one panel model
#[utoipa::path(
    get,
    path = "/api/solar-panels/{panel}",
    params(
        ("panel" = String, Path, description = "Exact panel model id")
    ),
    responses(
        (status = 200, description = "Panel spec", body = PanelRecord),
        (status = 404, description = "Panel not found")
    )
)]
pub async fn get_panel(
    Path(panel): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PanelRecord>, ApiError> {
    state
        .catalog
        .get_loaded(&panel)
        .map(|spec| Json(PanelRecord::from(spec)))
        .ok_or_else(|| ApiError::NotFound("panel not found".to_string()))
}

/// POST /api/admin/reload
/// Reload the panel catalog from disk
///
/// Requires the `X-Admin-Token` header. The new catalog replaces the old one
/// atomically; requests in flight keep the snapshot they started with.
#[utoipa::path(
    post,
    path = "/api/admin/reload",
    params(
        ("X-Admin-Token" = String, Header, description = "Admin shared secret")
    ),
    responses(
        (status = 204, description = "Catalog reloaded"),
        (status = 401, description = "Missing or wrong admin token"),
        (status = 500, description = "Catalog file could not be loaded")
    )
)]
pub async fn reload_catalog(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let presented = headers.get("x-admin-token").and_then(|v| v.to_str().ok());
    match (state.config.admin_token.as_deref(), presented) {
        (Some(expected), Some(given)) if expected == given => {}
        _ => return Err(ApiError::Unauthorized),
    }

    let panels =
        panel_catalog::load_from_file(&state.config.catalog.path).map_err(ApiError::Reload)?;
    let version = state.catalog.swap(panels);
    info!(version, "Solar panel data reloaded");
    Ok(StatusCode::NO_CONTENT)
}
