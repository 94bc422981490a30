use axum::{
    routing::{get, post},
    Router,
};

use crate::controllers::estimate_controller::{estimate, health, location_autocomplete};
use crate::controllers::panel_controller::{get_panel, reload_catalog, search_panels};
use crate::shared_state::AppState;

/// Build the `/api/*` sub-router.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/solar-panels/search/{panel}", get(search_panels))
        .route("/solar-panels/{panel}",        get(get_panel))
        .route("/location/autocomplete",       get(location_autocomplete))
        .route("/solar/estimate",              post(estimate))
        .route("/health",                      get(health))
        .route("/admin/reload",                post(reload_catalog))
        .with_state(state)
}
