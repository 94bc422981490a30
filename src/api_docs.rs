use utoipa::OpenApi;
use crate::controllers::{estimate_controller, panel_controller};
use crate::models::{estimate, panel, weather};

#[derive(OpenApi)]
#[openapi(
    paths(
        estimate_controller::estimate,
        estimate_controller::location_autocomplete,
        estimate_controller::health,
        panel_controller::search_panels,
        panel_controller::get_panel,
        panel_controller::reload_catalog
    ),
    components(
        schemas(
            estimate::EstimateRequest,
            estimate::DayEstimate,
            estimate::HourlyEstimatePoint,
            estimate::HealthStatus,
            panel::PanelRecord,
            weather::GeocodeResult
        )
    ),
    tags(
        (name = "solar-yield-estimator", description = "Daily PV energy estimates from hourly forecasts")
    )
)]
pub struct ApiDoc;
