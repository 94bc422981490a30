pub mod api_error;
pub mod estimate_controller;
pub mod panel_controller;
