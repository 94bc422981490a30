mod routes;
mod controllers;
mod services;
mod models;
mod api_docs;
mod shared_state;
mod config;
mod errors;

use std::net::SocketAddr;
use axum::{Router, routing::get, response::Html};
use crate::routes::api_routes::api_routes;
use utoipa::OpenApi;
use utoipa_scalar::Scalar;
use crate::api_docs::ApiDoc;
use crate::shared_state::AppState;
use crate::config::Config;
use crate::services::open_meteo::OpenMeteoClient;
use crate::services::panel_catalog::{self, PanelCatalog};

use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("solar_yield_estimator=info,tower_http=info")),
        )
        .init();

    // 1. Load configuration
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = Config::load(&config_path)?;
    info!(
        path = %config_path,
        port = config.server.port,
        cache = config.cache.enabled,
        "Configuration loaded"
    );
    if config.admin_token.is_none() {
        warn!("No admin token configured; catalog reload is disabled");
    }

    // 2. Load the panel catalog; the built-in defaults still answer if this fails
    let catalog = match panel_catalog::load_from_file(&config.catalog.path) {
        Ok(panels) => {
            info!(path = %config.catalog.path, panels = panels.len(), "Solar panel data loaded");
            PanelCatalog::new(panels)
        }
        Err(e) => {
            warn!(path = %config.catalog.path, error = %e, "Panel catalog unavailable, serving defaults only");
            PanelCatalog::empty()
        }
    };

    // 3. Shared state
    let open_meteo = OpenMeteoClient::new(&config.weather)?;
    let server_port = config.server.port;
    let state = AppState::new(config, catalog, open_meteo);

    // 4. Start Axum HTTP server
    let app = Router::new()
        .nest("/api", api_routes(state))
        .route("/scalar", get(|| async {
            Html(Scalar::new(ApiDoc::openapi()).to_html())
        }))
        .fallback_service(ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], server_port));
    info!("API Server listening on http://{}", addr);
    info!("Scalar UI: http://{}/scalar", addr);

    axum_server::bind(addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
