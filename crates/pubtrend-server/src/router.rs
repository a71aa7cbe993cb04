//! Router configuration and route composition.

use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{categories, health, sync, trends};
use crate::state::AppState;

/// Creates the application router with all routes and middleware.
pub fn create_router(state: AppState, cors_origins: &str) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/sync", post(sync::trigger_sync))
        .route("/sync/status", get(sync::get_sync_status))
        .route("/categories", get(categories::list_categories))
        .route(
            "/categories/:id/counts",
            get(categories::get_category_counts),
        )
        .route("/categories/:id/stats", get(categories::get_category_stats))
        .route("/trends", get(trends::get_trends));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origins))
        .with_state(state)
}

/// `"*"` allows any origin; anything else is a comma-separated list.
/// Entries that are not valid header values are ignored.
fn build_cors_layer(origins: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600));

    if origins.trim() == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        cors.allow_origin(parse_origins(origins))
    }
}

fn parse_origins(origins: &str) -> Vec<HeaderValue> {
    origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}
