pub mod proxy_routes;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::proxy_service::ProxyService;
use proxy_routes::{coach_handler, health_handler};

pub fn build_router(svc: ProxyService) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/coach", post(coach_handler))
        // The app's web build calls the proxy cross-origin.
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(svc)
}
