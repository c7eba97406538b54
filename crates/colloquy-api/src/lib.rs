pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        // One-shot relay
        .route("/chat", post(handlers::relay::chat))
        // Persistent channel
        .route("/ws", get(handlers::relay::ws_handler))
        // Memory toggle
        .route(
            "/threads/:thread_id/memory",
            patch(routes::memory::toggle_memory),
        );

    Router::new()
        .merge(api_routes)
        .layer(axum::middleware::from_fn(middleware::logging::log_request))
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(300)))
        .layer(build_cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors.enabled {
        let cors = CorsLayer::new()
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PATCH,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(Any);

        if config.cors.origins.iter().any(|o| o == "*") {
            cors.allow_origin(Any)
        } else {
            let parsed_origins: Vec<axum::http::HeaderValue> = config
                .cors
                .origins
                .iter()
                .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
                .collect();

            cors.allow_origin(parsed_origins)
        }
    } else {
        CorsLayer::permissive()
    }
}
