pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod rate_limit;
pub mod state;
pub mod upstream;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{MethodRouter, get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use config::{Args, Settings};
pub use error::{ApiError, Result};
pub use state::AppState;

use handlers::{
    chat_handler, cors_middleware, health_handler, helper_handler, method_not_allowed,
    metrics_handler, not_found, preflight_handler, translate_handler, tts_handler,
    upload_handler,
};

// every route answers OPTIONS and turns other methods into a JSON 405
fn api_route(route: MethodRouter<Arc<AppState>>) -> MethodRouter<Arc<AppState>> {
    route.options(preflight_handler).fallback(method_not_allowed)
}

// creating the router with routes
pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.settings.max_body_bytes);

    Router::new()
        .route("/api/health", api_route(get(health_handler)))
        .route("/api/chat", api_route(post(chat_handler)))
        .route("/api/helper", api_route(post(helper_handler)))
        .route("/api/translate", api_route(post(translate_handler)))
        .route("/api/tts", api_route(post(tts_handler)))
        .route("/api/upload", api_route(post(upload_handler)))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .layer(body_limit)
        .layer(middleware::from_fn(cors_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
