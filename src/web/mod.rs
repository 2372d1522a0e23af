//! Thin HTTP front-end over the monitor's control surface.

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::monitor::Monitor;

pub mod error;
pub mod routes;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::index))
        .route("/configure", post(routes::configure))
        .route("/start", post(routes::start))
        .route("/stop", post(routes::stop))
        .route("/check", post(routes::manual_check))
        .route("/logs", get(routes::get_logs))
        .route("/logs/clear", post(routes::clear_logs))
        .route("/test", post(routes::test_notification))
        .layer(cors)
        .with_state(state)
}
