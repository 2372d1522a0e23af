use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::config::ConfigError;
use crate::monitor::MonitorError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Monitor(MonitorError::AlreadyRunning)
            | AppError::Monitor(MonitorError::ConfigLocked) => StatusCode::CONFLICT,
            AppError::Monitor(_) | AppError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        };
        let message = self.to_string();
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
