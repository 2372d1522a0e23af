use axum::{Json, extract::State};
use serde_json::{Value, json};

use super::{AppError, AppState};
use crate::config::MonitorConfig;

/// Dashboard summary: run state, last check, recent logs, config echo.
pub async fn index(State(state): State<AppState>) -> Json<Value> {
    let status = state.monitor.status();
    let logs = state.monitor.logs();
    let recent: Vec<_> = logs.iter().rev().take(10).rev().cloned().collect();

    Json(json!({
        "status": if status.running { "running" } else { "stopped" },
        "last_check": status.last_check_time,
        "last_check_status": status.last_check_status,
        "configured": status.configured,
        "logs": recent,
        "config": state.monitor.config_summary(),
    }))
}

pub async fn configure(
    State(state): State<AppState>,
    Json(payload): Json<MonitorConfig>,
) -> Result<Json<Value>, AppError> {
    state.monitor.configure(payload)?;
    Ok(Json(json!({ "message": "Configuration updated" })))
}

pub async fn start(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.monitor.clone().start()?;
    Ok(Json(json!({ "message": "Monitoring started" })))
}

pub async fn stop(State(state): State<AppState>) -> Json<Value> {
    state.monitor.stop().await;
    Json(json!({ "message": "Monitoring stopped" }))
}

pub async fn manual_check(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let outcome = state.monitor.manual_check().await?;
    Ok(Json(json!({ "outcome": outcome })))
}

pub async fn get_logs(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "logs": state.monitor.logs() }))
}

pub async fn clear_logs(State(state): State<AppState>) -> Json<Value> {
    state.monitor.clear_logs();
    Json(json!({ "message": "Logs cleared" }))
}

pub async fn test_notification(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let success = state.monitor.test_notification().await?;
    Ok(Json(json!({ "success": success })))
}
