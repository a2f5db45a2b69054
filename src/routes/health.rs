//! Health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    pub models_loaded: bool,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    // Re-probe backends that were down at startup
    let models_loaded = state.ready_pipeline().await.is_ok();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "thai-id-ocr-server",
        models_loaded,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
