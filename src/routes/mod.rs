//! Route modules for the Thai ID OCR server

pub mod extract;
pub mod health;

use axum::{http::HeaderValue, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config().server);
    let max_upload_bytes = state.config().max_upload_bytes();

    Router::new()
        .merge(health::router())
        .merge(extract::router(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origin = match config.cors_allow_origin.as_deref() {
        None => AllowOrigin::any(),
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(value) => AllowOrigin::exact(value),
            Err(e) => {
                tracing::warn!("Invalid CORS_ALLOW_ORIGIN '{}': {}, allowing any origin", origin, e);
                AllowOrigin::any()
            }
        },
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
