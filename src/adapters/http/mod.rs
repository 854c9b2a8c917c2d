//! HTTP adapter - router assembly.
//!
//! Serves the notification socket at the configured path next to a
//! `/health` probe. Every route is wrapped in request ids, tracing and CORS.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use http::HeaderValue;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::adapters::websocket::{notification_router, NotificationSocketState};
use crate::config::ServerConfig;

/// Body of the `/health` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub connections: usize,
    pub channels: usize,
}

async fn health(State(state): State<NotificationSocketState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        connections: state.router.total_connections().await,
        channels: state.router.active_channels().await.len(),
    })
}

/// Builds the CORS layer. No configured origins means any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the application router.
pub fn app_router(state: NotificationSocketState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(notification_router(&server.ws_path))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors_layer(&server.cors_origins_list())),
        )
        .with_state(state)
}
