use axum::http::{HeaderValue, Method};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::signaling::debug;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState, config: &Config) -> Router {
    // WebSocket signaling endpoint
    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    // Health check
    let health = Router::new().route("/health", axum::routing::get(health_check));

    let mut router = Router::new().merge(ws_routes).merge(health);

    // Read-only room introspection. Do not expose in production without auth.
    if config.debug_endpoints {
        let debug_routes = Router::new()
            .route("/v1/rooms", axum::routing::get(debug::list_rooms))
            .route(
                "/v1/rooms/{room_id}/debug",
                axum::routing::get(debug::room_debug),
            );
        router = router.merge(debug_routes);
    }

    router
        .layer(cors_layer(&config.client_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for browser clients: "*" allows any origin, anything else is matched exactly.
fn cors_layer(client_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods([Method::GET, Method::POST]);
    if client_origin == "*" {
        return cors.allow_origin(Any);
    }
    match HeaderValue::from_str(client_origin) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!(
                client_origin = %client_origin,
                "Invalid CORS origin, cross-origin requests will be rejected"
            );
            cors
        }
    }
}

/// Basic health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
