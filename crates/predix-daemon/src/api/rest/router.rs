//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main router.
///
/// `api` is the externally owned REST router; it is mounted under `/api`
/// and shares the CORS policy.
pub fn create_router(state: AppState, cors_origins: &[String], api: Option<Router>) -> Router {
    // Admission runs before the upgrade extractor sees the request
    let realtime = Router::new()
        .route("/ws", get(handlers::realtime_upgrade))
        .route_layer(middleware::from_fn_with_state(
            state.gateway.clone(),
            handlers::authenticate_handshake,
        ));

    let mut app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::daemon_status))
        .merge(realtime)
        .with_state(state);

    if let Some(api) = api {
        app = app.nest("/api", api);
    }

    app.layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
}

/// Credentialed CORS restricted to an explicit origin list
pub fn cors_layer(origins: &[String]) -> CorsLayer {
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
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
