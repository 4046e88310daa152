pub mod auth;
pub mod extract;
pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

/// Uploads above the 5 MiB validation limit still need to reach the
/// validator, so the transport limit sits above it.
pub const REQUEST_BODY_LIMIT: usize = 10 * 1024 * 1024;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) if value == "*" => {
                warn!("Ignoring wildcard CORS origin");
                None
            }
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
}

/// Builds the full API router over the given state.
pub fn router(app_state: Arc<AppState>, cors_origins: &[String]) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::login_handler))
        .route("/api/test", get(rest::test_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/upload", post(rest::upload_handler))
        .route("/api/results", get(rest::list_results_handler))
        .route("/api/results/{id}/rating", put(rest::update_rating_handler))
        .route("/api/results/{id}/confidence", put(rest::update_confidence_handler))
        .route("/api/results/{id}", delete(rest::delete_result_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(REQUEST_BODY_LIMIT))
        .layer(cors_layer(cors_origins))
        .with_state(app_state)
}
