//! # Routes
//!
//! Axum router configuration for the checkout and fulfillment API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes (each under `/api/payments`, with and without trailing slash):
/// - GET  /health/ - Health check (also at `/health`)
/// - POST /create-preference/ - Create hosted checkout
/// - GET  /validate/ - Redirect confirmation (`payment_id` or `collection_id`)
/// - POST /webhook/ - Provider notification, always 200
/// - GET  /products-check/ - Catalog and file diagnostics
/// - GET  /env-check/ - Configuration presence
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state);

    let payment_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/health/", get(handlers::health))
        .route("/create-preference", post(handlers::create_preference))
        .route("/create-preference/", post(handlers::create_preference))
        .route("/validate", get(handlers::validate_payment))
        .route("/validate/", get(handlers::validate_payment))
        .route("/webhook", post(handlers::payment_webhook))
        .route("/webhook/", post(handlers::payment_webhook))
        .route("/products-check", get(handlers::products_check))
        .route("/products-check/", get(handlers::products_check))
        .route("/env-check", get(handlers::env_check))
        .route("/env-check/", get(handlers::env_check));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/payments", payment_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Production only accepts the storefront origin; elsewhere any origin.
fn cors_layer(state: &AppState) -> CorsLayer {
    let origin = if state.config.is_production() {
        match HeaderValue::from_str(state.config.frontend_url.trim_end_matches('/')) {
            Ok(origin) => AllowOrigin::exact(origin),
            Err(_) => {
                tracing::warn!(
                    "FRONTEND_URL is not a valid origin, allowing any origin: {}",
                    state.config.frontend_url
                );
                AllowOrigin::any()
            }
        }
    } else {
        AllowOrigin::any()
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
