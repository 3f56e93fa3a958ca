pub mod auth;
pub mod error;
mod extract;
mod fasts;
mod goals;
pub mod rate_limit;
mod stats;
pub mod validation;

use axum::{
    http::{
        header::{self, HeaderName},
        HeaderValue, Method,
    },
    middleware,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::CorsConfig;
use crate::AppState;
use error::ApiError;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public, rate limited)
    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/verify", get(auth::verify))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    // Protected API routes
    let api_routes = Router::new()
        // Fasting sessions
        .route("/fasts", get(fasts::list_fasts))
        .route("/fasts/start", post(fasts::start_fast))
        .route("/fasts/:id", get(fasts::get_fast))
        .route("/fasts/:id", patch(fasts::edit_fast))
        .route("/fasts/:id", delete(fasts::delete_fast))
        .route("/fasts/:id/stop", patch(fasts::stop_fast))
        // Goals
        .route("/goals", get(goals::list_goals))
        .route("/goals", post(goals::create_goal))
        .route("/goals/:id", get(goals::get_goal))
        .route("/goals/:id", patch(goals::update_goal))
        .route("/goals/:id", delete(goals::delete_goal))
        // Stats
        .route("/stats/weekly", get(stats::weekly))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let cors = cors_layer(&state.config.cors);

    Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth_routes)
        .merge(api_routes)
        .method_not_allowed_fallback(route_not_found)
        .fallback(route_not_found)
        .layer(security_header(
            header::X_CONTENT_TYPE_OPTIONS,
            "nosniff",
        ))
        .layer(security_header(header::X_FRAME_OPTIONS, "SAMEORIGIN"))
        .layer(security_header(header::REFERRER_POLICY, "no-referrer"))
        .layer(security_header(
            HeaderName::from_static("cross-origin-resource-policy"),
            "same-origin",
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

fn security_header(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(name, HeaderValue::from_static(value))
}

/// Any origin when none are configured; otherwise exactly the configured
/// origins, with credentials allowed.
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
