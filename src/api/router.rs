//! HTTP router.
//!
//! `/health` sits at the root; everything else is nested under `/api/` and
//! passes through the rate limiter. Path params use `:param` syntax
//! (matchit 0.7 / axum 0.7).

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::error::ApiError;
use crate::api::middleware;
use crate::api::types::{ApiContext, RateLimiter};
use crate::config::ServerConfig;
use crate::core_state::CoreState;

/// Build the full application router.
pub fn api_router(core: Arc<CoreState>, config: &ServerConfig) -> Router {
    let ctx = ApiContext::new(
        core,
        RateLimiter::new(config.rate_limit, config.rate_window),
        config.trust_proxy,
    );
    build_router(ctx, cors_layer(&config.cors_origins))
}

/// No configured origins means any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".into())
}

fn build_router(ctx: ApiContext, cors: CorsLayer) -> Router {
    // Extension must be outermost so the rate limiter can extract ApiContext.
    let api = Router::new()
        .route(
            "/donors",
            get(endpoints::donors::list).post(endpoints::donors::create),
        )
        .route(
            "/recipients",
            get(endpoints::recipients::list).post(endpoints::recipients::create),
        )
        .route(
            "/inventory",
            get(endpoints::inventory::list).post(endpoints::inventory::create),
        )
        .route("/inventory/deduct", post(endpoints::inventory::deduct))
        .route(
            "/requests",
            get(endpoints::requests::list).post(endpoints::requests::create),
        )
        .route("/requests/:id/resolve", post(endpoints::requests::resolve))
        .route("/requests/:id/approve", put(endpoints::requests::approve))
        .route("/requests/:id/reject", put(endpoints::requests::reject))
        .route("/requests/:id/fulfil", put(endpoints::requests::fulfil))
        .route(
            "/load-and-process-requests",
            post(endpoints::processing::load_and_process),
        )
        .route("/stats", get(endpoints::stats::dashboard))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx)
        .nest("/api", api)
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
