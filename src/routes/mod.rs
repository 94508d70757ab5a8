pub mod health;
pub mod results;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::middleware::{cors::read_only_cors, rate_limit};
use crate::AppState;

pub fn router(state: AppState) -> Router {
    let results_api = Router::new()
        .route("/api/schedules/:id/results", get(results::get_results))
        .route(
            "/api/schedules/:id/results/export",
            get(results::export_results),
        )
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::RateLimiter::new(state.config.public_rps),
            rate_limit::rps_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(results_api)
        .with_state(state)
        .layer(read_only_cors())
        .layer(TraceLayer::new_for_http())
}
