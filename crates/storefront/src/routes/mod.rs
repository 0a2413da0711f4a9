//! Edge server routes.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health          - Liveness check
//! GET  /health/ready    - Readiness check (static bundle present, backend reachable)
//! *    /*               - Built web bundle, behind the route guard
//! ```

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::{AppError, Result};
use crate::middleware::route_guard_middleware;
use crate::state::AppState;

/// Build the edge server application.
pub fn router(state: AppState) -> Router {
    let bundle = ServeDir::new(&state.config().static_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .fallback_service(bundle)
        .layer(from_fn_with_state(state.clone(), route_guard_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Fails if the web bundle directory is missing or the backend does not
/// answer the category list.
async fn readiness(State(state): State<AppState>) -> Result<StatusCode> {
    let static_dir = &state.config().static_dir;
    if !tokio::fs::try_exists(static_dir).await.unwrap_or(false) {
        return Err(AppError::Internal(format!(
            "static bundle missing at {}",
            static_dir.display()
        )));
    }

    state.catalog().categories().await?;
    Ok(StatusCode::OK)
}
