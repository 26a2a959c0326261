//! API layer -- axum routes, handlers, and middleware.

mod routes;
pub mod state;

use self::state::AppState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the application router with all API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn fallback() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found")
}

/// Handler-level error: domain not-found conditions map to 404, everything
/// else (pool exhaustion, SQLite failures) is a 500.
pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use crate::fleet::FleetError;

        let status = if self.0.downcast_ref::<FleetError>().is_some() {
            StatusCode::NOT_FOUND
        } else {
            tracing::error!(error = %self.0, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = Json(json!({
            "data": null,
            "meta": { "error": self.0.to_string() }
        }));
        (status, body).into_response()
    }
}
