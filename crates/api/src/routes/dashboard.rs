//! Dashboard routes.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};

use super::today;
use crate::{AppState, error::ApiError, middleware::ReadScope};

/// Creates the dashboard routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(get_dashboard_summary))
}

/// GET `/dashboard`
///
/// Computed from current state on every call.
async fn get_dashboard_summary(
    State(state): State<AppState>,
    ReadScope(scope): ReadScope,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state.engine.dashboard_summary(scope, today()).await?;
    Ok(Json(summary))
}
