//! Payment journal routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;

use carrel_shared::types::StudentId;

use crate::{AppState, error::ApiError, middleware::ReadScope};

/// Creates the payment routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new().route("/payments", get(list_payments))
}

/// Query parameters for listing payments.
#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    /// Only this student's payments.
    pub student_id: Option<StudentId>,
}

async fn list_payments(
    State(state): State<AppState>,
    ReadScope(scope): ReadScope,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let payments = state
        .engine
        .list_payments(scope, query.student_id)
        .await?;
    Ok(Json(payments))
}
