//! Seat routes: inventory and occupancy.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use serde::Deserialize;

use carrel_core::EngineError;
use carrel_core::seat::{AssignSeat, NewSeat};
use carrel_shared::types::{SeatId, StudentId};

use crate::{
    AppState,
    error::ApiError,
    middleware::{ReadScope, WriteContext},
};

/// Creates the seat routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/seats", get(list_seats).post(create_seat))
        .route("/seats/{seat_id}", get(get_seat).delete(delete_seat))
        .route(
            "/seats/{seat_id}/assignment",
            put(assign_seat).delete(unassign_seat),
        )
}

/// Request body for seating a student.
#[derive(Debug, Deserialize)]
pub struct AssignmentRequest {
    /// Student to seat.
    pub student_id: StudentId,
    /// Seat version the client last saw. Stale values fail with 409.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

async fn list_seats(
    State(state): State<AppState>,
    ReadScope(scope): ReadScope,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.list_seats(scope).await?))
}

async fn get_seat(
    State(state): State<AppState>,
    ReadScope(scope): ReadScope,
    Path(seat_id): Path<SeatId>,
) -> Result<impl IntoResponse, ApiError> {
    let seat = state
        .engine
        .get_seat(scope, seat_id)
        .await?
        .ok_or_else(|| EngineError::not_found("seat", seat_id))?;
    Ok(Json(seat))
}

async fn create_seat(
    State(state): State<AppState>,
    WriteContext(ctx): WriteContext,
    Json(payload): Json<NewSeat>,
) -> Result<impl IntoResponse, ApiError> {
    let seat = state.engine.create_seat(&ctx, payload).await?;
    Ok((StatusCode::CREATED, Json(seat)))
}

async fn delete_seat(
    State(state): State<AppState>,
    WriteContext(ctx): WriteContext,
    Path(seat_id): Path<SeatId>,
) -> Result<impl IntoResponse, ApiError> {
    state.engine.delete_seat(&ctx, seat_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT `/seats/{seat_id}/assignment`
///
/// 409 with `seat_conflict` means another request took the seat first.
async fn assign_seat(
    State(state): State<AppState>,
    WriteContext(ctx): WriteContext,
    Path(seat_id): Path<SeatId>,
    Json(payload): Json<AssignmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let seat = state
        .engine
        .assign_seat(
            &ctx,
            AssignSeat {
                student_id: payload.student_id,
                seat_id,
                expected_version: payload.expected_version,
            },
        )
        .await?;
    Ok(Json(seat))
}

async fn unassign_seat(
    State(state): State<AppState>,
    WriteContext(ctx): WriteContext,
    Path(seat_id): Path<SeatId>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.unassign_seat(&ctx, seat_id).await?))
}
