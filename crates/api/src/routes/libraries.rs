//! Library (tenant) routes. Superadmin only.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;

use carrel_core::EngineError;
use carrel_shared::types::LibraryId;

use crate::{AppState, error::ApiError, middleware::Session};

/// Creates the library routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/libraries", get(list_libraries).post(create_library))
        .route(
            "/libraries/{library_id}",
            get(get_library).delete(delete_library),
        )
}

/// Request body for creating a library.
#[derive(Debug, Deserialize)]
pub struct CreateLibraryRequest {
    /// Display name.
    pub name: String,
}

/// GET `/libraries`
async fn list_libraries(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    let libraries = state.engine.list_libraries(&session.caller).await?;
    Ok(Json(libraries))
}

/// POST `/libraries`
async fn create_library(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<CreateLibraryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let library = state
        .engine
        .create_library(&session.caller, &payload.name)
        .await?;
    Ok((StatusCode::CREATED, Json(library)))
}

/// GET `/libraries/{library_id}`
async fn get_library(
    State(state): State<AppState>,
    session: Session,
    Path(library_id): Path<LibraryId>,
) -> Result<impl IntoResponse, ApiError> {
    let library = state
        .engine
        .get_library(&session.caller, library_id)
        .await?
        .ok_or_else(|| EngineError::not_found("library", library_id))?;
    Ok(Json(library))
}

/// DELETE `/libraries/{library_id}`
///
/// Removes every record of the library. A failure part way reports an error;
/// repeating the request finishes the job.
async fn delete_library(
    State(state): State<AppState>,
    session: Session,
    Path(library_id): Path<LibraryId>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .engine
        .delete_library(&session.caller, library_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
