//! Manager directory routes. Superadmin only.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use serde::Deserialize;

use carrel_core::library::NewManager;
use carrel_shared::types::{LibraryId, ManagerId};

use crate::{AppState, error::ApiError, middleware::Session};

/// Creates the manager routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/managers", get(list_managers).post(create_manager))
        .route("/managers/{manager_id}/library", put(bind_manager))
}

/// Request body for binding a manager. `null` unbinds.
#[derive(Debug, Deserialize)]
pub struct BindManagerRequest {
    /// Library to bind to.
    pub library_id: Option<LibraryId>,
}

async fn list_managers(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.list_managers(&session.caller).await?))
}

async fn create_manager(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<NewManager>,
) -> Result<impl IntoResponse, ApiError> {
    let manager = state
        .engine
        .create_manager(&session.caller, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(manager)))
}

async fn bind_manager(
    State(state): State<AppState>,
    session: Session,
    Path(manager_id): Path<ManagerId>,
    Json(payload): Json<BindManagerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let manager = state
        .engine
        .bind_manager(&session.caller, manager_id, payload.library_id)
        .await?;
    Ok(Json(manager))
}
