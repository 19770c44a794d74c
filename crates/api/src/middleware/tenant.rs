//! Caller and tenant extractors.
//!
//! Every scoped handler goes through [`Session`]: the verified claims plus
//! the library the request names, resolved against the manager directory.
//! A manager's binding always comes from the directory, never from the
//! token or the request.

use std::str::FromStr;

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;

use carrel_core::{Caller, Scope, TenantContext};
use carrel_shared::Claims;
use carrel_shared::types::LibraryId;

use crate::{AppState, error::ApiError};

/// Header a superadmin may use to pick a library.
pub const LIBRARY_HEADER: &str = "x-library-id";

#[derive(Debug, Default, Deserialize)]
struct LibrarySelector {
    library_id: Option<LibraryId>,
}

/// Library named by the request: the header wins over the query string.
fn requested_library(parts: &Parts) -> Result<Option<LibraryId>, ApiError> {
    if let Some(value) = parts.headers.get(LIBRARY_HEADER) {
        let raw = value
            .to_str()
            .map_err(|_| ApiError::bad_request("library_id: header is not valid text"))?;
        return LibraryId::from_str(raw.trim())
            .map(Some)
            .map_err(|_| ApiError::bad_request("library_id: not a valid id"));
    }

    Query::<LibrarySelector>::try_from_uri(&parts.uri)
        .map(|Query(selector)| selector.library_id)
        .map_err(|_| ApiError::bad_request("library_id: not a valid id"))
}

/// Authenticated caller and the library the request names.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    /// Resolved caller.
    pub caller: Caller,
    /// Library named by the request, if any.
    pub requested: Option<LibraryId>,
}

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or_else(ApiError::unauthenticated)?;
        let requested = requested_library(parts)?;
        let caller = state
            .engine
            .resolve_caller(claims.role, claims.sub, requested)
            .await?;
        Ok(Self { caller, requested })
    }
}

/// Scope of a read request.
#[derive(Debug, Clone, Copy)]
pub struct ReadScope(pub Scope);

impl FromRequestParts<AppState> for ReadScope {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let scope = state
            .engine
            .read_scope(&session.caller, session.requested)
            .await?;
        Ok(Self(scope))
    }
}

/// Library a write request runs against.
#[derive(Debug, Clone, Copy)]
pub struct WriteContext(pub TenantContext);

impl FromRequestParts<AppState> for WriteContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let ctx = state
            .engine
            .write_context(&session.caller, session.requested)
            .await?;
        Ok(Self(ctx))
    }
}
