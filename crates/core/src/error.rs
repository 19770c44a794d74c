//! Engine error taxonomy.
//!
//! Every operation of the engine fails with one of these variants. The
//! HTTP layer maps them onto `AppError`; the mapping keeps `SeatConflict`
//! distinct from `NotFound` so a client can offer "seat just taken, pick
//! another".

use carrel_shared::AppError;
use carrel_shared::types::{LibraryId, SeatId};
use thiserror::Error;

use crate::library::CascadeStep;
use crate::store::StoreError;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors produced by the consistency engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input.
    #[error("{field}: {message}")]
    Validation {
        /// Offending input field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// Referenced record is absent (or invisible to the caller).
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. `"student"`.
        entity: &'static str,
        /// Requested identifier.
        id: String,
    },

    /// The seat changed hands while the request was in flight.
    #[error("seat {seat_id} was just taken by another request")]
    SeatConflict {
        /// Contested seat.
        seat_id: SeatId,
    },

    /// Scope violation.
    #[error("access denied: {0}")]
    Authorization(String),

    /// A value that must be unique within a library is already used.
    #[error("{field} '{value}' is already in use")]
    Duplicate {
        /// Unique field.
        field: &'static str,
        /// Clashing value.
        value: String,
    },

    /// Library deletion stopped part way. Re-running the deletion is safe.
    #[error("deleting library {library_id} stopped at step {step}: {reason}")]
    CascadeIncomplete {
        /// Library being deleted.
        library_id: LibraryId,
        /// Step that failed.
        step: CascadeStep,
        /// Underlying failure.
        reason: String,
    },

    /// Backing store failure.
    #[error("store error: {0}")]
    Store(String),
}

impl EngineError {
    /// Shorthand for a field-level validation failure.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Shorthand for a missing record.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::SeatConflict { .. } => "SEAT_CONFLICT",
            Self::Authorization(_) => "FORBIDDEN",
            Self::Duplicate { .. } => "DUPLICATE",
            Self::CascadeIncomplete { .. } => "CASCADE_INCOMPLETE",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Authorization(_) => 403,
            Self::NotFound { .. } => 404,
            Self::SeatConflict { .. } | Self::Duplicate { .. } => 409,
            Self::CascadeIncomplete { .. } | Self::Store(_) => 500,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SeatVersion { seat_id } => Self::SeatConflict { seat_id },
            StoreError::Duplicate { field, value } => Self::Duplicate { field, value },
            StoreError::Missing { entity, id } => Self::NotFound { entity, id },
            err @ StoreError::BalanceOutOfRange { .. } => Self::Validation {
                field: "fees_due",
                message: err.to_string(),
            },
            StoreError::Backend(msg) => Self::Store(msg),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::Validation { .. } => Self::Validation(message),
            EngineError::NotFound { .. } => Self::NotFound(message),
            EngineError::SeatConflict { .. } => Self::SeatConflict(message),
            EngineError::Authorization(_) => Self::Forbidden(message),
            EngineError::Duplicate { .. } => Self::Conflict(message),
            EngineError::CascadeIncomplete { .. } => Self::Internal(message),
            EngineError::Store(_) => Self::Database(message),
        }
    }
}
