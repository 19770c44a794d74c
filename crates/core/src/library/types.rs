//! Library and manager records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carrel_shared::types::{LibraryId, ManagerId};

use crate::error::{EngineError, EngineResult};

/// A tenant: one independently managed study space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    /// Library ID.
    pub id: LibraryId,
    /// Display name, used to tell records apart in cross-library reads.
    pub name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Library {
    /// Builds a new library from a raw name.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name is blank.
    pub fn create(name: &str) -> EngineResult<Self> {
        Ok(Self {
            id: LibraryId::new(),
            name: required("name", name)?,
            created_at: Utc::now(),
        })
    }
}

/// A library manager. The binding is the only tenant a manager can act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manager {
    /// Manager ID.
    pub id: ManagerId,
    /// Full name.
    pub full_name: String,
    /// Login email.
    pub email: String,
    /// Bound library. `None` leaves the manager unable to operate.
    pub library_id: Option<LibraryId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Input for registering a manager.
#[derive(Debug, Clone, Deserialize)]
pub struct NewManager {
    /// Full name.
    pub full_name: String,
    /// Login email.
    pub email: String,
    /// Initial library binding.
    #[serde(default)]
    pub library_id: Option<LibraryId>,
}

impl NewManager {
    /// Validates the input and builds the manager record.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name or a malformed email.
    pub fn into_manager(self) -> EngineResult<Manager> {
        let email = required("email", &self.email)?;
        if !email.contains('@') {
            return Err(EngineError::validation("email", "must be an email address"));
        }

        Ok(Manager {
            id: ManagerId::new(),
            full_name: required("full_name", &self.full_name)?,
            email,
            library_id: self.library_id,
            created_at: Utc::now(),
        })
    }
}

/// Trims a required text field, rejecting blanks.
pub(crate) fn required(field: &'static str, value: &str) -> EngineResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::validation(field, "is required"));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional text field, mapping blanks to `None`.
pub(crate) fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
