//! Caller resolution and tenant scoping.

use std::fmt::Display;

use serde::Serialize;

use carrel_shared::Role;
use carrel_shared::types::{LibraryId, ManagerId};

use crate::error::{EngineError, EngineResult};

/// Library context of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One library.
    Single(LibraryId),
    /// Union across every library. Superadmin reads only.
    AllLibraries,
}

impl Scope {
    /// Returns true if records of `library_id` are visible in this scope.
    #[must_use]
    pub fn includes(&self, library_id: LibraryId) -> bool {
        match self {
            Self::Single(id) => *id == library_id,
            Self::AllLibraries => true,
        }
    }

    /// The concrete library, if the scope names one.
    #[must_use]
    pub const fn library_id(&self) -> Option<LibraryId> {
        match self {
            Self::Single(id) => Some(*id),
            Self::AllLibraries => None,
        }
    }
}

/// Authenticated caller, as resolved from the session and the manager
/// directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// Global operator, optionally acting "as" one library.
    Superadmin {
        /// Library picked for this session, if any.
        selected: Option<LibraryId>,
    },
    /// Library manager.
    Manager {
        /// Manager record.
        manager_id: ManagerId,
        /// Binding read from the manager directory.
        library_id: Option<LibraryId>,
    },
}

impl Caller {
    /// Role of the caller.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::Superadmin { .. } => Role::Superadmin,
            Self::Manager { .. } => Role::Manager,
        }
    }

    /// Rejects anyone but a superadmin.
    ///
    /// # Errors
    ///
    /// Returns `Authorization` for managers.
    pub fn require_superadmin(&self) -> EngineResult<()> {
        match self {
            Self::Superadmin { .. } => Ok(()),
            Self::Manager { manager_id, .. } => {
                tracing::warn!(%manager_id, "manager attempted a superadmin operation");
                Err(EngineError::Authorization(
                    "superadmin access required".to_string(),
                ))
            }
        }
    }

    /// Resolves the scope of a read.
    ///
    /// A superadmin reads the requested library, else the selected one,
    /// else every library. A manager always reads the bound library.
    ///
    /// # Errors
    ///
    /// Returns `Authorization` for an unbound manager or a manager
    /// requesting another library.
    pub fn read_scope(&self, requested: Option<LibraryId>) -> EngineResult<Scope> {
        match self {
            Self::Superadmin { selected } => {
                Ok(requested.or(*selected).map_or(Scope::AllLibraries, Scope::Single))
            }
            Self::Manager {
                manager_id,
                library_id,
            } => bound_library(*manager_id, *library_id, requested).map(Scope::Single),
        }
    }

    /// Resolves the library a write runs against.
    ///
    /// Only checks the caller's side; the engine also verifies the library
    /// exists before handing the context out.
    ///
    /// # Errors
    ///
    /// Returns `Authorization` when no concrete library can be derived, or
    /// when a manager requests another library.
    pub fn write_context(&self, requested: Option<LibraryId>) -> EngineResult<TenantContext> {
        let library_id = match self {
            Self::Superadmin { selected } => requested.or(*selected).ok_or_else(|| {
                EngineError::Authorization(
                    "writes require a concrete library, not all libraries".to_string(),
                )
            })?,
            Self::Manager {
                manager_id,
                library_id,
            } => bound_library(*manager_id, *library_id, requested)?,
        };

        Ok(TenantContext {
            library_id,
            role: self.role(),
        })
    }
}

fn bound_library(
    manager_id: ManagerId,
    bound: Option<LibraryId>,
    requested: Option<LibraryId>,
) -> EngineResult<LibraryId> {
    let Some(bound) = bound else {
        tracing::warn!(%manager_id, "manager without a library binding");
        return Err(EngineError::Authorization(
            "manager is not assigned to a library".to_string(),
        ));
    };
    if let Some(requested) = requested.filter(|r| *r != bound) {
        tracing::warn!(%manager_id, %requested, "manager requested a foreign library");
        return Err(EngineError::Authorization(
            "library is outside the manager's assignment".to_string(),
        ));
    }
    Ok(bound)
}

/// Concrete library a write runs against. Built only by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    library_id: LibraryId,
    role: Role,
}

impl TenantContext {
    /// Library the write targets.
    #[must_use]
    pub const fn library_id(&self) -> LibraryId {
        self.library_id
    }

    /// Role of the caller that owns this context.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// The single-library scope for reads inside this context.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        Scope::Single(self.library_id)
    }

    /// Checks that a record owned by `owner` may be touched from this
    /// context.
    ///
    /// # Errors
    ///
    /// See [`TenantContext::foreign`].
    pub fn ensure_owned(
        &self,
        entity: &'static str,
        id: impl Display,
        owner: LibraryId,
    ) -> EngineResult<()> {
        if owner == self.library_id {
            Ok(())
        } else {
            Err(self.foreign(entity, id))
        }
    }

    /// Error for a record that lives in another library.
    ///
    /// Managers get the same `NotFound` an absent id produces, so they
    /// cannot probe other libraries. Superadmins get `Authorization`.
    #[must_use]
    pub fn foreign(&self, entity: &'static str, id: impl Display) -> EngineError {
        tracing::warn!(
            library_id = %self.library_id,
            entity,
            %id,
            "write addressed a record of another library"
        );
        match self.role {
            Role::Manager => EngineError::not_found(entity, id),
            Role::Superadmin => EngineError::Authorization(format!(
                "{entity} {id} belongs to a different library"
            )),
        }
    }
}

/// A record annotated with its owning library's display name.
///
/// Seat numbers and plan names repeat across libraries, so reads always
/// carry the name alongside the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tenanted<T> {
    /// Owning library's display name.
    pub library_name: String,
    /// The record itself.
    #[serde(flatten)]
    pub record: T,
}
