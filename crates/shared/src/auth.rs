//! Bearer token claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role carried by an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Operates across every library.
    Superadmin,
    /// Bound to a single library.
    Manager,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Superadmin => write!(f, "superadmin"),
            Self::Manager => write!(f, "manager"),
        }
    }
}

/// JWT claims for access tokens.
///
/// `lib` is informational for managers: the bound library is always
/// re-read from the manager directory, never trusted from the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (superadmin or manager ID).
    pub sub: Uuid,
    /// Caller role.
    pub role: Role,
    /// Library the token was issued for, if any. Never used for authorization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lib: Option<Uuid>,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl Claims {
    /// Creates new claims for a subject.
    #[must_use]
    pub fn new(subject: Uuid, role: Role, library: Option<Uuid>, expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            sub: subject,
            role,
            lib: library,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// Returns the subject ID from claims.
    #[must_use]
    pub const fn subject(&self) -> Uuid {
        self.sub
    }

    /// Returns true if the caller is the global superadmin.
    #[must_use]
    pub const fn is_superadmin(&self) -> bool {
        matches!(self.role, Role::Superadmin)
    }
}
