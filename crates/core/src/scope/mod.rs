//! Scoped access gateway.
//!
//! Resolves who is calling into the library context an operation runs
//! against. Reads run against a [`Scope`]; writes need a [`TenantContext`],
//! which can only be built here and always names one concrete library.

pub mod gateway;

pub use gateway::{Caller, Scope, TenantContext, Tenanted};
