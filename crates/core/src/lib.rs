//! Core business logic for Carrel.
//!
//! This crate contains the seat occupancy and fee ledger engine with ZERO web
//! or database dependencies. Storage is reached through the
//! [`store::LibraryStore`] trait.
//!
//! # Modules
//!
//! - `library` - Library (tenant) and manager records, deletion order
//! - `plan` - Payment plan catalog
//! - `seat` - Seat registry and the occupancy state machine
//! - `student` - Student records, derived status, balance display
//! - `ledger` - Payments and balance changes
//! - `scope` - Caller resolution and tenant scoping
//! - `dashboard` - Derived summary numbers
//! - `store` - Persistence seam and the in-memory store
//! - `engine` - `LibraryEngine`, which runs every operation under per-key locks

pub mod dashboard;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod library;
pub mod plan;
pub mod scope;
pub mod seat;
pub mod store;
pub mod student;

pub use engine::LibraryEngine;
pub use error::{EngineError, EngineResult};
pub use scope::{Caller, Scope, TenantContext, Tenanted};
pub use store::{LibraryStore, MemoryLibraryStore, StoreError, StoreResult};
