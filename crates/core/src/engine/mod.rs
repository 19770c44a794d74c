//! Consistency engine.
//!
//! Orchestrates the pure rules against a [`LibraryStore`](crate::store::LibraryStore)
//! under per-key locks.

pub mod locks;
pub mod service;

#[cfg(test)]
mod tests;

pub use locks::{KeyedGuard, KeyedLocks, LibraryClosure, LibraryPass, LockKey, Registered};
pub use service::LibraryEngine;
