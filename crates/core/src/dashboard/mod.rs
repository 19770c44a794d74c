//! Dashboard summary.
//!
//! A derived read computed over current state; nothing here is persisted.

pub mod types;

pub use types::DashboardSummary;
