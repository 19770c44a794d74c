//! Student ledger records.
//!
//! A student's `status` is never stored: it is derived from the balance and
//! the explicit `deactivated` flag, so the two cannot drift apart.

pub mod balance;
pub mod types;

pub use balance::BalanceDisplay;
pub use types::{Link, NewStudent, Student, StudentPatch, StudentStatus};
