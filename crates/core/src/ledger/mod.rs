//! Fee ledger.
//!
//! A student's `fees_due` is a signed balance: positive means owed,
//! negative means credit. Payments decrease it and are journaled; clearing
//! dues sets it to zero without a journal row; plan charges increase it.
//! Every balance change is planned here as a [`LedgerChange`] and written by
//! the store together with its journal row, if any.

pub mod money;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use money::{max_money, money};
pub use service::LedgerService;
pub use types::{BalanceChange, LedgerChange, NewPayment, Payment};
