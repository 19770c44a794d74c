//! Library (tenant) directory and manager bindings.
//!
//! A library is the unit of isolation: every seat, student, plan, and
//! payment carries its `library_id`. Deleting a library cascades through
//! its children in the order given by [`CascadeStep::ORDER`].

pub mod cascade;
pub mod types;

pub use cascade::CascadeStep;
pub use types::{Library, Manager, NewManager};
