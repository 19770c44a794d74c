//! Seat registry and the occupancy state machine.
//!
//! A seat is either `Vacant` or `Occupied(student)`. Occupancy is a
//! relation kept on both sides (`Seat::occupant_student_id` and
//! `Student::seat_id`); every change to it is planned here as an
//! [`OccupancyChange`] and written by the store in one atomic step.

pub mod occupancy;
pub mod types;

#[cfg(test)]
mod occupancy_props;

pub use occupancy::{OccupancyChange, SeatWrite, StudentSeatWrite, plan_assign, plan_unassign};
pub use types::{AssignSeat, NewSeat, Occupancy, Seat};
