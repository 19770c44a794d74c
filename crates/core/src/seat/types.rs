//! Seat types.

use serde::{Deserialize, Serialize};

use carrel_shared::types::{LibraryId, SeatId, StudentId};

use crate::error::EngineResult;
use crate::library::types::required;

/// Occupancy state of a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
    /// Nobody sits here.
    Vacant,
    /// Held by one student.
    Occupied(StudentId),
}

/// A seat in a library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Seat ID.
    pub id: SeatId,
    /// Owning library.
    pub library_id: LibraryId,
    /// Label such as `A1`, unique within the library.
    pub seat_number: String,
    /// Floor label.
    pub floor: String,
    /// Current occupant.
    pub occupant_student_id: Option<StudentId>,
    /// Bumped on every occupancy change.
    pub version: i64,
}

impl Seat {
    /// Current occupancy state.
    #[must_use]
    pub fn occupancy(&self) -> Occupancy {
        self.occupant_student_id
            .map_or(Occupancy::Vacant, Occupancy::Occupied)
    }

    /// Returns true if nobody occupies the seat.
    #[must_use]
    pub fn is_vacant(&self) -> bool {
        self.occupant_student_id.is_none()
    }
}

/// Input for adding a seat.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSeat {
    /// Label such as `A1`.
    pub seat_number: String,
    /// Floor label.
    #[serde(default)]
    pub floor: String,
}

impl NewSeat {
    /// Validates the input and builds a vacant seat.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank seat number.
    pub fn into_seat(self, library_id: LibraryId) -> EngineResult<Seat> {
        Ok(Seat {
            id: SeatId::new(),
            library_id,
            seat_number: required("seat_number", &self.seat_number)?,
            floor: self.floor.trim().to_string(),
            occupant_student_id: None,
            version: 0,
        })
    }
}

/// Request to seat a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AssignSeat {
    /// Student to seat.
    pub student_id: StudentId,
    /// Target seat.
    pub seat_id: SeatId,
    /// Seat version the caller last observed. A stale value fails with
    /// `SeatConflict` instead of reassigning.
    #[serde(default)]
    pub expected_version: Option<i64>,
}
