//! Occupancy state machine.
//!
//! Transitions:
//! - `Assign(seat, student)` from `Vacant`, or from `Occupied(other)`
//!   (reassignment: the previous occupant loses the seat first).
//!   A student already seated elsewhere releases that seat in the same
//!   change.
//! - `Unassign(seat)` from `Occupied`. From `Vacant` it plans nothing.
//!
//! Planning is pure. Each seat write carries the version it was planned
//! against so the store can refuse a change computed from a stale read.

use serde::Serialize;

use carrel_shared::types::{LibraryId, SeatId, StudentId};

use super::types::Seat;
use crate::error::{EngineError, EngineResult};
use crate::student::Student;

/// New occupant for one seat, guarded by the version it was planned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeatWrite {
    /// Seat to write.
    pub seat_id: SeatId,
    /// Version the plan was computed against.
    pub expected_version: i64,
    /// Occupant after the write.
    pub occupant: Option<StudentId>,
}

/// New seat pointer for one student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StudentSeatWrite {
    /// Student to write.
    pub student_id: StudentId,
    /// Seat after the write.
    pub seat_id: Option<SeatId>,
}

/// Every write one occupancy transition needs, applied all-or-nothing.
///
/// Student writes are applied in order, so a cleared pointer always lands
/// before the pointer that replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccupancyChange {
    /// Library all writes belong to.
    pub library_id: LibraryId,
    /// Student pointer writes, in application order.
    pub students: Vec<StudentSeatWrite>,
    /// Seat occupant writes.
    pub seats: Vec<SeatWrite>,
}

impl OccupancyChange {
    /// A change that writes nothing.
    #[must_use]
    pub const fn empty(library_id: LibraryId) -> Self {
        Self {
            library_id,
            students: Vec::new(),
            seats: Vec::new(),
        }
    }

    /// Returns true if applying the change would write nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.students.is_empty() && self.seats.is_empty()
    }
}

/// Plans seating `student` at `seat`.
///
/// `current_seat` is the seat the student occupies now, if any.
/// `expected_version` is the seat version the caller last observed; when
/// given and stale, the plan fails with `SeatConflict`.
///
/// # Errors
///
/// Returns `SeatConflict` for a stale `expected_version` and a validation
/// error if the seat and student belong to different libraries.
pub fn plan_assign(
    seat: &Seat,
    student: &Student,
    current_seat: Option<&Seat>,
    expected_version: Option<i64>,
) -> EngineResult<OccupancyChange> {
    if seat.library_id != student.library_id {
        return Err(EngineError::validation(
            "seat_id",
            "seat and student belong to different libraries",
        ));
    }
    if expected_version.is_some_and(|v| v != seat.version) {
        return Err(EngineError::SeatConflict { seat_id: seat.id });
    }

    let mut change = OccupancyChange::empty(seat.library_id);
    if seat.occupant_student_id == Some(student.id) && student.seat_id == Some(seat.id) {
        return Ok(change);
    }

    if let Some(current) =
        current_seat.filter(|c| c.id != seat.id && c.occupant_student_id == Some(student.id))
    {
        change.seats.push(SeatWrite {
            seat_id: current.id,
            expected_version: current.version,
            occupant: None,
        });
    }

    if let Some(previous) = seat.occupant_student_id.filter(|p| *p != student.id) {
        change.students.push(StudentSeatWrite {
            student_id: previous,
            seat_id: None,
        });
    }

    change.students.push(StudentSeatWrite {
        student_id: student.id,
        seat_id: Some(seat.id),
    });
    change.seats.push(SeatWrite {
        seat_id: seat.id,
        expected_version: seat.version,
        occupant: Some(student.id),
    });

    Ok(change)
}

/// Plans vacating `seat`. A vacant seat yields an empty change.
#[must_use]
pub fn plan_unassign(seat: &Seat) -> OccupancyChange {
    let mut change = OccupancyChange::empty(seat.library_id);
    if let Some(occupant) = seat.occupant_student_id {
        change.students.push(StudentSeatWrite {
            student_id: occupant,
            seat_id: None,
        });
        change.seats.push(SeatWrite {
            seat_id: seat.id,
            expected_version: seat.version,
            occupant: None,
        });
    }
    change
}
