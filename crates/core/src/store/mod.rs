//! Persistence seam.
//!
//! The engine never touches storage directly; it talks to a
//! [`LibraryStore`]. Every method that writes more than one record is
//! atomic: readers observe either none or all of its writes.
//!
//! `get_*` lookups are global by id. Tenant checks happen in the engine,
//! which needs to tell "absent" apart from "belongs elsewhere".

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use carrel_shared::types::{LibraryId, ManagerId, PaymentPlanId, SeatId, StudentId};

use crate::ledger::{LedgerChange, Payment};
use crate::library::{CascadeStep, Library, Manager};
use crate::plan::PaymentPlan;
use crate::scope::Scope;
use crate::seat::{OccupancyChange, Seat};
use crate::student::Student;

pub use memory::MemoryLibraryStore;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A seat write was planned against a version that is no longer current.
    #[error("seat {seat_id} changed since it was read")]
    SeatVersion {
        /// Seat whose version moved.
        seat_id: SeatId,
    },

    /// A uniqueness constraint would be violated.
    #[error("duplicate {field}: {value}")]
    Duplicate {
        /// Unique field.
        field: &'static str,
        /// Clashing value.
        value: String,
    },

    /// A record the write depends on is gone.
    #[error("{entity} {id} does not exist")]
    Missing {
        /// Entity kind.
        entity: &'static str,
        /// Identifier.
        id: String,
    },

    /// A ledger change would push a balance outside the storable range.
    #[error("balance of student {student_id} would leave the storable range")]
    BalanceOutOfRange {
        /// Student whose balance was being changed.
        student_id: StudentId,
    },

    /// Anything the backend itself reports.
    #[error("backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Shorthand for a missing record.
    pub fn missing(entity: &'static str, id: impl ToString) -> Self {
        Self::Missing {
            entity,
            id: id.to_string(),
        }
    }
}

/// Storage for every record the engine manages.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    // Libraries

    /// Inserts a library.
    async fn insert_library(&self, library: &Library) -> StoreResult<()>;

    /// Looks a library up by id.
    async fn get_library(&self, id: LibraryId) -> StoreResult<Option<Library>>;

    /// Lists every library, oldest first.
    async fn list_libraries(&self) -> StoreResult<Vec<Library>>;

    /// Runs one step of deleting a library and returns the number of rows
    /// touched. Must succeed (touching nothing) when the step already ran.
    async fn purge_library_step(&self, id: LibraryId, step: CascadeStep) -> StoreResult<u64>;

    // Managers

    /// Inserts a manager. Emails are unique.
    async fn insert_manager(&self, manager: &Manager) -> StoreResult<()>;

    /// Looks a manager up by id.
    async fn get_manager(&self, id: ManagerId) -> StoreResult<Option<Manager>>;

    /// Lists every manager.
    async fn list_managers(&self) -> StoreResult<Vec<Manager>>;

    /// Rebinds a manager and returns the updated record.
    async fn set_manager_library(
        &self,
        id: ManagerId,
        library_id: Option<LibraryId>,
    ) -> StoreResult<Manager>;

    // Payment plans

    /// Inserts a plan.
    async fn insert_plan(&self, plan: &PaymentPlan) -> StoreResult<()>;

    /// Overwrites a plan.
    async fn update_plan(&self, plan: &PaymentPlan) -> StoreResult<()>;

    /// Looks a plan up by id.
    async fn get_plan(&self, id: PaymentPlanId) -> StoreResult<Option<PaymentPlan>>;

    /// Lists plans in scope.
    async fn list_plans(&self, scope: Scope) -> StoreResult<Vec<PaymentPlan>>;

    // Seats

    /// Inserts a seat. Seat numbers are unique within a library.
    async fn insert_seat(&self, seat: &Seat) -> StoreResult<()>;

    /// Looks a seat up by id.
    async fn get_seat(&self, id: SeatId) -> StoreResult<Option<Seat>>;

    /// Lists seats in scope.
    async fn list_seats(&self, scope: Scope) -> StoreResult<Vec<Seat>>;

    /// Applies `vacate` and deletes the seat, atomically.
    async fn remove_seat(&self, id: SeatId, vacate: &OccupancyChange) -> StoreResult<()>;

    // Students

    /// Inserts a student and, if given, the occupancy change seating them,
    /// atomically.
    async fn insert_student(
        &self,
        student: &Student,
        seating: Option<&OccupancyChange>,
    ) -> StoreResult<()>;

    /// Looks a student up by id.
    async fn get_student(&self, id: StudentId) -> StoreResult<Option<Student>>;

    /// Lists students in scope.
    async fn list_students(&self, scope: Scope) -> StoreResult<Vec<Student>>;

    /// Writes the profile fields of `student` (name, contact, plan,
    /// deactivation, enrollment date). Balance and seat are left alone.
    async fn update_student_profile(&self, student: &Student) -> StoreResult<Student>;

    /// Applies `vacate`, deletes the student's payments, then the student,
    /// atomically.
    async fn remove_student(&self, id: StudentId, vacate: &OccupancyChange) -> StoreResult<()>;

    // Composite writes

    /// Applies an occupancy change atomically. Every seat write is checked
    /// against its expected version.
    async fn apply_occupancy(&self, change: &OccupancyChange) -> StoreResult<()>;

    /// Applies a ledger change and inserts its journal row, atomically.
    /// Returns the student as written.
    async fn apply_ledger(&self, change: &LedgerChange) -> StoreResult<Student>;

    // Payment journal

    /// Lists payments in scope, optionally for one student, oldest first.
    async fn list_payments(
        &self,
        scope: Scope,
        student_id: Option<StudentId>,
    ) -> StoreResult<Vec<Payment>>;
}
