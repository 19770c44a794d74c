//! In-memory `LibraryStore` (tests and development).
//!
//! All records live behind one `RwLock`. Composite writes validate every
//! precondition before mutating anything, inside a single write-lock
//! critical section, so they are all-or-nothing.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use carrel_shared::types::{LibraryId, ManagerId, PaymentId, PaymentPlanId, SeatId, StudentId};

use super::{LibraryStore, StoreError, StoreResult};
use crate::ledger::{LedgerChange, Payment};
use crate::library::{CascadeStep, Library, Manager};
use crate::plan::PaymentPlan;
use crate::scope::Scope;
use crate::seat::{OccupancyChange, Seat};
use crate::student::Student;

// Ids are UUID v7, so BTreeMap iteration is creation order.
#[derive(Debug, Default)]
struct State {
    libraries: BTreeMap<LibraryId, Library>,
    managers: BTreeMap<ManagerId, Manager>,
    plans: BTreeMap<PaymentPlanId, PaymentPlan>,
    seats: BTreeMap<SeatId, Seat>,
    students: BTreeMap<StudentId, Student>,
    payments: BTreeMap<PaymentId, Payment>,
}

impl State {
    fn ensure_library(&self, id: LibraryId) -> StoreResult<()> {
        if self.libraries.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::missing("library", id))
        }
    }

    fn check_occupancy(&self, change: &OccupancyChange) -> StoreResult<()> {
        for write in &change.seats {
            let seat = self
                .seats
                .get(&write.seat_id)
                .filter(|s| s.library_id == change.library_id)
                .ok_or_else(|| StoreError::missing("seat", write.seat_id))?;
            if seat.version != write.expected_version {
                return Err(StoreError::SeatVersion {
                    seat_id: write.seat_id,
                });
            }
        }
        for write in &change.students {
            self.students
                .get(&write.student_id)
                .filter(|s| s.library_id == change.library_id)
                .ok_or_else(|| StoreError::missing("student", write.student_id))?;
        }
        Ok(())
    }

    // Callers run `check_occupancy` first; lookups below cannot miss.
    fn write_occupancy(&mut self, change: &OccupancyChange) {
        for write in &change.students {
            if let Some(student) = self.students.get_mut(&write.student_id) {
                student.seat_id = write.seat_id;
            }
        }
        for write in &change.seats {
            if let Some(seat) = self.seats.get_mut(&write.seat_id) {
                seat.occupant_student_id = write.occupant;
                seat.version += 1;
            }
        }
    }
}

/// `LibraryStore` backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryLibraryStore {
    state: RwLock<State>,
}

impl MemoryLibraryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn in_scope<'a, T: 'a>(
    records: impl Iterator<Item = &'a T>,
    scope: Scope,
    library_of: impl Fn(&T) -> LibraryId,
) -> Vec<T>
where
    T: Clone,
{
    records
        .filter(|r| scope.includes(library_of(r)))
        .cloned()
        .collect()
}

fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

#[async_trait]
impl LibraryStore for MemoryLibraryStore {
    async fn insert_library(&self, library: &Library) -> StoreResult<()> {
        self.state
            .write()
            .await
            .libraries
            .insert(library.id, library.clone());
        Ok(())
    }

    async fn get_library(&self, id: LibraryId) -> StoreResult<Option<Library>> {
        Ok(self.state.read().await.libraries.get(&id).cloned())
    }

    async fn list_libraries(&self) -> StoreResult<Vec<Library>> {
        Ok(self.state.read().await.libraries.values().cloned().collect())
    }

    async fn purge_library_step(&self, id: LibraryId, step: CascadeStep) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let removed = match step {
            CascadeStep::Payments => {
                let before = state.payments.len();
                state.payments.retain(|_, p| p.library_id != id);
                before - state.payments.len()
            }
            CascadeStep::Students => {
                let before = state.students.len();
                state.students.retain(|_, s| s.library_id != id);
                before - state.students.len()
            }
            CascadeStep::Seats => {
                let before = state.seats.len();
                state.seats.retain(|_, s| s.library_id != id);
                before - state.seats.len()
            }
            CascadeStep::PaymentPlans => {
                let before = state.plans.len();
                state.plans.retain(|_, p| p.library_id != id);
                before - state.plans.len()
            }
            CascadeStep::ManagerBindings => {
                let mut cleared = 0;
                for manager in state.managers.values_mut() {
                    if manager.library_id == Some(id) {
                        manager.library_id = None;
                        cleared += 1;
                    }
                }
                cleared
            }
            CascadeStep::Library => usize::from(state.libraries.remove(&id).is_some()),
        };
        Ok(count(removed))
    }

    async fn insert_manager(&self, manager: &Manager) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if let Some(library_id) = manager.library_id {
            state.ensure_library(library_id)?;
        }
        if state
            .managers
            .values()
            .any(|m| m.email.eq_ignore_ascii_case(&manager.email))
        {
            return Err(StoreError::Duplicate {
                field: "email",
                value: manager.email.clone(),
            });
        }
        state.managers.insert(manager.id, manager.clone());
        Ok(())
    }

    async fn get_manager(&self, id: ManagerId) -> StoreResult<Option<Manager>> {
        Ok(self.state.read().await.managers.get(&id).cloned())
    }

    async fn list_managers(&self) -> StoreResult<Vec<Manager>> {
        Ok(self.state.read().await.managers.values().cloned().collect())
    }

    async fn set_manager_library(
        &self,
        id: ManagerId,
        library_id: Option<LibraryId>,
    ) -> StoreResult<Manager> {
        let mut state = self.state.write().await;
        if let Some(library_id) = library_id {
            state.ensure_library(library_id)?;
        }
        let manager = state
            .managers
            .get_mut(&id)
            .ok_or_else(|| StoreError::missing("manager", id))?;
        manager.library_id = library_id;
        Ok(manager.clone())
    }

    async fn insert_plan(&self, plan: &PaymentPlan) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.ensure_library(plan.library_id)?;
        state.plans.insert(plan.id, plan.clone());
        Ok(())
    }

    async fn update_plan(&self, plan: &PaymentPlan) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .plans
            .get_mut(&plan.id)
            .ok_or_else(|| StoreError::missing("payment_plan", plan.id))?;
        *stored = plan.clone();
        Ok(())
    }

    async fn get_plan(&self, id: PaymentPlanId) -> StoreResult<Option<PaymentPlan>> {
        Ok(self.state.read().await.plans.get(&id).cloned())
    }

    async fn list_plans(&self, scope: Scope) -> StoreResult<Vec<PaymentPlan>> {
        let state = self.state.read().await;
        Ok(in_scope(state.plans.values(), scope, |p| p.library_id))
    }

    async fn insert_seat(&self, seat: &Seat) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.ensure_library(seat.library_id)?;
        if state
            .seats
            .values()
            .any(|s| s.library_id == seat.library_id && s.seat_number == seat.seat_number)
        {
            return Err(StoreError::Duplicate {
                field: "seat_number",
                value: seat.seat_number.clone(),
            });
        }
        state.seats.insert(seat.id, seat.clone());
        Ok(())
    }

    async fn get_seat(&self, id: SeatId) -> StoreResult<Option<Seat>> {
        Ok(self.state.read().await.seats.get(&id).cloned())
    }

    async fn list_seats(&self, scope: Scope) -> StoreResult<Vec<Seat>> {
        let state = self.state.read().await;
        Ok(in_scope(state.seats.values(), scope, |s| s.library_id))
    }

    async fn remove_seat(&self, id: SeatId, vacate: &OccupancyChange) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.seats.contains_key(&id) {
            return Err(StoreError::missing("seat", id));
        }
        state.check_occupancy(vacate)?;
        state.write_occupancy(vacate);
        state.seats.remove(&id);
        Ok(())
    }

    async fn insert_student(
        &self,
        student: &Student,
        seating: Option<&OccupancyChange>,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.ensure_library(student.library_id)?;
        if let Some(plan_id) = student.payment_plan_id {
            state
                .plans
                .get(&plan_id)
                .filter(|p| p.library_id == student.library_id)
                .ok_or_else(|| StoreError::missing("payment_plan", plan_id))?;
        }

        state.students.insert(student.id, student.clone());
        if let Some(change) = seating {
            if let Err(err) = state.check_occupancy(change) {
                state.students.remove(&student.id);
                return Err(err);
            }
            state.write_occupancy(change);
        }
        Ok(())
    }

    async fn get_student(&self, id: StudentId) -> StoreResult<Option<Student>> {
        Ok(self.state.read().await.students.get(&id).cloned())
    }

    async fn list_students(&self, scope: Scope) -> StoreResult<Vec<Student>> {
        let state = self.state.read().await;
        Ok(in_scope(state.students.values(), scope, |s| s.library_id))
    }

    async fn update_student_profile(&self, student: &Student) -> StoreResult<Student> {
        let mut state = self.state.write().await;
        if let Some(plan_id) = student.payment_plan_id {
            state
                .plans
                .get(&plan_id)
                .filter(|p| p.library_id == student.library_id)
                .ok_or_else(|| StoreError::missing("payment_plan", plan_id))?;
        }
        let stored = state
            .students
            .get_mut(&student.id)
            .ok_or_else(|| StoreError::missing("student", student.id))?;

        stored.full_name.clone_from(&student.full_name);
        stored.email.clone_from(&student.email);
        stored.phone.clone_from(&student.phone);
        stored.payment_plan_id = student.payment_plan_id;
        stored.deactivated = student.deactivated;
        stored.enrollment_date = student.enrollment_date;
        Ok(stored.clone())
    }

    async fn remove_student(&self, id: StudentId, vacate: &OccupancyChange) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.students.contains_key(&id) {
            return Err(StoreError::missing("student", id));
        }
        state.check_occupancy(vacate)?;
        state.write_occupancy(vacate);
        state.payments.retain(|_, p| p.student_id != id);
        state.students.remove(&id);
        Ok(())
    }

    async fn apply_occupancy(&self, change: &OccupancyChange) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check_occupancy(change)?;
        state.write_occupancy(change);
        Ok(())
    }

    async fn apply_ledger(&self, change: &LedgerChange) -> StoreResult<Student> {
        let mut state = self.state.write().await;
        let student = state
            .students
            .get_mut(&change.student_id)
            .filter(|s| s.library_id == change.library_id)
            .ok_or_else(|| StoreError::missing("student", change.student_id))?;

        change.apply_to(student)?;
        let updated = student.clone();
        if let Some(payment) = &change.payment {
            state.payments.insert(payment.id, payment.clone());
        }
        Ok(updated)
    }

    async fn list_payments(
        &self,
        scope: Scope,
        student_id: Option<StudentId>,
    ) -> StoreResult<Vec<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .filter(|p| scope.includes(p.library_id))
            .filter(|p| student_id.is_none_or(|id| p.student_id == id))
            .cloned()
            .collect())
    }
}
