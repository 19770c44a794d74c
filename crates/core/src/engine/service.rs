//! `LibraryEngine`: every operation of the seat and fee ledger.
//!
//! Reads take a [`Scope`] and return records annotated with their library's
//! name. Writes take a [`TenantContext`] and check every referenced record
//! against it before planning a change. Multi-record writes are planned by
//! the pure modules (`seat::occupancy`, `ledger::service`) and handed to
//! the store as one atomic call while the relevant keys are held.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use carrel_shared::Role;
use carrel_shared::types::{LibraryId, ManagerId, PaymentPlanId, SeatId, StudentId};

use super::locks::{KeyedLocks, LockKey};
use crate::dashboard::DashboardSummary;
use crate::error::{EngineError, EngineResult};
use crate::ledger::{LedgerChange, LedgerService, NewPayment, Payment};
use crate::library::{CascadeStep, Library, Manager, NewManager};
use crate::plan::{PaymentPlan, PlanInput, PlanPatch};
use crate::scope::{Caller, Scope, TenantContext, Tenanted};
use crate::seat::{AssignSeat, NewSeat, OccupancyChange, Seat, plan_assign, plan_unassign};
use crate::store::LibraryStore;
use crate::student::{Link, NewStudent, Student, StudentPatch};

/// Tenant-scoped consistency engine.
pub struct LibraryEngine {
    store: Arc<dyn LibraryStore>,
    locks: KeyedLocks,
}

impl std::fmt::Debug for LibraryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryEngine")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl LibraryEngine {
    /// Creates an engine over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn LibraryStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Lock entries currently registered: keys and library gates that are
    /// held or awaited.
    pub fn held_locks(&self) -> usize {
        self.locks.len()
    }

    // ------------------------------------------------------------------
    // Scope gateway
    // ------------------------------------------------------------------

    /// Builds the caller for an authenticated subject.
    ///
    /// A manager's binding is read from the manager directory; nothing the
    /// client sends can change it.
    pub async fn resolve_caller(
        &self,
        role: Role,
        subject: Uuid,
        selected: Option<LibraryId>,
    ) -> EngineResult<Caller> {
        match role {
            Role::Superadmin => Ok(Caller::Superadmin { selected }),
            Role::Manager => {
                let manager_id = ManagerId::from_uuid(subject);
                let Some(manager) = self.store.get_manager(manager_id).await? else {
                    warn!(%manager_id, "token presented for an unknown manager");
                    return Err(EngineError::Authorization("unknown manager".to_string()));
                };
                Ok(Caller::Manager {
                    manager_id,
                    library_id: manager.library_id,
                })
            }
        }
    }

    /// Resolves the scope of a read and checks a named library exists.
    pub async fn read_scope(
        &self,
        caller: &Caller,
        requested: Option<LibraryId>,
    ) -> EngineResult<Scope> {
        let scope = caller.read_scope(requested)?;
        if let Scope::Single(library_id) = scope {
            self.existing_library(library_id).await?;
        }
        Ok(scope)
    }

    /// Resolves the library a write runs against and checks it exists.
    pub async fn write_context(
        &self,
        caller: &Caller,
        requested: Option<LibraryId>,
    ) -> EngineResult<TenantContext> {
        let ctx = caller.write_context(requested)?;
        self.existing_library(ctx.library_id()).await?;
        Ok(ctx)
    }

    // ------------------------------------------------------------------
    // Libraries and managers (superadmin)
    // ------------------------------------------------------------------

    /// Creates a library.
    pub async fn create_library(&self, caller: &Caller, name: &str) -> EngineResult<Library> {
        caller.require_superadmin()?;
        let library = Library::create(name)?;
        self.store.insert_library(&library).await?;
        info!(library_id = %library.id, name = %library.name, "library created");
        Ok(library)
    }

    /// Lists every library.
    pub async fn list_libraries(&self, caller: &Caller) -> EngineResult<Vec<Library>> {
        caller.require_superadmin()?;
        Ok(self.store.list_libraries().await?)
    }

    /// Fetches a library visible to `caller`.
    pub async fn get_library(
        &self,
        caller: &Caller,
        id: LibraryId,
    ) -> EngineResult<Option<Library>> {
        let visible = match caller {
            Caller::Superadmin { .. } => true,
            Caller::Manager { .. } => caller.read_scope(None)?.includes(id),
        };
        if !visible {
            return Ok(None);
        }
        Ok(self.store.get_library(id).await?)
    }

    /// Deletes a library and everything it owns.
    ///
    /// Steps run in [`CascadeStep::ORDER`] while the library is closed to
    /// writes. A failed step reports `CascadeIncomplete`; calling this
    /// again resumes safely because every step only removes what is left.
    pub async fn delete_library(&self, caller: &Caller, id: LibraryId) -> EngineResult<()> {
        caller.require_superadmin()?;
        self.existing_library(id).await?;

        let _closure = self.locks.close_library(id).await;
        for step in CascadeStep::ORDER {
            match self.store.purge_library_step(id, step).await {
                Ok(rows) => debug!(library_id = %id, %step, rows, "cascade step finished"),
                Err(err) => {
                    error!(library_id = %id, %step, error = %err, "library deletion stopped");
                    return Err(EngineError::CascadeIncomplete {
                        library_id: id,
                        step,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(library_id = %id, "library deleted");
        Ok(())
    }

    /// Registers a manager.
    pub async fn create_manager(&self, caller: &Caller, input: NewManager) -> EngineResult<Manager> {
        caller.require_superadmin()?;
        if let Some(library_id) = input.library_id {
            self.existing_library(library_id).await?;
        }
        let manager = input.into_manager()?;
        self.store.insert_manager(&manager).await?;
        info!(manager_id = %manager.id, library_id = ?manager.library_id, "manager created");
        Ok(manager)
    }

    /// Lists every manager.
    pub async fn list_managers(&self, caller: &Caller) -> EngineResult<Vec<Manager>> {
        caller.require_superadmin()?;
        Ok(self.store.list_managers().await?)
    }

    /// Binds a manager to a library, or unbinds with `None`.
    pub async fn bind_manager(
        &self,
        caller: &Caller,
        manager_id: ManagerId,
        library_id: Option<LibraryId>,
    ) -> EngineResult<Manager> {
        caller.require_superadmin()?;
        if let Some(library_id) = library_id {
            self.existing_library(library_id).await?;
        }
        let manager = self.store.set_manager_library(manager_id, library_id).await?;
        info!(%manager_id, library_id = ?library_id, "manager binding changed");
        Ok(manager)
    }

    // ------------------------------------------------------------------
    // Payment plans
    // ------------------------------------------------------------------

    /// Lists plans in scope.
    pub async fn list_payment_plans(
        &self,
        scope: Scope,
    ) -> EngineResult<Vec<Tenanted<PaymentPlan>>> {
        let plans = self.store.list_plans(scope).await?;
        self.annotate(scope, plans, |p| p.library_id).await
    }

    /// Fetches a plan if it is in scope.
    pub async fn get_payment_plan(
        &self,
        scope: Scope,
        id: PaymentPlanId,
    ) -> EngineResult<Option<Tenanted<PaymentPlan>>> {
        let plan = self.store.get_plan(id).await?;
        self.annotate_one(scope, plan, |p| p.library_id).await
    }

    /// Adds a plan to the catalog.
    pub async fn create_payment_plan(
        &self,
        ctx: &TenantContext,
        input: PlanInput,
    ) -> EngineResult<PaymentPlan> {
        let _pass = self.locks.enter_library(ctx.library_id()).await;
        let plan = input.into_plan(ctx.library_id())?;
        self.store.insert_plan(&plan).await?;
        info!(library_id = %plan.library_id, plan_id = %plan.id, "payment plan created");
        Ok(plan)
    }

    /// Updates a plan. Existing balances are not recomputed.
    pub async fn update_payment_plan(
        &self,
        ctx: &TenantContext,
        id: PaymentPlanId,
        patch: PlanPatch,
    ) -> EngineResult<PaymentPlan> {
        let library_id = ctx.library_id();
        let _pass = self.locks.enter_library(library_id).await;
        let _guard = self.locks.lock([LockKey::Plan(library_id, id)]).await;

        let plan = self.plan_in(ctx, id).await?;
        let updated = patch.apply(&plan)?;
        self.store.update_plan(&updated).await?;
        info!(%library_id, plan_id = %id, "payment plan updated");
        Ok(updated)
    }

    // ------------------------------------------------------------------
    // Seats
    // ------------------------------------------------------------------

    /// Lists seats in scope.
    pub async fn list_seats(&self, scope: Scope) -> EngineResult<Vec<Tenanted<Seat>>> {
        let seats = self.store.list_seats(scope).await?;
        self.annotate(scope, seats, |s| s.library_id).await
    }

    /// Fetches a seat if it is in scope.
    pub async fn get_seat(&self, scope: Scope, id: SeatId) -> EngineResult<Option<Tenanted<Seat>>> {
        let seat = self.store.get_seat(id).await?;
        self.annotate_one(scope, seat, |s| s.library_id).await
    }

    /// Adds a vacant seat.
    pub async fn create_seat(&self, ctx: &TenantContext, input: NewSeat) -> EngineResult<Seat> {
        let _pass = self.locks.enter_library(ctx.library_id()).await;
        let seat = input.into_seat(ctx.library_id())?;
        self.store.insert_seat(&seat).await?;
        info!(
            library_id = %seat.library_id,
            seat_id = %seat.id,
            seat_number = %seat.seat_number,
            "seat created"
        );
        Ok(seat)
    }

    /// Vacates and removes a seat.
    pub async fn delete_seat(&self, ctx: &TenantContext, id: SeatId) -> EngineResult<()> {
        let library_id = ctx.library_id();
        let _pass = self.locks.enter_library(library_id).await;

        let seat = self.seat_in(ctx, id).await?;
        let _guard = self.lock_seat_and_occupant(&seat).await;
        let fresh = self.seat_in(ctx, id).await?;
        if fresh.occupant_student_id != seat.occupant_student_id {
            return Err(conflict(id, "seat changed hands before it could be deleted"));
        }

        self.store.remove_seat(id, &plan_unassign(&fresh)).await?;
        info!(%library_id, seat_id = %id, freed = ?fresh.occupant_student_id, "seat deleted");
        Ok(())
    }

    /// Seats a student, vacating their current seat and displacing any
    /// current occupant in the same atomic write.
    ///
    /// Fails with `SeatConflict` if the seat or the student changed while
    /// this call waited for their locks, or if `expected_version` is stale.
    pub async fn assign_seat(&self, ctx: &TenantContext, request: AssignSeat) -> EngineResult<Seat> {
        let library_id = ctx.library_id();
        let _pass = self.locks.enter_library(library_id).await;

        let seat = self.seat_in(ctx, request.seat_id).await?;
        let student = self.student_in(ctx, request.student_id).await?;

        let mut keys = vec![
            LockKey::Seat(library_id, seat.id),
            LockKey::Student(library_id, student.id),
        ];
        keys.extend(student.seat_id.map(|id| LockKey::Seat(library_id, id)));
        keys.extend(seat.occupant_student_id.map(|id| LockKey::Student(library_id, id)));
        let _guard = self.locks.lock(keys).await;

        let fresh_seat = self.seat_in(ctx, seat.id).await?;
        let fresh_student = self.student_in(ctx, student.id).await?;
        if fresh_seat.version != seat.version || fresh_student.seat_id != student.seat_id {
            return Err(conflict(seat.id, "seat or student changed while waiting"));
        }

        let current = match fresh_student.seat_id {
            Some(id) => self.store.get_seat(id).await?,
            None => None,
        };
        let change = plan_assign(&fresh_seat, &fresh_student, current.as_ref(), request.expected_version)
            .inspect_err(log_conflict)?;
        if change.is_noop() {
            return Ok(fresh_seat);
        }

        self.store
            .apply_occupancy(&change)
            .await
            .map_err(EngineError::from)
            .inspect_err(log_conflict)?;
        info!(
            %library_id,
            seat_id = %seat.id,
            student_id = %student.id,
            displaced = ?fresh_seat.occupant_student_id.filter(|id| *id != student.id),
            released = ?current.as_ref().map(|s| s.id).filter(|id| *id != seat.id),
            "seat assigned"
        );
        self.seat_in(ctx, seat.id).await
    }

    /// Vacates a seat. Vacating a vacant seat succeeds without writing.
    pub async fn unassign_seat(&self, ctx: &TenantContext, seat_id: SeatId) -> EngineResult<Seat> {
        let library_id = ctx.library_id();
        let _pass = self.locks.enter_library(library_id).await;

        let seat = self.seat_in(ctx, seat_id).await?;
        let _guard = self.lock_seat_and_occupant(&seat).await;
        let fresh = self.seat_in(ctx, seat_id).await?;
        if fresh.occupant_student_id != seat.occupant_student_id {
            return Err(conflict(seat_id, "seat changed hands while waiting"));
        }

        let change = plan_unassign(&fresh);
        if change.is_noop() {
            debug!(%library_id, %seat_id, "seat already vacant");
            return Ok(fresh);
        }
        self.store.apply_occupancy(&change).await?;
        info!(%library_id, %seat_id, student_id = ?fresh.occupant_student_id, "seat vacated");
        self.seat_in(ctx, seat_id).await
    }

    // ------------------------------------------------------------------
    // Students
    // ------------------------------------------------------------------

    /// Lists students in scope.
    pub async fn list_students(&self, scope: Scope) -> EngineResult<Vec<Tenanted<Student>>> {
        let students = self.store.list_students(scope).await?;
        self.annotate(scope, students, |s| s.library_id).await
    }

    /// Fetches a student if it is in scope.
    pub async fn get_student(
        &self,
        scope: Scope,
        id: StudentId,
    ) -> EngineResult<Option<Tenanted<Student>>> {
        let student = self.store.get_student(id).await?;
        self.annotate_one(scope, student, |s| s.library_id).await
    }

    /// Enrolls a student, seating them right away if a seat is given.
    pub async fn create_student(
        &self,
        ctx: &TenantContext,
        input: NewStudent,
        today: NaiveDate,
    ) -> EngineResult<Student> {
        let library_id = ctx.library_id();
        let _pass = self.locks.enter_library(library_id).await;

        let plan_amount = match input.payment_plan_id {
            Some(plan_id) => Some(self.plan_in(ctx, plan_id).await?.amount),
            None => None,
        };
        let seat_id = input.seat_id;
        let student = input.into_student(library_id, plan_amount, today)?;

        match seat_id {
            None => self.store.insert_student(&student, None).await?,
            Some(seat_id) => {
                let seat = self.seat_in(ctx, seat_id).await?;
                let _guard = self.lock_seat_and_occupant(&seat).await;
                let fresh = self.seat_in(ctx, seat_id).await?;
                if fresh.version != seat.version {
                    return Err(conflict(seat_id, "seat changed while waiting"));
                }
                let seating = plan_assign(&fresh, &student, None, None)?;
                self.store
                    .insert_student(&student, Some(&seating))
                    .await
                    .map_err(EngineError::from)
                    .inspect_err(log_conflict)?;
            }
        }

        info!(
            %library_id,
            student_id = %student.id,
            seat_id = ?seat_id,
            fees_due = %student.fees_due,
            "student enrolled"
        );
        self.student_in(ctx, student.id).await
    }

    /// Applies a patch to a student.
    ///
    /// A seat change goes through [`Self::assign_seat`] or a vacate; a
    /// `fees_due` value is a manual balance override. The patch is validated
    /// before anything is written.
    pub async fn update_student(
        &self,
        ctx: &TenantContext,
        id: StudentId,
        patch: StudentPatch,
    ) -> EngineResult<Student> {
        patch.validate()?;
        let student = self.student_in(ctx, id).await?;
        patch.apply_profile(&student)?;
        if let Some(Link::Set(plan_id)) = patch.payment_plan {
            self.plan_in(ctx, plan_id).await?;
        }

        match patch.seat {
            Some(Link::Set(seat_id)) => {
                self.assign_seat(
                    ctx,
                    AssignSeat {
                        student_id: id,
                        seat_id,
                        expected_version: None,
                    },
                )
                .await?;
            }
            Some(Link::Clear) => self.vacate_student(ctx, id).await?,
            None => {}
        }

        if patch.touches_profile() || patch.fees_due.is_some() {
            let library_id = ctx.library_id();
            let _pass = self.locks.enter_library(library_id).await;
            let _guard = self.locks.lock([LockKey::Student(library_id, id)]).await;
            let fresh = self.student_in(ctx, id).await?;

            if patch.touches_profile() {
                let updated = patch.apply_profile(&fresh)?;
                self.store.update_student_profile(&updated).await?;
            }
            if let Some(fees_due) = patch.fees_due {
                let change = LedgerService::manual_balance(&fresh, fees_due)?;
                self.store.apply_ledger(&change).await?;
                info!(%library_id, student_id = %id, %fees_due, "balance set manually");
            }
        }

        info!(library_id = %ctx.library_id(), student_id = %id, "student updated");
        self.student_in(ctx, id).await
    }

    /// Removes a student: vacates their seat, drops their payments, then
    /// deletes the record, in one atomic write.
    pub async fn delete_student(&self, ctx: &TenantContext, id: StudentId) -> EngineResult<()> {
        let library_id = ctx.library_id();
        let _pass = self.locks.enter_library(library_id).await;

        let student = self.student_in(ctx, id).await?;
        let mut keys = vec![LockKey::Student(library_id, id)];
        keys.extend(student.seat_id.map(|s| LockKey::Seat(library_id, s)));
        let _guard = self.locks.lock(keys).await;

        let fresh = self.student_in(ctx, id).await?;
        if fresh.seat_id != student.seat_id
            && let Some(seat_id) = fresh.seat_id.or(student.seat_id)
        {
            return Err(conflict(seat_id, "student changed seats while waiting"));
        }

        let vacate = self.vacate_plan(library_id, &fresh).await?;
        self.store.remove_student(id, &vacate).await?;
        info!(%library_id, student_id = %id, freed = ?fresh.seat_id, "student deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Fee ledger
    // ------------------------------------------------------------------

    /// Lists journaled payments in scope, optionally for one student.
    pub async fn list_payments(
        &self,
        scope: Scope,
        student_id: Option<StudentId>,
    ) -> EngineResult<Vec<Tenanted<Payment>>> {
        let payments = self.store.list_payments(scope, student_id).await?;
        self.annotate(scope, payments, |p| p.library_id).await
    }

    /// Journals a payment and decreases the balance by its amount.
    pub async fn add_payment(
        &self,
        ctx: &TenantContext,
        student_id: StudentId,
        input: NewPayment,
        today: NaiveDate,
    ) -> EngineResult<Payment> {
        let _pass = self.locks.enter_library(ctx.library_id()).await;
        let _guard = self
            .locks
            .lock([LockKey::Student(ctx.library_id(), student_id)])
            .await;

        let student = self.student_in(ctx, student_id).await?;
        let change = LedgerService::payment(&student, input, today)?;
        let updated = self.store.apply_ledger(&change).await?;
        let payment = change
            .payment
            .ok_or_else(|| EngineError::Store("payment change carried no journal row".into()))?;

        info!(
            library_id = %ctx.library_id(),
            %student_id,
            payment_id = %payment.id,
            amount = %payment.amount,
            fees_due = %updated.fees_due,
            "payment recorded"
        );
        Ok(payment)
    }

    /// Zeroes the balance without journaling a payment.
    pub async fn clear_dues(
        &self,
        ctx: &TenantContext,
        student_id: StudentId,
        today: NaiveDate,
    ) -> EngineResult<Student> {
        self.apply_ledger_change(ctx, student_id, |student| {
            Ok(LedgerService::clear_dues(student, today))
        })
        .await
        .inspect(|s| info!(library_id = %s.library_id, student_id = %s.id, "dues cleared"))
    }

    /// Charges one cycle of the student's plan.
    pub async fn accrue_plan_charge(
        &self,
        ctx: &TenantContext,
        student_id: StudentId,
    ) -> EngineResult<Student> {
        let student = self.student_in(ctx, student_id).await?;
        let plan_id = student.payment_plan_id.ok_or_else(|| {
            EngineError::validation("payment_plan_id", "student has no payment plan")
        })?;
        let plan = self.plan_in(ctx, plan_id).await?;

        self.apply_ledger_change(ctx, student_id, |fresh| {
            if fresh.payment_plan_id != Some(plan.id) {
                return Err(EngineError::validation(
                    "payment_plan_id",
                    "student changed plans while charging",
                ));
            }
            LedgerService::plan_charge(fresh, &plan)
        })
        .await
        .inspect(|s| {
            info!(
                library_id = %s.library_id,
                student_id = %s.id,
                plan_id = %plan_id,
                fees_due = %s.fees_due,
                "plan charge accrued"
            );
        })
    }

    // ------------------------------------------------------------------
    // Dashboard
    // ------------------------------------------------------------------

    /// Computes headline numbers over current state.
    pub async fn dashboard_summary(
        &self,
        scope: Scope,
        today: NaiveDate,
    ) -> EngineResult<DashboardSummary> {
        let students = self.store.list_students(scope).await?;
        let seats = self.store.list_seats(scope).await?;
        let payments = self.store.list_payments(scope, None).await?;
        DashboardSummary::compute(&students, &seats, &payments, today)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn existing_library(&self, id: LibraryId) -> EngineResult<Library> {
        self.store
            .get_library(id)
            .await?
            .ok_or_else(|| EngineError::not_found("library", id))
    }

    async fn student_in(&self, ctx: &TenantContext, id: StudentId) -> EngineResult<Student> {
        let student = self
            .store
            .get_student(id)
            .await?
            .ok_or_else(|| EngineError::not_found("student", id))?;
        ctx.ensure_owned("student", id, student.library_id)?;
        Ok(student)
    }

    async fn seat_in(&self, ctx: &TenantContext, id: SeatId) -> EngineResult<Seat> {
        let seat = self
            .store
            .get_seat(id)
            .await?
            .ok_or_else(|| EngineError::not_found("seat", id))?;
        ctx.ensure_owned("seat", id, seat.library_id)?;
        Ok(seat)
    }

    async fn plan_in(&self, ctx: &TenantContext, id: PaymentPlanId) -> EngineResult<PaymentPlan> {
        let plan = self
            .store
            .get_plan(id)
            .await?
            .ok_or_else(|| EngineError::not_found("payment_plan", id))?;
        ctx.ensure_owned("payment_plan", id, plan.library_id)?;
        Ok(plan)
    }

    async fn lock_seat_and_occupant(&self, seat: &Seat) -> super::locks::KeyedGuard {
        let mut keys = vec![LockKey::Seat(seat.library_id, seat.id)];
        keys.extend(
            seat.occupant_student_id
                .map(|id| LockKey::Student(seat.library_id, id)),
        );
        self.locks.lock(keys).await
    }

    /// Plans vacating whatever seat `student` holds.
    async fn vacate_plan(
        &self,
        library_id: LibraryId,
        student: &Student,
    ) -> EngineResult<OccupancyChange> {
        let seat = match student.seat_id {
            Some(seat_id) => self.store.get_seat(seat_id).await?,
            None => None,
        };
        Ok(seat
            .filter(|s| s.occupant_student_id == Some(student.id))
            .map_or_else(|| OccupancyChange::empty(library_id), |s| plan_unassign(&s)))
    }

    async fn vacate_student(&self, ctx: &TenantContext, id: StudentId) -> EngineResult<()> {
        let library_id = ctx.library_id();
        let _pass = self.locks.enter_library(library_id).await;

        let student = self.student_in(ctx, id).await?;
        let Some(seat_id) = student.seat_id else {
            return Ok(());
        };
        let _guard = self
            .locks
            .lock([
                LockKey::Student(library_id, id),
                LockKey::Seat(library_id, seat_id),
            ])
            .await;

        let fresh = self.student_in(ctx, id).await?;
        if fresh.seat_id != student.seat_id {
            return Err(conflict(seat_id, "student changed seats while waiting"));
        }
        let change = self.vacate_plan(library_id, &fresh).await?;
        if !change.is_noop() {
            self.store.apply_occupancy(&change).await?;
            info!(%library_id, student_id = %id, %seat_id, "seat vacated");
        }
        Ok(())
    }

    /// Runs a ledger change under the student's lock.
    async fn apply_ledger_change<F>(
        &self,
        ctx: &TenantContext,
        student_id: StudentId,
        plan: F,
    ) -> EngineResult<Student>
    where
        F: FnOnce(&Student) -> EngineResult<LedgerChange> + Send,
    {
        let _pass = self.locks.enter_library(ctx.library_id()).await;
        let _guard = self
            .locks
            .lock([LockKey::Student(ctx.library_id(), student_id)])
            .await;

        let student = self.student_in(ctx, student_id).await?;
        let change = plan(&student)?;
        Ok(self.store.apply_ledger(&change).await?)
    }

    async fn library_names(&self, scope: Scope) -> EngineResult<HashMap<LibraryId, String>> {
        let libraries = match scope {
            Scope::Single(id) => self.store.get_library(id).await?.into_iter().collect(),
            Scope::AllLibraries => self.store.list_libraries().await?,
        };
        Ok(libraries.into_iter().map(|l| (l.id, l.name)).collect())
    }

    async fn annotate<T: Send>(
        &self,
        scope: Scope,
        records: Vec<T>,
        library_of: fn(&T) -> LibraryId,
    ) -> EngineResult<Vec<Tenanted<T>>> {
        let names = self.library_names(scope).await?;
        Ok(records
            .into_iter()
            .filter_map(|record| {
                let library_name = names.get(&library_of(&record))?.clone();
                Some(Tenanted {
                    library_name,
                    record,
                })
            })
            .collect())
    }

    async fn annotate_one<T: Send>(
        &self,
        scope: Scope,
        record: Option<T>,
        library_of: fn(&T) -> LibraryId,
    ) -> EngineResult<Option<Tenanted<T>>> {
        let Some(record) = record.filter(|r| scope.includes(library_of(r))) else {
            return Ok(None);
        };
        Ok(self
            .store
            .get_library(library_of(&record))
            .await?
            .map(|library| Tenanted {
                library_name: library.name,
                record,
            }))
    }
}

fn conflict(seat_id: SeatId, reason: &str) -> EngineError {
    warn!(%seat_id, reason, "seat conflict");
    EngineError::SeatConflict { seat_id }
}

fn log_conflict(err: &EngineError) {
    if let EngineError::SeatConflict { seat_id } = err {
        warn!(%seat_id, "seat conflict");
    }
}
