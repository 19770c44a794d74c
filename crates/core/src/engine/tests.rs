//! Engine scenarios against the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Barrier;

use carrel_shared::types::{LibraryId, ManagerId, PaymentPlanId, SeatId, StudentId};

use super::LibraryEngine;
use crate::error::EngineError;
use crate::ledger::{LedgerChange, NewPayment, Payment, max_money};
use crate::library::{CascadeStep, Library, Manager, NewManager};
use crate::plan::{PaymentPlan, PlanFrequency, PlanInput};
use crate::scope::{Caller, Scope, TenantContext};
use crate::seat::{AssignSeat, NewSeat, OccupancyChange, Seat};
use crate::store::{LibraryStore, MemoryLibraryStore, StoreError, StoreResult};
use crate::student::{Link, NewStudent, Student, StudentPatch, StudentStatus};

const ADMIN: Caller = Caller::Superadmin { selected: None };

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
}

struct Fixture {
    engine: Arc<LibraryEngine>,
    library: Library,
    ctx: TenantContext,
}

impl Fixture {
    async fn new() -> Self {
        Self::with_store(Arc::new(MemoryLibraryStore::new())).await
    }

    async fn with_store(store: Arc<dyn LibraryStore>) -> Self {
        let engine = Arc::new(LibraryEngine::new(store));
        let library = engine.create_library(&ADMIN, "North Wing").await.unwrap();
        let ctx = engine.write_context(&ADMIN, Some(library.id)).await.unwrap();
        Self {
            engine,
            library,
            ctx,
        }
    }

    async fn other_library(&self, name: &str) -> (Library, TenantContext) {
        let library = self.engine.create_library(&ADMIN, name).await.unwrap();
        let ctx = self
            .engine
            .write_context(&ADMIN, Some(library.id))
            .await
            .unwrap();
        (library, ctx)
    }

    async fn seat(&self, number: &str) -> Seat {
        seat_in(&self.engine, &self.ctx, number).await
    }

    async fn student(&self, name: &str, fees_due: Decimal) -> Student {
        student_in(&self.engine, &self.ctx, name, fees_due).await
    }

    async fn assign(&self, student: StudentId, seat: SeatId) -> Result<Seat, EngineError> {
        self.engine
            .assign_seat(
                &self.ctx,
                AssignSeat {
                    student_id: student,
                    seat_id: seat,
                    expected_version: None,
                },
            )
            .await
    }

    async fn reload_student(&self, id: StudentId) -> Student {
        self.engine
            .get_student(self.ctx.scope(), id)
            .await
            .unwrap()
            .unwrap()
            .record
    }

    async fn reload_seat(&self, id: SeatId) -> Seat {
        self.engine
            .get_seat(self.ctx.scope(), id)
            .await
            .unwrap()
            .unwrap()
            .record
    }

    async fn pay(&self, student: StudentId, amount: Decimal) -> Payment {
        self.engine
            .add_payment(
                &self.ctx,
                student,
                NewPayment {
                    amount,
                    payment_date: None,
                    notes: None,
                },
                today(),
            )
            .await
            .unwrap()
    }
}

async fn seat_in(engine: &LibraryEngine, ctx: &TenantContext, number: &str) -> Seat {
    engine
        .create_seat(
            ctx,
            NewSeat {
                seat_number: number.into(),
                floor: "1".into(),
            },
        )
        .await
        .unwrap()
}

async fn student_in(
    engine: &LibraryEngine,
    ctx: &TenantContext,
    name: &str,
    fees_due: Decimal,
) -> Student {
    engine
        .create_student(
            ctx,
            NewStudent {
                full_name: name.into(),
                fees_due: Some(fees_due),
                ..Default::default()
            },
            today(),
        )
        .await
        .unwrap()
}

/// Asserts the occupancy relation is one-to-one across every library.
async fn assert_occupancy_consistent(engine: &LibraryEngine) {
    let seats = engine.list_seats(Scope::AllLibraries).await.unwrap();
    let students = engine.list_students(Scope::AllLibraries).await.unwrap();

    for seat in &seats {
        let holders: Vec<_> = students
            .iter()
            .filter(|s| s.record.seat_id == Some(seat.record.id))
            .collect();
        assert!(holders.len() <= 1, "seat {} held twice", seat.record.seat_number);
        assert_eq!(
            seat.record.occupant_student_id,
            holders.first().map(|s| s.record.id)
        );
    }
}

// ============================================================================
// Ledger
// ============================================================================

#[tokio::test]
async fn test_overpayment_becomes_credit() {
    let fx = Fixture::new().await;
    let student = fx.student("Student 7", dec!(100)).await;

    let payment = fx.pay(student.id, dec!(150)).await;
    let reloaded = fx.reload_student(student.id).await;

    assert_eq!(payment.amount, dec!(150));
    assert_eq!(reloaded.fees_due, dec!(-50));
    assert_eq!(reloaded.status(), StudentStatus::Enrolled);
    assert_eq!(reloaded.balance_display().to_string(), "Credit 50.00");
    assert_eq!(reloaded.last_payment_date, Some(today()));
}

#[tokio::test]
async fn test_payment_validation_leaves_balance_alone() {
    let fx = Fixture::new().await;
    let student = fx.student("Student 7", dec!(100)).await;

    let err = fx
        .engine
        .add_payment(
            &fx.ctx,
            student.id,
            NewPayment {
                amount: dec!(0),
                payment_date: None,
                notes: None,
            },
            today(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Validation { field: "amount", .. }));
    assert_eq!(fx.reload_student(student.id).await.fees_due, dec!(100));
    assert!(
        fx.engine
            .list_payments(fx.ctx.scope(), Some(student.id))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_payment_for_unknown_student_is_not_found() {
    let fx = Fixture::new().await;
    let err = fx
        .engine
        .add_payment(
            &fx.ctx,
            StudentId::new(),
            NewPayment {
                amount: dec!(10),
                payment_date: None,
                notes: None,
            },
            today(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "student", .. }));
}

#[tokio::test]
async fn test_clear_dues_writes_no_journal_row() {
    let fx = Fixture::new().await;
    let student = fx.student("Student 3", dec!(75)).await;
    fx.pay(student.id, dec!(5)).await;
    let before = fx
        .engine
        .list_payments(fx.ctx.scope(), Some(student.id))
        .await
        .unwrap()
        .len();

    let cleared = fx
        .engine
        .clear_dues(&fx.ctx, student.id, today())
        .await
        .unwrap();

    let after = fx
        .engine
        .list_payments(fx.ctx.scope(), Some(student.id))
        .await
        .unwrap()
        .len();
    assert_eq!(cleared.fees_due, dec!(0));
    assert_eq!(cleared.status(), StudentStatus::Enrolled);
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_settling_reactivates_deactivated_student() {
    let fx = Fixture::new().await;
    let student = fx.student("Student 4", dec!(40)).await;
    fx.engine
        .update_student(
            &fx.ctx,
            student.id,
            StudentPatch {
                deactivated: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        fx.reload_student(student.id).await.status(),
        StudentStatus::Inactive
    );

    fx.pay(student.id, dec!(40)).await;
    assert_eq!(
        fx.reload_student(student.id).await.status(),
        StudentStatus::Enrolled
    );
}

#[tokio::test]
async fn test_plan_charge_accrues_plan_amount() {
    let fx = Fixture::new().await;
    let plan = fx
        .engine
        .create_payment_plan(
            &fx.ctx,
            PlanInput {
                name: "Quarterly".into(),
                amount: dec!(2400),
                frequency: PlanFrequency::Quarterly,
            },
        )
        .await
        .unwrap();
    let student = fx
        .engine
        .create_student(
            &fx.ctx,
            NewStudent {
                full_name: "Planned".into(),
                payment_plan_id: Some(plan.id),
                ..Default::default()
            },
            today(),
        )
        .await
        .unwrap();
    assert_eq!(student.fees_due, dec!(2400));

    fx.pay(student.id, dec!(2400)).await;
    let charged = fx
        .engine
        .accrue_plan_charge(&fx.ctx, student.id)
        .await
        .unwrap();
    assert_eq!(charged.fees_due, dec!(2400));
    assert_eq!(charged.status(), StudentStatus::Owing);
}

#[tokio::test]
async fn test_plan_charge_needs_a_plan() {
    let fx = Fixture::new().await;
    let student = fx.student("No plan", dec!(0)).await;
    let err = fx
        .engine
        .accrue_plan_charge(&fx.ctx, student.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation {
            field: "payment_plan_id",
            ..
        }
    ));
}

#[tokio::test]
async fn test_payment_past_money_range_is_rejected() {
    let fx = Fixture::new().await;
    let student = fx.student("Credit", -max_money()).await;

    for amount in [max_money(), Decimal::MAX, dec!(0.004)] {
        let err = fx
            .engine
            .add_payment(
                &fx.ctx,
                student.id,
                NewPayment {
                    amount,
                    payment_date: None,
                    notes: None,
                },
                today(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }), "{amount}: {err}");
    }

    assert_eq!(fx.reload_student(student.id).await.fees_due, -max_money());
    assert!(
        fx.engine
            .list_payments(fx.ctx.scope(), Some(student.id))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_plan_charge_past_money_range_is_rejected() {
    let fx = Fixture::new().await;
    let oversized = fx
        .engine
        .create_payment_plan(
            &fx.ctx,
            PlanInput {
                name: "Oversized".into(),
                amount: Decimal::MAX,
                frequency: PlanFrequency::Monthly,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(oversized, EngineError::Validation { field: "amount", .. }));

    let plan = fx
        .engine
        .create_payment_plan(
            &fx.ctx,
            PlanInput {
                name: "Premium".into(),
                amount: max_money(),
                frequency: PlanFrequency::Annually,
            },
        )
        .await
        .unwrap();
    let student = fx
        .engine
        .create_student(
            &fx.ctx,
            NewStudent {
                full_name: "Premium".into(),
                payment_plan_id: Some(plan.id),
                ..Default::default()
            },
            today(),
        )
        .await
        .unwrap();

    let err = fx
        .engine
        .accrue_plan_charge(&fx.ctx, student.id)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Validation { field: "fees_due", .. }));
    assert_eq!(fx.reload_student(student.id).await.fees_due, max_money());
}

// ============================================================================
// Seats
// ============================================================================

#[tokio::test]
async fn test_reassignment_clears_previous_occupant() {
    let fx = Fixture::new().await;
    let a1 = fx.seat("A1").await;
    let s7 = fx.student("Student 7", dec!(0)).await;
    let s9 = fx.student("Student 9", dec!(0)).await;

    fx.assign(s7.id, a1.id).await.unwrap();
    let seat = fx.assign(s9.id, a1.id).await.unwrap();

    assert_eq!(seat.occupant_student_id, Some(s9.id));
    assert_eq!(fx.reload_student(s7.id).await.seat_id, None);
    assert_eq!(fx.reload_student(s9.id).await.seat_id, Some(a1.id));
    assert_occupancy_consistent(&fx.engine).await;
}

#[tokio::test]
async fn test_seated_student_moves_seats() {
    let fx = Fixture::new().await;
    let a1 = fx.seat("A1").await;
    let b2 = fx.seat("B2").await;
    let s7 = fx.student("Student 7", dec!(0)).await;

    fx.assign(s7.id, a1.id).await.unwrap();
    fx.assign(s7.id, b2.id).await.unwrap();

    assert!(fx.reload_seat(a1.id).await.is_vacant());
    assert_eq!(fx.reload_seat(b2.id).await.occupant_student_id, Some(s7.id));
    assert_eq!(fx.reload_student(s7.id).await.seat_id, Some(b2.id));
    assert_occupancy_consistent(&fx.engine).await;
}

#[tokio::test]
async fn test_unassign_vacant_seat_is_idempotent() {
    let fx = Fixture::new().await;
    let a1 = fx.seat("A1").await;

    let first = fx.engine.unassign_seat(&fx.ctx, a1.id).await.unwrap();
    let second = fx.engine.unassign_seat(&fx.ctx, a1.id).await.unwrap();

    assert_eq!(first, a1);
    assert_eq!(second, a1);
}

#[tokio::test]
async fn test_unassign_clears_both_sides() {
    let fx = Fixture::new().await;
    let a1 = fx.seat("A1").await;
    let s7 = fx.student("Student 7", dec!(0)).await;
    fx.assign(s7.id, a1.id).await.unwrap();

    let seat = fx.engine.unassign_seat(&fx.ctx, a1.id).await.unwrap();

    assert!(seat.is_vacant());
    assert_eq!(fx.reload_student(s7.id).await.seat_id, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_assignment_has_one_winner() {
    let fx = Fixture::new().await;
    let a1 = fx.seat("A1").await;
    let s7 = fx.student("Student 7", dec!(0)).await;
    let s9 = fx.student("Student 9", dec!(0)).await;

    let (seat_id, observed) = (a1.id, a1.version);
    let barrier = Arc::new(Barrier::new(2));
    let tasks = [s7.id, s9.id].map(|student_id| {
        let engine = Arc::clone(&fx.engine);
        let barrier = Arc::clone(&barrier);
        let ctx = fx.ctx;
        tokio::spawn(async move {
            barrier.wait().await;
            engine
                .assign_seat(
                    &ctx,
                    AssignSeat {
                        student_id,
                        seat_id,
                        expected_version: Some(observed),
                    },
                )
                .await
        })
    });

    let results = futures::future::join_all(tasks).await;
    let results: Vec<_> = results.into_iter().map(Result::unwrap).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(EngineError::SeatConflict { .. })))
            .count(),
        1
    );
    assert_occupancy_consistent(&fx.engine).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_unversioned_assignment_stays_consistent() {
    let fx = Fixture::new().await;
    let a1 = fx.seat("A1").await;
    let s7 = fx.student("Student 7", dec!(0)).await;
    let s9 = fx.student("Student 9", dec!(0)).await;

    let seat_id = a1.id;
    let barrier = Arc::new(Barrier::new(2));
    let tasks = [s7.id, s9.id].map(|student_id| {
        let engine = Arc::clone(&fx.engine);
        let barrier = Arc::clone(&barrier);
        let ctx = fx.ctx;
        tokio::spawn(async move {
            barrier.wait().await;
            engine
                .assign_seat(
                    &ctx,
                    AssignSeat {
                        student_id,
                        seat_id,
                        expected_version: None,
                    },
                )
                .await
        })
    });

    let results = futures::future::join_all(tasks).await;
    let results: Vec<_> = results.into_iter().map(Result::unwrap).collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::SeatConflict { .. })))
        .count();
    // Either one request lost the race, or the second ran after the first
    // and took the seat over as a plain reassignment.
    assert!(
        (winners, conflicts) == (1, 1) || (winners, conflicts) == (2, 0),
        "results: {results:?}"
    );

    let seat = fx.reload_seat(seat_id).await;
    let occupant = seat.occupant_student_id.expect("seat left vacant");
    assert!(occupant == s7.id || occupant == s9.id);
    assert_eq!(fx.reload_student(occupant).await.seat_id, Some(seat_id));
    assert_occupancy_consistent(&fx.engine).await;
}

#[tokio::test]
async fn test_lock_registry_drains_after_operations() {
    let fx = Fixture::new().await;
    let a1 = fx.seat("A1").await;

    for n in 0..50 {
        let student = fx.student(&format!("Student {n}"), dec!(100)).await;
        fx.assign(student.id, a1.id).await.unwrap();
        fx.pay(student.id, dec!(40)).await;
        fx.engine
            .delete_student(&fx.ctx, student.id)
            .await
            .unwrap();
    }
    assert_eq!(fx.engine.held_locks(), 0);

    fx.engine.delete_library(&ADMIN, fx.library.id).await.unwrap();
    assert_eq!(fx.engine.held_locks(), 0);
}

#[tokio::test]
async fn test_stale_expected_version_conflicts() {
    let fx = Fixture::new().await;
    let a1 = fx.seat("A1").await;
    let s7 = fx.student("Student 7", dec!(0)).await;
    let s9 = fx.student("Student 9", dec!(0)).await;
    fx.assign(s7.id, a1.id).await.unwrap();

    let err = fx
        .engine
        .assign_seat(
            &fx.ctx,
            AssignSeat {
                student_id: s9.id,
                seat_id: a1.id,
                expected_version: Some(0),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::SeatConflict { seat_id } if seat_id == a1.id));
    assert_eq!(fx.reload_seat(a1.id).await.occupant_student_id, Some(s7.id));
}

#[tokio::test]
async fn test_duplicate_seat_number_rejected() {
    let fx = Fixture::new().await;
    fx.seat("A1").await;
    let err = fx
        .engine
        .create_seat(
            &fx.ctx,
            NewSeat {
                seat_number: "A1".into(),
                floor: String::new(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Duplicate { field: "seat_number", .. }));
}

#[tokio::test]
async fn test_delete_seat_clears_occupant_pointer() {
    let fx = Fixture::new().await;
    let a1 = fx.seat("A1").await;
    let s7 = fx.student("Student 7", dec!(0)).await;
    fx.assign(s7.id, a1.id).await.unwrap();

    fx.engine.delete_seat(&fx.ctx, a1.id).await.unwrap();

    assert_eq!(fx.reload_student(s7.id).await.seat_id, None);
    assert!(fx.engine.get_seat(fx.ctx.scope(), a1.id).await.unwrap().is_none());
}

// ============================================================================
// Students
// ============================================================================

#[tokio::test]
async fn test_create_student_with_seat_occupies_it() {
    let fx = Fixture::new().await;
    let a1 = fx.seat("A1").await;

    let student = fx
        .engine
        .create_student(
            &fx.ctx,
            NewStudent {
                full_name: "Seated".into(),
                seat_id: Some(a1.id),
                ..Default::default()
            },
            today(),
        )
        .await
        .unwrap();

    assert_eq!(student.seat_id, Some(a1.id));
    assert_eq!(fx.reload_seat(a1.id).await.occupant_student_id, Some(student.id));
    assert_occupancy_consistent(&fx.engine).await;
}

#[tokio::test]
async fn test_delete_student_frees_seat_and_payments() {
    let fx = Fixture::new().await;
    let a1 = fx.seat("A1").await;
    let s7 = fx.student("Student 7", dec!(100)).await;
    fx.assign(s7.id, a1.id).await.unwrap();
    fx.pay(s7.id, dec!(30)).await;

    fx.engine.delete_student(&fx.ctx, s7.id).await.unwrap();

    assert!(fx.reload_seat(a1.id).await.is_vacant());
    assert!(
        fx.engine
            .list_payments(fx.ctx.scope(), Some(s7.id))
            .await
            .unwrap()
            .is_empty()
    );
    assert!(fx.engine.get_student(fx.ctx.scope(), s7.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_student_routes_seat_and_balance() {
    let fx = Fixture::new().await;
    let a1 = fx.seat("A1").await;
    let s7 = fx.student("Student 7", dec!(100)).await;

    let updated = fx
        .engine
        .update_student(
            &fx.ctx,
            s7.id,
            StudentPatch {
                full_name: Some("Student Seven".into()),
                fees_due: Some(dec!(20)),
                seat: Some(Link::Set(a1.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.full_name, "Student Seven");
    assert_eq!(updated.fees_due, dec!(20));
    assert_eq!(updated.seat_id, Some(a1.id));
    assert_eq!(fx.reload_seat(a1.id).await.occupant_student_id, Some(s7.id));

    let vacated = fx
        .engine
        .update_student(
            &fx.ctx,
            s7.id,
            StudentPatch {
                seat: Some(Link::Clear),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(vacated.seat_id, None);
    assert!(fx.reload_seat(a1.id).await.is_vacant());
}

#[tokio::test]
async fn test_invalid_patch_writes_nothing() {
    let fx = Fixture::new().await;
    let a1 = fx.seat("A1").await;
    let s7 = fx.student("Student 7", dec!(100)).await;

    let err = fx
        .engine
        .update_student(
            &fx.ctx,
            s7.id,
            StudentPatch {
                full_name: Some("   ".into()),
                seat: Some(Link::Set(a1.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Validation { field: "full_name", .. }));
    assert!(fx.reload_seat(a1.id).await.is_vacant());
}

// ============================================================================
// Scoping
// ============================================================================

#[tokio::test]
async fn test_manager_sees_only_bound_library() {
    let fx = Fixture::new().await;
    let (south, south_ctx) = fx.other_library("South Wing").await;
    fx.student("North student", dec!(0)).await;
    let foreign = student_in(&fx.engine, &south_ctx, "South student", dec!(0)).await;

    let manager = fx
        .engine
        .create_manager(
            &ADMIN,
            NewManager {
                full_name: "Asha".into(),
                email: "asha@example.com".into(),
                library_id: Some(fx.library.id),
            },
        )
        .await
        .unwrap();
    let caller = fx
        .engine
        .resolve_caller(carrel_shared::Role::Manager, manager.id.into_inner(), Some(south.id))
        .await
        .unwrap();

    let scope = fx.engine.read_scope(&caller, None).await.unwrap();
    let students = fx.engine.list_students(scope).await.unwrap();
    assert!(!students.is_empty());
    assert!(students.iter().all(|s| s.record.library_id == fx.library.id));

    assert!(matches!(
        fx.engine.read_scope(&caller, Some(south.id)).await,
        Err(EngineError::Authorization(_))
    ));

    let ctx = fx.engine.write_context(&caller, None).await.unwrap();
    let err = fx
        .engine
        .clear_dues(&ctx, foreign.id, today())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
    assert!(fx.engine.get_student(scope, foreign.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_superadmin_wrong_library_is_denied() {
    let fx = Fixture::new().await;
    let (_, south_ctx) = fx.other_library("South Wing").await;
    let foreign = student_in(&fx.engine, &south_ctx, "South student", dec!(10)).await;

    let err = fx
        .engine
        .clear_dues(&fx.ctx, foreign.id, today())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Authorization(_)));
}

#[tokio::test]
async fn test_all_libraries_read_is_annotated() {
    let fx = Fixture::new().await;
    let (_, south_ctx) = fx.other_library("South Wing").await;
    fx.seat("A1").await;
    seat_in(&fx.engine, &south_ctx, "A1").await;

    let scope = fx.engine.read_scope(&ADMIN, None).await.unwrap();
    assert_eq!(scope, Scope::AllLibraries);

    let mut names: Vec<_> = fx
        .engine
        .list_seats(scope)
        .await
        .unwrap()
        .into_iter()
        .map(|s| (s.library_name, s.record.seat_number))
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            ("North Wing".to_string(), "A1".to_string()),
            ("South Wing".to_string(), "A1".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_unbound_manager_cannot_operate() {
    let fx = Fixture::new().await;
    let manager = fx
        .engine
        .create_manager(
            &ADMIN,
            NewManager {
                full_name: "Idle".into(),
                email: "idle@example.com".into(),
                library_id: None,
            },
        )
        .await
        .unwrap();
    let caller = fx
        .engine
        .resolve_caller(carrel_shared::Role::Manager, manager.id.into_inner(), None)
        .await
        .unwrap();

    assert!(matches!(
        fx.engine.read_scope(&caller, None).await,
        Err(EngineError::Authorization(_))
    ));
    assert!(matches!(
        fx.engine.write_context(&caller, None).await,
        Err(EngineError::Authorization(_))
    ));
}

#[tokio::test]
async fn test_managers_cannot_run_superadmin_operations() {
    let fx = Fixture::new().await;
    let caller = Caller::Manager {
        manager_id: ManagerId::new(),
        library_id: Some(fx.library.id),
    };
    assert!(matches!(
        fx.engine.delete_library(&caller, fx.library.id).await,
        Err(EngineError::Authorization(_))
    ));
    assert!(fx.engine.create_library(&caller, "Rogue").await.is_err());
}

// ============================================================================
// Library deletion
// ============================================================================

async fn populate(fx: &Fixture) -> Manager {
    let plan = fx
        .engine
        .create_payment_plan(
            &fx.ctx,
            PlanInput {
                name: "Monthly".into(),
                amount: dec!(500),
                frequency: PlanFrequency::Monthly,
            },
        )
        .await
        .unwrap();
    let a1 = fx.seat("A1").await;
    let student = fx
        .engine
        .create_student(
            &fx.ctx,
            NewStudent {
                full_name: "Doomed".into(),
                payment_plan_id: Some(plan.id),
                seat_id: Some(a1.id),
                ..Default::default()
            },
            today(),
        )
        .await
        .unwrap();
    fx.pay(student.id, dec!(100)).await;

    fx.engine
        .create_manager(
            &ADMIN,
            NewManager {
                full_name: "Bound".into(),
                email: format!("bound-{}@example.com", fx.library.id),
                library_id: Some(fx.library.id),
            },
        )
        .await
        .unwrap()
}

async fn assert_library_gone(fx: &Fixture, manager_id: ManagerId) {
    let all = Scope::AllLibraries;
    let lib = fx.library.id;
    assert!(
        fx.engine
            .list_students(all)
            .await
            .unwrap()
            .iter()
            .all(|s| s.record.library_id != lib)
    );
    assert!(
        fx.engine
            .list_seats(all)
            .await
            .unwrap()
            .iter()
            .all(|s| s.record.library_id != lib)
    );
    assert!(
        fx.engine
            .list_payments(all, None)
            .await
            .unwrap()
            .iter()
            .all(|p| p.record.library_id != lib)
    );
    assert!(
        fx.engine
            .list_payment_plans(all)
            .await
            .unwrap()
            .iter()
            .all(|p| p.record.library_id != lib)
    );
    let managers = fx.engine.list_managers(&ADMIN).await.unwrap();
    let manager = managers.iter().find(|m| m.id == manager_id).unwrap();
    assert_eq!(manager.library_id, None);
    assert!(fx.engine.get_library(&ADMIN, lib).await.unwrap().is_none());
}

#[tokio::test]
async fn test_library_deletion_cascades() {
    let fx = Fixture::new().await;
    let (_, south_ctx) = fx.other_library("South Wing").await;
    let survivor = student_in(&fx.engine, &south_ctx, "Survivor", dec!(0)).await;
    let manager = populate(&fx).await;

    fx.engine.delete_library(&ADMIN, fx.library.id).await.unwrap();

    assert_library_gone(&fx, manager.id).await;
    assert!(
        fx.engine
            .get_student(Scope::AllLibraries, survivor.id)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_deleting_missing_library_is_not_found() {
    let fx = Fixture::new().await;
    assert!(matches!(
        fx.engine.delete_library(&ADMIN, LibraryId::new()).await,
        Err(EngineError::NotFound { entity: "library", .. })
    ));
}

#[tokio::test]
async fn test_interrupted_deletion_can_be_retried() {
    let store = Arc::new(FlakyStore::new(CascadeStep::Seats));
    let fx = Fixture::with_store(Arc::clone(&store) as Arc<dyn LibraryStore>).await;
    let manager = populate(&fx).await;

    let err = fx
        .engine
        .delete_library(&ADMIN, fx.library.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::CascadeIncomplete {
            step: CascadeStep::Seats,
            ..
        }
    ));

    fx.engine.delete_library(&ADMIN, fx.library.id).await.unwrap();
    assert_library_gone(&fx, manager.id).await;
}

// ============================================================================
// Dashboard
// ============================================================================

#[tokio::test]
async fn test_dashboard_summary() {
    let fx = Fixture::new().await;
    let a1 = fx.seat("A1").await;
    fx.seat("A2").await;
    let owing = fx.student("Owing", dec!(300)).await;
    let paid = fx.student("Paid", dec!(100)).await;
    fx.assign(owing.id, a1.id).await.unwrap();
    fx.pay(paid.id, dec!(100)).await;
    fx.pay(owing.id, dec!(50)).await;

    let summary = fx
        .engine
        .dashboard_summary(fx.ctx.scope(), today())
        .await
        .unwrap();

    assert_eq!(summary.total_students, 2);
    assert_eq!(summary.total_seats, 2);
    assert_eq!(summary.available_seats, 1);
    assert_eq!(summary.monthly_income, dec!(150));
    assert_eq!(summary.students_owing, 1);
}

// ============================================================================
// Test store that fails one cascade step once
// ============================================================================

struct FlakyStore {
    inner: MemoryLibraryStore,
    fail_at: CascadeStep,
    tripped: AtomicBool,
}

impl FlakyStore {
    fn new(fail_at: CascadeStep) -> Self {
        Self {
            inner: MemoryLibraryStore::new(),
            fail_at,
            tripped: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl LibraryStore for FlakyStore {
    async fn insert_library(&self, library: &Library) -> StoreResult<()> {
        self.inner.insert_library(library).await
    }
    async fn get_library(&self, id: LibraryId) -> StoreResult<Option<Library>> {
        self.inner.get_library(id).await
    }
    async fn list_libraries(&self) -> StoreResult<Vec<Library>> {
        self.inner.list_libraries().await
    }
    async fn purge_library_step(&self, id: LibraryId, step: CascadeStep) -> StoreResult<u64> {
        if step == self.fail_at && !self.tripped.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Backend("connection reset".into()));
        }
        self.inner.purge_library_step(id, step).await
    }
    async fn insert_manager(&self, manager: &Manager) -> StoreResult<()> {
        self.inner.insert_manager(manager).await
    }
    async fn get_manager(&self, id: ManagerId) -> StoreResult<Option<Manager>> {
        self.inner.get_manager(id).await
    }
    async fn list_managers(&self) -> StoreResult<Vec<Manager>> {
        self.inner.list_managers().await
    }
    async fn set_manager_library(
        &self,
        id: ManagerId,
        library_id: Option<LibraryId>,
    ) -> StoreResult<Manager> {
        self.inner.set_manager_library(id, library_id).await
    }
    async fn insert_plan(&self, plan: &PaymentPlan) -> StoreResult<()> {
        self.inner.insert_plan(plan).await
    }
    async fn update_plan(&self, plan: &PaymentPlan) -> StoreResult<()> {
        self.inner.update_plan(plan).await
    }
    async fn get_plan(&self, id: PaymentPlanId) -> StoreResult<Option<PaymentPlan>> {
        self.inner.get_plan(id).await
    }
    async fn list_plans(&self, scope: Scope) -> StoreResult<Vec<PaymentPlan>> {
        self.inner.list_plans(scope).await
    }
    async fn insert_seat(&self, seat: &Seat) -> StoreResult<()> {
        self.inner.insert_seat(seat).await
    }
    async fn get_seat(&self, id: SeatId) -> StoreResult<Option<Seat>> {
        self.inner.get_seat(id).await
    }
    async fn list_seats(&self, scope: Scope) -> StoreResult<Vec<Seat>> {
        self.inner.list_seats(scope).await
    }
    async fn remove_seat(&self, id: SeatId, vacate: &OccupancyChange) -> StoreResult<()> {
        self.inner.remove_seat(id, vacate).await
    }
    async fn insert_student(
        &self,
        student: &Student,
        seating: Option<&OccupancyChange>,
    ) -> StoreResult<()> {
        self.inner.insert_student(student, seating).await
    }
    async fn get_student(&self, id: StudentId) -> StoreResult<Option<Student>> {
        self.inner.get_student(id).await
    }
    async fn list_students(&self, scope: Scope) -> StoreResult<Vec<Student>> {
        self.inner.list_students(scope).await
    }
    async fn update_student_profile(&self, student: &Student) -> StoreResult<Student> {
        self.inner.update_student_profile(student).await
    }
    async fn remove_student(&self, id: StudentId, vacate: &OccupancyChange) -> StoreResult<()> {
        self.inner.remove_student(id, vacate).await
    }
    async fn apply_occupancy(&self, change: &OccupancyChange) -> StoreResult<()> {
        self.inner.apply_occupancy(change).await
    }
    async fn apply_ledger(&self, change: &LedgerChange) -> StoreResult<Student> {
        self.inner.apply_ledger(change).await
    }
    async fn list_payments(
        &self,
        scope: Scope,
        student_id: Option<StudentId>,
    ) -> StoreResult<Vec<Payment>> {
        self.inner.list_payments(scope, student_id).await
    }
}
