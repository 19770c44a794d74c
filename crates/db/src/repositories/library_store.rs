//! PostgreSQL `LibraryStore`.
//!
//! Every composite write runs in one transaction. Seat writes are
//! compare-and-set on `version`; a write whose expected version no longer
//! matches updates zero rows and the transaction is rolled back.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ActiveValue::Unchanged, ColumnTrait, ConnectionTrait,
    DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, SqlErr, TransactionTrait, sea_query::Expr,
};
use tracing::{debug, warn};

use carrel_core::ledger::{LedgerChange, Payment};
use carrel_core::library::{CascadeStep, Library, Manager};
use carrel_core::plan::PaymentPlan;
use carrel_core::seat::{OccupancyChange, Seat};
use carrel_core::student::Student;
use carrel_core::{LibraryStore, Scope, StoreError, StoreResult};
use carrel_shared::types::{LibraryId, ManagerId, PaymentPlanId, SeatId, StudentId};

use super::records;
use crate::entities::{libraries, managers, payment_plans, payments, seats, students};

/// `LibraryStore` backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgLibraryStore {
    db: DatabaseConnection,
}

impl PgLibraryStore {
    /// Creates a store over an open connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn begin(&self) -> StoreResult<DatabaseTransaction> {
        self.db.begin().await.map_err(backend)
    }
}

fn backend(err: DbErr) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn unique_or_backend(err: DbErr, field: &'static str, value: &str) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::Duplicate {
            field,
            value: value.to_string(),
        },
        _ => backend(err),
    }
}

fn not_updated_as_missing(err: DbErr, entity: &'static str, id: impl ToString) -> StoreError {
    match err {
        DbErr::RecordNotUpdated => StoreError::missing(entity, id),
        other => backend(other),
    }
}

async fn commit(txn: DatabaseTransaction) -> StoreResult<()> {
    txn.commit().await.map_err(backend)
}

async fn ensure_library<C: ConnectionTrait>(db: &C, id: LibraryId) -> StoreResult<()> {
    libraries::Entity::find_by_id(id.into_inner())
        .one(db)
        .await
        .map_err(backend)?
        .map(|_| ())
        .ok_or_else(|| StoreError::missing("library", id))
}

async fn ensure_plan_in<C: ConnectionTrait>(
    db: &C,
    plan_id: Option<PaymentPlanId>,
    library_id: LibraryId,
) -> StoreResult<()> {
    let Some(plan_id) = plan_id else {
        return Ok(());
    };
    payment_plans::Entity::find_by_id(plan_id.into_inner())
        .filter(payment_plans::Column::LibraryId.eq(library_id.into_inner()))
        .one(db)
        .await
        .map_err(backend)?
        .map(|_| ())
        .ok_or_else(|| StoreError::missing("payment_plan", plan_id))
}

/// Writes an occupancy change inside `txn`.
///
/// Student pointers go first, in order, then the seats. Every seat update
/// is conditioned on the version it was planned against.
async fn write_occupancy(txn: &DatabaseTransaction, change: &OccupancyChange) -> StoreResult<()> {
    let library_id = change.library_id.into_inner();

    for write in &change.students {
        let updated = students::Entity::update_many()
            .col_expr(
                students::Column::SeatId,
                Expr::value(write.seat_id.map(SeatId::into_inner)),
            )
            .filter(students::Column::Id.eq(write.student_id.into_inner()))
            .filter(students::Column::LibraryId.eq(library_id))
            .exec(txn)
            .await
            .map_err(backend)?;
        if updated.rows_affected == 0 {
            return Err(StoreError::missing("student", write.student_id));
        }
    }

    for write in &change.seats {
        let updated = seats::Entity::update_many()
            .col_expr(
                seats::Column::OccupantStudentId,
                Expr::value(write.occupant.map(StudentId::into_inner)),
            )
            .col_expr(
                seats::Column::Version,
                Expr::col(seats::Column::Version).add(1),
            )
            .filter(seats::Column::Id.eq(write.seat_id.into_inner()))
            .filter(seats::Column::LibraryId.eq(library_id))
            .filter(seats::Column::Version.eq(write.expected_version))
            .exec(txn)
            .await
            .map_err(backend)?;

        if updated.rows_affected == 0 {
            let exists = seats::Entity::find_by_id(write.seat_id.into_inner())
                .filter(seats::Column::LibraryId.eq(library_id))
                .one(txn)
                .await
                .map_err(backend)?
                .is_some();
            if !exists {
                return Err(StoreError::missing("seat", write.seat_id));
            }
            warn!(
                seat_id = %write.seat_id,
                expected_version = write.expected_version,
                "Seat version moved before write"
            );
            return Err(StoreError::SeatVersion {
                seat_id: write.seat_id,
            });
        }
    }

    Ok(())
}

#[async_trait]
impl LibraryStore for PgLibraryStore {
    async fn insert_library(&self, library: &Library) -> StoreResult<()> {
        records::library_row(library)
            .insert(&self.db)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get_library(&self, id: LibraryId) -> StoreResult<Option<Library>> {
        let model = libraries::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(backend)?;
        Ok(model.map(records::library))
    }

    async fn list_libraries(&self) -> StoreResult<Vec<Library>> {
        let models = libraries::Entity::find()
            .order_by_asc(libraries::Column::Id)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok(models.into_iter().map(records::library).collect())
    }

    async fn purge_library_step(&self, id: LibraryId, step: CascadeStep) -> StoreResult<u64> {
        let library_id = id.into_inner();
        let touched = match step {
            CascadeStep::Payments => {
                payments::Entity::delete_many()
                    .filter(payments::Column::LibraryId.eq(library_id))
                    .exec(&self.db)
                    .await
                    .map_err(backend)?
                    .rows_affected
            }
            CascadeStep::Students => {
                // Occupants reference students; release them in the same
                // transaction as the delete.
                let txn = self.begin().await?;
                seats::Entity::update_many()
                    .col_expr(
                        seats::Column::OccupantStudentId,
                        Expr::value(Option::<uuid::Uuid>::None),
                    )
                    .col_expr(
                        seats::Column::Version,
                        Expr::col(seats::Column::Version).add(1),
                    )
                    .filter(seats::Column::LibraryId.eq(library_id))
                    .filter(seats::Column::OccupantStudentId.is_not_null())
                    .exec(&txn)
                    .await
                    .map_err(backend)?;
                let deleted = students::Entity::delete_many()
                    .filter(students::Column::LibraryId.eq(library_id))
                    .exec(&txn)
                    .await
                    .map_err(backend)?
                    .rows_affected;
                commit(txn).await?;
                deleted
            }
            CascadeStep::Seats => {
                seats::Entity::delete_many()
                    .filter(seats::Column::LibraryId.eq(library_id))
                    .exec(&self.db)
                    .await
                    .map_err(backend)?
                    .rows_affected
            }
            CascadeStep::PaymentPlans => {
                payment_plans::Entity::delete_many()
                    .filter(payment_plans::Column::LibraryId.eq(library_id))
                    .exec(&self.db)
                    .await
                    .map_err(backend)?
                    .rows_affected
            }
            CascadeStep::ManagerBindings => {
                managers::Entity::update_many()
                    .col_expr(
                        managers::Column::LibraryId,
                        Expr::value(Option::<uuid::Uuid>::None),
                    )
                    .filter(managers::Column::LibraryId.eq(library_id))
                    .exec(&self.db)
                    .await
                    .map_err(backend)?
                    .rows_affected
            }
            CascadeStep::Library => {
                libraries::Entity::delete_by_id(library_id)
                    .exec(&self.db)
                    .await
                    .map_err(backend)?
                    .rows_affected
            }
        };

        debug!(library_id = %id, step = %step, touched, "Purged library step");
        Ok(touched)
    }

    async fn insert_manager(&self, manager: &Manager) -> StoreResult<()> {
        if let Some(library_id) = manager.library_id {
            ensure_library(&self.db, library_id).await?;
        }
        records::manager_row(manager)
            .insert(&self.db)
            .await
            .map_err(|e| unique_or_backend(e, "email", &manager.email))?;
        Ok(())
    }

    async fn get_manager(&self, id: ManagerId) -> StoreResult<Option<Manager>> {
        let model = managers::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(backend)?;
        Ok(model.map(records::manager))
    }

    async fn list_managers(&self) -> StoreResult<Vec<Manager>> {
        let models = managers::Entity::find()
            .order_by_asc(managers::Column::Id)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok(models.into_iter().map(records::manager).collect())
    }

    async fn set_manager_library(
        &self,
        id: ManagerId,
        library_id: Option<LibraryId>,
    ) -> StoreResult<Manager> {
        if let Some(library_id) = library_id {
            ensure_library(&self.db, library_id).await?;
        }
        let model = managers::ActiveModel {
            id: Unchanged(id.into_inner()),
            library_id: Set(library_id.map(LibraryId::into_inner)),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(|e| not_updated_as_missing(e, "manager", id))?;
        Ok(records::manager(model))
    }

    async fn insert_plan(&self, plan: &PaymentPlan) -> StoreResult<()> {
        ensure_library(&self.db, plan.library_id).await?;
        records::plan_row(plan)
            .insert(&self.db)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn update_plan(&self, plan: &PaymentPlan) -> StoreResult<()> {
        payment_plans::ActiveModel {
            id: Unchanged(plan.id.into_inner()),
            name: Set(plan.name.clone()),
            amount: Set(plan.amount),
            frequency: Set(plan.frequency.as_str().to_string()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(|e| not_updated_as_missing(e, "payment_plan", plan.id))?;
        Ok(())
    }

    async fn get_plan(&self, id: PaymentPlanId) -> StoreResult<Option<PaymentPlan>> {
        payment_plans::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(backend)?
            .map(records::plan)
            .transpose()
    }

    async fn list_plans(&self, scope: Scope) -> StoreResult<Vec<PaymentPlan>> {
        let mut query = payment_plans::Entity::find().order_by_asc(payment_plans::Column::Id);
        if let Some(library_id) = scope.library_id() {
            query = query.filter(payment_plans::Column::LibraryId.eq(library_id.into_inner()));
        }
        query
            .all(&self.db)
            .await
            .map_err(backend)?
            .into_iter()
            .map(records::plan)
            .collect()
    }

    async fn insert_seat(&self, seat: &Seat) -> StoreResult<()> {
        ensure_library(&self.db, seat.library_id).await?;
        records::seat_row(seat)
            .insert(&self.db)
            .await
            .map_err(|e| unique_or_backend(e, "seat_number", &seat.seat_number))?;
        Ok(())
    }

    async fn get_seat(&self, id: SeatId) -> StoreResult<Option<Seat>> {
        let model = seats::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(backend)?;
        Ok(model.map(records::seat))
    }

    async fn list_seats(&self, scope: Scope) -> StoreResult<Vec<Seat>> {
        let mut query = seats::Entity::find().order_by_asc(seats::Column::Id);
        if let Some(library_id) = scope.library_id() {
            query = query.filter(seats::Column::LibraryId.eq(library_id.into_inner()));
        }
        let models = query.all(&self.db).await.map_err(backend)?;
        Ok(models.into_iter().map(records::seat).collect())
    }

    async fn remove_seat(&self, id: SeatId, vacate: &OccupancyChange) -> StoreResult<()> {
        let txn = self.begin().await?;
        seats::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::missing("seat", id))?;

        write_occupancy(&txn, vacate).await?;
        seats::Entity::delete_by_id(id.into_inner())
            .exec(&txn)
            .await
            .map_err(backend)?;
        commit(txn).await
    }

    async fn insert_student(
        &self,
        student: &Student,
        seating: Option<&OccupancyChange>,
    ) -> StoreResult<()> {
        let txn = self.begin().await?;
        ensure_library(&txn, student.library_id).await?;
        ensure_plan_in(&txn, student.payment_plan_id, student.library_id).await?;

        records::student_row(student)
            .insert(&txn)
            .await
            .map_err(backend)?;
        if let Some(change) = seating {
            write_occupancy(&txn, change).await?;
        }
        commit(txn).await
    }

    async fn get_student(&self, id: StudentId) -> StoreResult<Option<Student>> {
        let model = students::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(backend)?;
        Ok(model.map(records::student))
    }

    async fn list_students(&self, scope: Scope) -> StoreResult<Vec<Student>> {
        let mut query = students::Entity::find().order_by_asc(students::Column::Id);
        if let Some(library_id) = scope.library_id() {
            query = query.filter(students::Column::LibraryId.eq(library_id.into_inner()));
        }
        let models = query.all(&self.db).await.map_err(backend)?;
        Ok(models.into_iter().map(records::student).collect())
    }

    async fn update_student_profile(&self, student: &Student) -> StoreResult<Student> {
        ensure_plan_in(&self.db, student.payment_plan_id, student.library_id).await?;
        let model = students::ActiveModel {
            id: Unchanged(student.id.into_inner()),
            full_name: Set(student.full_name.clone()),
            email: Set(student.email.clone()),
            phone: Set(student.phone.clone()),
            payment_plan_id: Set(student.payment_plan_id.map(PaymentPlanId::into_inner)),
            deactivated: Set(student.deactivated),
            enrollment_date: Set(student.enrollment_date),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(|e| not_updated_as_missing(e, "student", student.id))?;
        Ok(records::student(model))
    }

    async fn remove_student(&self, id: StudentId, vacate: &OccupancyChange) -> StoreResult<()> {
        let txn = self.begin().await?;
        students::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::missing("student", id))?;

        write_occupancy(&txn, vacate).await?;
        payments::Entity::delete_many()
            .filter(payments::Column::StudentId.eq(id.into_inner()))
            .exec(&txn)
            .await
            .map_err(backend)?;
        students::Entity::delete_by_id(id.into_inner())
            .exec(&txn)
            .await
            .map_err(backend)?;
        commit(txn).await
    }

    async fn apply_occupancy(&self, change: &OccupancyChange) -> StoreResult<()> {
        let txn = self.begin().await?;
        write_occupancy(&txn, change).await?;
        commit(txn).await
    }

    async fn apply_ledger(&self, change: &LedgerChange) -> StoreResult<Student> {
        let txn = self.begin().await?;
        let model = students::Entity::find_by_id(change.student_id.into_inner())
            .filter(students::Column::LibraryId.eq(change.library_id.into_inner()))
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::missing("student", change.student_id))?;

        let mut student = records::student(model);
        change.apply_to(&mut student)?;

        students::ActiveModel {
            id: Unchanged(student.id.into_inner()),
            fees_due: Set(student.fees_due),
            deactivated: Set(student.deactivated),
            last_payment_date: Set(student.last_payment_date),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(backend)?;

        if let Some(payment) = &change.payment {
            records::payment_row(payment)
                .insert(&txn)
                .await
                .map_err(backend)?;
        }
        commit(txn).await?;
        Ok(student)
    }

    async fn list_payments(
        &self,
        scope: Scope,
        student_id: Option<StudentId>,
    ) -> StoreResult<Vec<Payment>> {
        let mut query = payments::Entity::find().order_by_asc(payments::Column::Id);
        if let Some(library_id) = scope.library_id() {
            query = query.filter(payments::Column::LibraryId.eq(library_id.into_inner()));
        }
        if let Some(student_id) = student_id {
            query = query.filter(payments::Column::StudentId.eq(student_id.into_inner()));
        }
        let models = query.all(&self.db).await.map_err(backend)?;
        Ok(models.into_iter().map(records::payment).collect())
    }
}
