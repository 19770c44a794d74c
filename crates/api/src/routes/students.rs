//! Student routes, including the per-student ledger actions.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;

use carrel_core::ledger::NewPayment;
use carrel_core::student::{BalanceDisplay, NewStudent, Student, StudentPatch, StudentStatus};
use carrel_core::{EngineError, Tenanted};
use carrel_shared::types::StudentId;

use super::today;
use crate::{
    AppState,
    error::ApiError,
    middleware::{ReadScope, WriteContext},
};

/// Creates the student routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/students", get(list_students).post(create_student))
        .route(
            "/students/{student_id}",
            get(get_student).patch(update_student).delete(delete_student),
        )
        .route(
            "/students/{student_id}/payments",
            get(list_student_payments).post(add_payment),
        )
        .route("/students/{student_id}/clear-dues", post(clear_dues))
        .route("/students/{student_id}/plan-charges", post(accrue_plan_charge))
}

/// Student as returned to clients, with derived fields.
#[derive(Debug, Serialize)]
pub struct StudentView {
    /// The stored record.
    #[serde(flatten)]
    pub student: Student,
    /// Derived membership status.
    pub status: StudentStatus,
    /// Balance as shown to staff, e.g. `Credit 50.00`.
    pub balance_display: BalanceDisplay,
}

impl From<Student> for StudentView {
    fn from(student: Student) -> Self {
        Self {
            status: student.status(),
            balance_display: student.balance_display(),
            student,
        }
    }
}

fn view(tenanted: Tenanted<Student>) -> Tenanted<StudentView> {
    Tenanted {
        library_name: tenanted.library_name,
        record: tenanted.record.into(),
    }
}

async fn list_students(
    State(state): State<AppState>,
    ReadScope(scope): ReadScope,
) -> Result<impl IntoResponse, ApiError> {
    let students = state.engine.list_students(scope).await?;
    Ok(Json(students.into_iter().map(view).collect::<Vec<_>>()))
}

async fn get_student(
    State(state): State<AppState>,
    ReadScope(scope): ReadScope,
    Path(student_id): Path<StudentId>,
) -> Result<impl IntoResponse, ApiError> {
    let student = state
        .engine
        .get_student(scope, student_id)
        .await?
        .ok_or_else(|| EngineError::not_found("student", student_id))?;
    Ok(Json(view(student)))
}

async fn create_student(
    State(state): State<AppState>,
    WriteContext(ctx): WriteContext,
    Json(payload): Json<NewStudent>,
) -> Result<impl IntoResponse, ApiError> {
    let student = state
        .engine
        .create_student(&ctx, payload, today())
        .await?;
    Ok((StatusCode::CREATED, Json(StudentView::from(student))))
}

async fn update_student(
    State(state): State<AppState>,
    WriteContext(ctx): WriteContext,
    Path(student_id): Path<StudentId>,
    Json(payload): Json<StudentPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let student = state
        .engine
        .update_student(&ctx, student_id, payload)
        .await?;
    Ok(Json(StudentView::from(student)))
}

/// DELETE `/students/{student_id}`
///
/// Frees the student's seat and removes their payments along with them.
async fn delete_student(
    State(state): State<AppState>,
    WriteContext(ctx): WriteContext,
    Path(student_id): Path<StudentId>,
) -> Result<impl IntoResponse, ApiError> {
    state.engine.delete_student(&ctx, student_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_student_payments(
    State(state): State<AppState>,
    ReadScope(scope): ReadScope,
    Path(student_id): Path<StudentId>,
) -> Result<impl IntoResponse, ApiError> {
    let payments = state
        .engine
        .list_payments(scope, Some(student_id))
        .await?;
    Ok(Json(payments))
}

async fn add_payment(
    State(state): State<AppState>,
    WriteContext(ctx): WriteContext,
    Path(student_id): Path<StudentId>,
    Json(payload): Json<NewPayment>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state
        .engine
        .add_payment(&ctx, student_id, payload, today())
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn clear_dues(
    State(state): State<AppState>,
    WriteContext(ctx): WriteContext,
    Path(student_id): Path<StudentId>,
) -> Result<impl IntoResponse, ApiError> {
    let student = state.engine.clear_dues(&ctx, student_id, today()).await?;
    Ok(Json(StudentView::from(student)))
}

async fn accrue_plan_charge(
    State(state): State<AppState>,
    WriteContext(ctx): WriteContext,
    Path(student_id): Path<StudentId>,
) -> Result<impl IntoResponse, ApiError> {
    let student = state.engine.accrue_plan_charge(&ctx, student_id).await?;
    Ok(Json(StudentView::from(student)))
}
