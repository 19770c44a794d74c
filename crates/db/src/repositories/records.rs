//! Conversions between entity models and domain records.

use chrono::Utc;
use sea_orm::ActiveValue::Set;

use carrel_core::StoreError;
use carrel_core::ledger::Payment;
use carrel_core::library::{Library, Manager};
use carrel_core::plan::{PaymentPlan, PlanFrequency};
use carrel_core::seat::Seat;
use carrel_core::student::Student;
use carrel_shared::types::{LibraryId, ManagerId, PaymentId, PaymentPlanId, SeatId, StudentId};

use crate::entities::{libraries, managers, payment_plans, payments, seats, students};

pub(crate) fn library(model: libraries::Model) -> Library {
    Library {
        id: LibraryId::from_uuid(model.id),
        name: model.name,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn library_row(library: &Library) -> libraries::ActiveModel {
    libraries::ActiveModel {
        id: Set(library.id.into_inner()),
        name: Set(library.name.clone()),
        created_at: Set(library.created_at.into()),
    }
}

pub(crate) fn manager(model: managers::Model) -> Manager {
    Manager {
        id: ManagerId::from_uuid(model.id),
        full_name: model.full_name,
        email: model.email,
        library_id: model.library_id.map(LibraryId::from_uuid),
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn manager_row(manager: &Manager) -> managers::ActiveModel {
    managers::ActiveModel {
        id: Set(manager.id.into_inner()),
        full_name: Set(manager.full_name.clone()),
        email: Set(manager.email.clone()),
        library_id: Set(manager.library_id.map(LibraryId::into_inner)),
        created_at: Set(manager.created_at.into()),
    }
}

pub(crate) fn plan(model: payment_plans::Model) -> Result<PaymentPlan, StoreError> {
    let frequency = model
        .frequency
        .parse::<PlanFrequency>()
        .map_err(StoreError::Backend)?;

    Ok(PaymentPlan {
        id: PaymentPlanId::from_uuid(model.id),
        library_id: LibraryId::from_uuid(model.library_id),
        name: model.name,
        amount: model.amount,
        frequency,
    })
}

pub(crate) fn plan_row(plan: &PaymentPlan) -> payment_plans::ActiveModel {
    payment_plans::ActiveModel {
        id: Set(plan.id.into_inner()),
        library_id: Set(plan.library_id.into_inner()),
        name: Set(plan.name.clone()),
        amount: Set(plan.amount),
        frequency: Set(plan.frequency.as_str().to_string()),
    }
}

pub(crate) fn seat(model: seats::Model) -> Seat {
    Seat {
        id: SeatId::from_uuid(model.id),
        library_id: LibraryId::from_uuid(model.library_id),
        seat_number: model.seat_number,
        floor: model.floor,
        occupant_student_id: model.occupant_student_id.map(StudentId::from_uuid),
        version: model.version,
    }
}

pub(crate) fn seat_row(seat: &Seat) -> seats::ActiveModel {
    seats::ActiveModel {
        id: Set(seat.id.into_inner()),
        library_id: Set(seat.library_id.into_inner()),
        seat_number: Set(seat.seat_number.clone()),
        floor: Set(seat.floor.clone()),
        occupant_student_id: Set(seat.occupant_student_id.map(StudentId::into_inner)),
        version: Set(seat.version),
    }
}

pub(crate) fn student(model: students::Model) -> Student {
    Student {
        id: StudentId::from_uuid(model.id),
        library_id: LibraryId::from_uuid(model.library_id),
        full_name: model.full_name,
        email: model.email,
        phone: model.phone,
        fees_due: model.fees_due,
        deactivated: model.deactivated,
        seat_id: model.seat_id.map(SeatId::from_uuid),
        payment_plan_id: model.payment_plan_id.map(PaymentPlanId::from_uuid),
        last_payment_date: model.last_payment_date,
        enrollment_date: model.enrollment_date,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

// The seat pointer is written by occupancy changes only, so a new row
// always starts unseated.
pub(crate) fn student_row(student: &Student) -> students::ActiveModel {
    students::ActiveModel {
        id: Set(student.id.into_inner()),
        library_id: Set(student.library_id.into_inner()),
        full_name: Set(student.full_name.clone()),
        email: Set(student.email.clone()),
        phone: Set(student.phone.clone()),
        fees_due: Set(student.fees_due),
        deactivated: Set(student.deactivated),
        seat_id: Set(None),
        payment_plan_id: Set(student.payment_plan_id.map(PaymentPlanId::into_inner)),
        last_payment_date: Set(student.last_payment_date),
        enrollment_date: Set(student.enrollment_date),
        created_at: Set(student.created_at.into()),
    }
}

pub(crate) fn payment(model: payments::Model) -> Payment {
    Payment {
        id: PaymentId::from_uuid(model.id),
        library_id: LibraryId::from_uuid(model.library_id),
        student_id: StudentId::from_uuid(model.student_id),
        amount: model.amount,
        payment_date: model.payment_date,
        notes: model.notes,
        recorded_at: model.recorded_at.with_timezone(&Utc),
    }
}

pub(crate) fn payment_row(payment: &Payment) -> payments::ActiveModel {
    payments::ActiveModel {
        id: Set(payment.id.into_inner()),
        library_id: Set(payment.library_id.into_inner()),
        student_id: Set(payment.student_id.into_inner()),
        amount: Set(payment.amount),
        payment_date: Set(payment.payment_date),
        notes: Set(payment.notes.clone()),
        recorded_at: Set(payment.recorded_at.into()),
    }
}
