//! Student types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use carrel_shared::types::{LibraryId, PaymentPlanId, SeatId, StudentId};

use super::balance::BalanceDisplay;
use crate::error::{EngineError, EngineResult};
use crate::ledger::money;
use crate::library::types::{optional, required};

/// Derived membership status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    /// Active and settled (or in credit).
    Enrolled,
    /// Active with a positive balance.
    Owing,
    /// Deactivated; overrides the balance.
    Inactive,
}

/// A student record.
///
/// `seat_id` is only ever written through the occupancy state machine.
/// `fees_due` is only ever written through ledger changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Student ID.
    pub id: StudentId,
    /// Owning library.
    pub library_id: LibraryId,
    /// Full name.
    pub full_name: String,
    /// Contact email.
    pub email: Option<String>,
    /// Contact phone.
    pub phone: Option<String>,
    /// Signed balance: positive owed, negative credit.
    pub fees_due: Decimal,
    /// Explicit deactivation flag.
    pub deactivated: bool,
    /// Occupied seat.
    pub seat_id: Option<SeatId>,
    /// Subscribed plan.
    pub payment_plan_id: Option<PaymentPlanId>,
    /// Date of the latest payment or dues clearance.
    pub last_payment_date: Option<NaiveDate>,
    /// Enrollment date.
    pub enrollment_date: NaiveDate,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Student {
    /// Status derived from the deactivation flag and the balance.
    #[must_use]
    pub fn status(&self) -> StudentStatus {
        if self.deactivated {
            StudentStatus::Inactive
        } else if self.fees_due > Decimal::ZERO {
            StudentStatus::Owing
        } else {
            StudentStatus::Enrolled
        }
    }

    /// Human-readable balance.
    #[must_use]
    pub fn balance_display(&self) -> BalanceDisplay {
        BalanceDisplay::from(self.fees_due)
    }
}

/// Change to an optional reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link<T> {
    /// Point at `T`.
    Set(T),
    /// Drop the reference.
    Clear,
}

/// Input for creating a student.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewStudent {
    /// Full name.
    pub full_name: String,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Contact phone.
    #[serde(default)]
    pub phone: Option<String>,
    /// Seat to occupy right away.
    #[serde(default)]
    pub seat_id: Option<SeatId>,
    /// Plan to subscribe to.
    #[serde(default)]
    pub payment_plan_id: Option<PaymentPlanId>,
    /// Opening balance. Defaults to the plan amount, or zero without a plan.
    #[serde(default)]
    pub fees_due: Option<Decimal>,
    /// Enrollment date. Defaults to today.
    #[serde(default)]
    pub enrollment_date: Option<NaiveDate>,
}

impl NewStudent {
    /// Builds the student record without a seat.
    ///
    /// `plan_amount` is the amount of the referenced plan, already checked to
    /// belong to `library_id`. The seat, if any, is attached afterwards by
    /// the occupancy state machine.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name or an opening balance
    /// outside the money range.
    pub fn into_student(
        self,
        library_id: LibraryId,
        plan_amount: Option<Decimal>,
        today: NaiveDate,
    ) -> EngineResult<Student> {
        let opening = self.fees_due.or(plan_amount).unwrap_or(Decimal::ZERO);
        Ok(Student {
            id: StudentId::new(),
            library_id,
            full_name: required("full_name", &self.full_name)?,
            email: optional(self.email.as_deref()),
            phone: optional(self.phone.as_deref()),
            fees_due: money("fees_due", opening)?,
            deactivated: false,
            seat_id: None,
            payment_plan_id: self.payment_plan_id,
            last_payment_date: None,
            enrollment_date: self.enrollment_date.unwrap_or(today),
            created_at: Utc::now(),
        })
    }
}

/// Partial update of a student.
///
/// Profile fields are written directly. `fees_due` becomes a manual ledger
/// adjustment and `seat` is routed through seat assignment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentPatch {
    /// New full name.
    pub full_name: Option<String>,
    /// New email; blank clears it.
    pub email: Option<String>,
    /// New phone; blank clears it.
    pub phone: Option<String>,
    /// Plan change.
    pub payment_plan: Option<Link<PaymentPlanId>>,
    /// Deactivate or reactivate.
    pub deactivated: Option<bool>,
    /// New enrollment date.
    pub enrollment_date: Option<NaiveDate>,
    /// Manually set balance.
    pub fees_due: Option<Decimal>,
    /// Seat change.
    pub seat: Option<Link<SeatId>>,
}

impl StudentPatch {
    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.payment_plan.is_none()
            && self.deactivated.is_none()
            && self.enrollment_date.is_none()
            && self.fees_due.is_none()
            && self.seat.is_none()
    }

    /// Applies the profile part of the patch (everything except balance and
    /// seat) to a copy of `student`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name.
    pub fn apply_profile(&self, student: &Student) -> EngineResult<Student> {
        let mut updated = student.clone();
        if let Some(name) = &self.full_name {
            updated.full_name = required("full_name", name)?;
        }
        if let Some(email) = &self.email {
            updated.email = optional(Some(email));
        }
        if let Some(phone) = &self.phone {
            updated.phone = optional(Some(phone));
        }
        match self.payment_plan {
            Some(Link::Set(plan_id)) => updated.payment_plan_id = Some(plan_id),
            Some(Link::Clear) => updated.payment_plan_id = None,
            None => {}
        }
        if let Some(deactivated) = self.deactivated {
            updated.deactivated = deactivated;
        }
        if let Some(date) = self.enrollment_date {
            updated.enrollment_date = date;
        }
        Ok(updated)
    }

    /// Returns true if the patch touches profile fields.
    #[must_use]
    pub fn touches_profile(&self) -> bool {
        self.full_name.is_some()
            || self.email.is_some()
            || self.phone.is_some()
            || self.payment_plan.is_some()
            || self.deactivated.is_some()
            || self.enrollment_date.is_some()
    }

    /// Rejects patches that would do nothing or set an unstorable balance.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty patch or a `fees_due` outside
    /// the money range.
    pub fn validate(&self) -> EngineResult<()> {
        if self.is_empty() {
            return Err(EngineError::validation("patch", "no fields to update"));
        }
        if let Some(fees_due) = self.fees_due {
            money("fees_due", fees_due)?;
        }
        Ok(())
    }
}
